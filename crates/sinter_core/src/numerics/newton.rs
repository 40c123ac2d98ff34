use super::{ensure_finite, LineSearch, LinearSystem, SolverOutcome};
use crate::error::{Result, SinterError};
use log::debug;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NewtonRaphsonSettings {
    pub max_iterations: usize,
    pub tolerance: f64,
    pub line_search: LineSearch,
}

impl Default for NewtonRaphsonSettings {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 1e-8,
            line_search: LineSearch::default(),
        }
    }
}

/// Newton-Raphson iteration with Armijo backtracking.
///
/// Converges when the Euclidean residual norm drops to `settings.tolerance`.
/// A start point that already satisfies the tolerance is returned unchanged.
/// The Jacobian may be dense or sparse, see [`LinearSystem`].
pub fn newton_raphson<F, J, M>(
    solver: &'static str,
    initial: DVector<f64>,
    settings: &NewtonRaphsonSettings,
    mut f: F,
    mut jacobian: J,
) -> Result<SolverOutcome>
where
    F: FnMut(&DVector<f64>) -> Result<DVector<f64>>,
    J: FnMut(&DVector<f64>) -> Result<M>,
    M: LinearSystem,
{
    let mut x = initial;
    ensure_finite(solver, 0, &x)?;
    let mut residual = f(&x)?;
    let mut iterations = 0;

    loop {
        ensure_finite(solver, iterations, &residual)?;
        let residual_norm = residual.norm();
        debug!("{} iteration {}: residual norm {:e}", solver, iterations, residual_norm);
        if residual_norm <= settings.tolerance {
            return Ok(SolverOutcome {
                solution: x,
                residual_norm,
                iterations,
            });
        }
        if iterations >= settings.max_iterations {
            return Err(SinterError::NonConvergence {
                solver,
                iterations,
                residual: residual_norm,
            });
        }

        let direction = jacobian(&x)?.solve(&-&residual)?;
        let (next, next_residual) = settings.line_search.search(&x, &residual, &direction, &mut f)?;
        x = next;
        residual = next_residual;
        iterations += 1;
        ensure_finite(solver, iterations, &x)?;
    }
}
