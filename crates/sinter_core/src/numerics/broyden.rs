use super::{ensure_finite, finite_difference_jacobian, solve_dense, LineSearch, SolverOutcome};
use crate::error::{Result, SinterError};
use log::debug;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BroydenSettings {
    pub max_iterations: usize,
    pub tolerance: f64,
    pub line_search: LineSearch,
}

impl Default for BroydenSettings {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            tolerance: 1e-8,
            line_search: LineSearch::default(),
        }
    }
}

/// Broyden's ("good") quasi-Newton method.
///
/// The Jacobian estimate starts from forward differences and is kept current
/// by rank-one secant updates. It is rebuilt from differences whenever a step
/// fails to reduce the residual.
pub fn broyden<F>(
    solver: &'static str,
    initial: DVector<f64>,
    settings: &BroydenSettings,
    mut f: F,
) -> Result<SolverOutcome>
where
    F: FnMut(&DVector<f64>) -> Result<DVector<f64>>,
{
    let mut x = initial;
    ensure_finite(solver, 0, &x)?;
    let mut residual = f(&x)?;
    ensure_finite(solver, 0, &residual)?;
    let mut jacobian: Option<DMatrix<f64>> = None;
    let mut iterations = 0;

    loop {
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

        let estimate = match jacobian.take() {
            Some(estimate) => estimate,
            None => finite_difference_jacobian(&x, &residual, &mut f)?,
        };
        let direction = solve_dense(estimate.clone(), &-&residual)?;
        let (next, next_residual) = settings.line_search.search(&x, &residual, &direction, &mut f)?;
        iterations += 1;
        ensure_finite(solver, iterations, &next)?;
        ensure_finite(solver, iterations, &next_residual)?;

        if next_residual.norm() < residual_norm {
            let dx = &next - &x;
            let df = &next_residual - &residual;
            let denominator = dx.norm_squared();
            if denominator > 0.0 {
                let correction = (df - &estimate * &dx) / denominator;
                jacobian = Some(estimate + correction * dx.transpose());
            }
        }
        x = next;
        residual = next_residual;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solves_mildly_nonlinear_system() {
        let f = |x: &DVector<f64>| {
            Ok(DVector::from_vec(vec![
                x[0] + 0.5 * x[1] * x[1] - 1.5,
                x[1] - 0.1 * x[0].sin() - 0.9,
            ]))
        };
        let outcome = broyden("broyden", DVector::zeros(2), &BroydenSettings::default(), f).expect("converges");
        let x = &outcome.solution;
        assert!((x[0] + 0.5 * x[1] * x[1] - 1.5).abs() < 1e-7);
        assert!((x[1] - 0.1 * x[0].sin() - 0.9).abs() < 1e-7);
    }

    #[test]
    fn linear_system_converges_quickly() {
        let a = DMatrix::from_row_slice(3, 3, &[4.0, 1.0, 0.0, 1.0, 3.0, 1.0, 0.0, 1.0, 2.0]);
        let b = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        let f = |x: &DVector<f64>| Ok(&a * x - &b);
        let outcome = broyden("broyden", DVector::zeros(3), &BroydenSettings::default(), f).expect("converges");
        assert!((&a * &outcome.solution - &b).norm() < 1e-8);
        assert!(outcome.iterations <= 3);
    }

    #[test]
    fn non_finite_residual_is_intercepted() {
        let f = |x: &DVector<f64>| Ok(x.map(|v| if v == 0.0 { f64::NAN } else { v }));
        let err = broyden("broyden", DVector::zeros(1), &BroydenSettings::default(), f).unwrap_err();
        assert!(matches!(err, SinterError::InvalidState { iteration: 0, .. }));
    }
}
