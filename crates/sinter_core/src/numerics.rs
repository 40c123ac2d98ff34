//! Nonlinear and linear solvers used by the root finders.

mod broyden;
mod linear;
mod newton;

pub use broyden::{broyden, BroydenSettings};
pub use linear::{solve_dense, solve_sparse_columns, LinearSystem};
pub use newton::{newton_raphson, NewtonRaphsonSettings};

use crate::error::{Result, SinterError};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Converged iterate of a nonlinear solver.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverOutcome {
    pub solution: DVector<f64>,
    pub residual_norm: f64,
    pub iterations: usize,
}

/// Backtracking bounds of the Armijo line search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineSearch {
    /// Sufficient decrease factor.
    pub alpha: f64,
    pub min_step_factor: f64,
    pub max_step_factor: f64,
    pub max_backtracks: usize,
}

impl Default for LineSearch {
    fn default() -> Self {
        Self {
            alpha: 1e-4,
            min_step_factor: 0.1,
            max_step_factor: 0.5,
            max_backtracks: 20,
        }
    }
}

impl LineSearch {
    /// Scales `direction` until the merit `|f|^2 / 2` decreases sufficiently.
    ///
    /// Returns the accepted iterate and its residual. When no sufficient
    /// decrease is found the shortest finite trial is taken, so the caller's
    /// iteration cap decides about convergence.
    pub(crate) fn search<F>(
        &self,
        x: &DVector<f64>,
        residual: &DVector<f64>,
        direction: &DVector<f64>,
        f: &mut F,
    ) -> Result<(DVector<f64>, DVector<f64>)>
    where
        F: FnMut(&DVector<f64>) -> Result<DVector<f64>>,
    {
        let merit = 0.5 * residual.norm_squared();
        let slope = -2.0 * merit;
        let mut step = 1.0;
        let mut fallback = None;

        for _ in 0..=self.max_backtracks {
            let trial = x + direction * step;
            let trial_residual = f(&trial)?;
            let trial_merit = 0.5 * trial_residual.norm_squared();
            if !trial_merit.is_finite() {
                step *= self.min_step_factor;
                continue;
            }
            if trial_merit <= merit + self.alpha * step * slope {
                return Ok((trial, trial_residual));
            }
            let interpolated = -slope * step * step / (2.0 * (trial_merit - merit - slope * step));
            fallback = Some((trial, trial_residual));
            step = interpolated.clamp(self.min_step_factor * step, self.max_step_factor * step);
        }

        fallback.ok_or_else(|| SinterError::InvalidState {
            solver: "line search",
            iteration: self.max_backtracks,
            reason: "no finite trial step".into(),
        })
    }
}

/// Forward-difference Jacobian of `f` at `x`, reusing the residual `fx`.
pub fn finite_difference_jacobian<F>(x: &DVector<f64>, fx: &DVector<f64>, f: &mut F) -> Result<DMatrix<f64>>
where
    F: FnMut(&DVector<f64>) -> Result<DVector<f64>>,
{
    let n = x.len();
    let mut jacobian = DMatrix::zeros(fx.len(), n);
    let mut shifted = x.clone();
    for j in 0..n {
        let h = 1e-7 * x[j].abs().max(1.0);
        shifted[j] = x[j] + h;
        let column = (f(&shifted)? - fx) / h;
        jacobian.set_column(j, &column);
        shifted[j] = x[j];
    }
    Ok(jacobian)
}

pub(crate) fn ensure_finite(solver: &'static str, iteration: usize, values: &DVector<f64>) -> Result<()> {
    match values.iter().position(|v| !v.is_finite()) {
        None => Ok(()),
        Some(i) => Err(SinterError::InvalidState {
            solver,
            iteration,
            reason: format!("entry {} is {}", i, values[i]),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finite_difference_jacobian_of_quadratic() {
        let mut f = |x: &DVector<f64>| Ok(DVector::from_vec(vec![x[0] * x[0], x[0] * x[1]]));
        let x = DVector::from_vec(vec![2.0, 3.0]);
        let fx = f(&x).expect("residual");
        let jacobian = finite_difference_jacobian(&x, &fx, &mut f).expect("jacobian");
        let expected = DMatrix::from_row_slice(2, 2, &[4.0, 0.0, 3.0, 2.0]);
        assert!((jacobian - expected).abs().max() < 1e-5);
    }

    #[test]
    fn line_search_accepts_full_newton_step_on_linear_problem() {
        let mut f = |x: &DVector<f64>| Ok(x.map(|v| 2.0 * v - 1.0));
        let x = DVector::from_vec(vec![3.0]);
        let residual = f(&x).expect("residual");
        let direction = DVector::from_vec(vec![-2.5]);
        let (accepted, accepted_residual) = LineSearch::default()
            .search(&x, &residual, &direction, &mut f)
            .expect("search");
        assert!((accepted[0] - 0.5).abs() < 1e-12);
        assert!(accepted_residual.norm() < 1e-12);
    }

    #[test]
    fn ensure_finite_names_offending_entry() {
        let err = ensure_finite("test", 3, &DVector::from_vec(vec![1.0, f64::NAN])).unwrap_err();
        assert!(err.to_string().contains("entry 1"));
    }
}
