use thiserror::Error;

/// Failure taxonomy of the sintering core.
///
/// Numerical failures (`NonConvergence`, `InvalidState`, `LinearSolveFailed`,
/// `DegenerateRoot`, `Instability`) are recoverable by the driver loop. Everything else is fatal.
#[derive(Debug, Error)]
pub enum SinterError {
    /// Root finder exhausted its iteration budget.
    #[error("{solver} did not converge in {iterations} iterations (residual norm {residual})")]
    NonConvergence {
        solver: &'static str,
        iterations: usize,
        residual: f64,
    },

    /// An iterate or residual became non-finite.
    #[error("{solver} produced a non-finite value in iteration {iteration}: {reason}")]
    InvalidState {
        solver: &'static str,
        iteration: usize,
        reason: String,
    },

    /// LU factorization of a Jacobian block failed.
    #[error("linear solve failed: {0}")]
    LinearSolveFailed(String),

    /// Root with a non-positive dissipation multiplier, i.e. the trivial
    /// solution with all rates zero rather than the physical one.
    #[error("{solver} converged to a degenerate root (dissipation multiplier {lambda})")]
    DegenerateRoot { solver: &'static str, lambda: f64 },

    /// Oscillating displacement pattern detected on a particle surface.
    #[error("instability detected in particle {particle} around node {node}")]
    Instability { particle: u64, node: u64 },

    /// Malformed particle or contact topology.
    #[error("topology error: {0}")]
    Topology(String),

    #[error("time step width {width} fell below the configured minimum {minimum}")]
    StepWidthUnderflow { width: f64, minimum: f64 },

    #[error("recovery exhausted after {attempts} attempts: {source}")]
    RecoveryExhausted {
        attempts: usize,
        #[source]
        source: Box<SinterError>,
    },

    /// A remesher rejected the sanitized state.
    #[error("remeshing failed: {0:#}")]
    Remeshing(anyhow::Error),

    /// Invalid configuration, material data or input state.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl SinterError {
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SinterError::NonConvergence { .. }
                | SinterError::InvalidState { .. }
                | SinterError::LinearSolveFailed(_)
                | SinterError::DegenerateRoot { .. }
                | SinterError::Instability { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, SinterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numerical_failures_are_recoverable() {
        let failure = SinterError::NonConvergence {
            solver: "newton",
            iterations: 3,
            residual: 1.0,
        };
        assert!(failure.is_recoverable());
        assert!(SinterError::LinearSolveFailed("singular".into()).is_recoverable());
        let degenerate = SinterError::DegenerateRoot {
            solver: "tearing",
            lambda: -1.0,
        };
        assert!(degenerate.is_recoverable());
        assert!(degenerate.to_string().contains("dissipation multiplier -1"));
        assert!(SinterError::Instability {
            particle: 1,
            node: 2
        }
        .is_recoverable());
    }

    #[test]
    fn topology_and_exhaustion_are_fatal() {
        assert!(!SinterError::Topology("detached".into()).is_recoverable());
        let exhausted = SinterError::RecoveryExhausted {
            attempts: 2,
            source: Box::new(SinterError::LinearSolveFailed("singular".into())),
        };
        assert!(!exhausted.is_recoverable());
        assert!(exhausted.to_string().contains("singular"));
    }
}
