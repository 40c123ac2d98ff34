//! The `sinter_core` crate is the time integration engine for sintering of
//! two-dimensional particle ensembles based on the thermodynamic extremal principle.
//!
//! Every time step builds the stationarity conditions of one Lagrangian over
//! node fluxes, node displacements, rigid contact displacements and their
//! constraint multipliers, solves them and advances the particle geometry.
//!
//! Key components:
//! - **Model**: immutable [`model::SolutionState`] snapshots with cached node and contact geometry.
//! - **Step vector**: flat layout of all unknowns in particle blocks and a shared border block.
//! - **Equations**: residual and symmetric sparse Jacobian of the Lagrangian.
//! - **Root finding**: tearing decomposition (parallel particle blocks plus Schur border) or Broyden.
//! - **Solver**: the driver loop with step width control, validation, recovery and remeshing hooks.
pub mod config;
pub mod equations;
pub mod error;
pub mod geometry;
pub mod material;
pub mod model;
pub mod norm;
pub mod numerics;
pub mod recovery;
pub mod remeshing;
pub mod root_finding;
pub mod session;
pub mod solver;
pub mod step_estimator;
pub mod step_vector;
pub mod step_width;
pub mod storage;
pub mod system;
pub mod time_stepping;
pub mod validation;

#[cfg(test)]
pub(crate) mod fixtures;

pub use config::SolverOptions;
pub use error::{Result, SinterError};
pub use solver::SinteringSolver;
