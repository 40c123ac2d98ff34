//! Root finders for the Lagrangian stationarity system.
//!
//! Besides the physical root with a dissipation multiplier of one, the system
//! has a trivial root with all rates zero at a multiplier of minus one. Both
//! finders first solve with the multiplier pinned to one, which is a linear
//! problem, and only then release it. A root with a non-positive multiplier
//! is rejected as [`SinterError::DegenerateRoot`].

use crate::equations::EquationSystem;
use crate::error::{Result, SinterError};
use crate::numerics::{
    broyden, newton_raphson, solve_sparse_columns, BroydenSettings, NewtonRaphsonSettings,
};
use crate::step_vector::{StepVector, Unknown};
use log::debug;
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::iter;
use std::ops::Range;

/// Drives a step vector to a root of the equation system.
pub trait LagrangianRootFinder: Send + Sync {
    fn find_root(&self, equations: &EquationSystem<'_>, initial: StepVector) -> Result<StepVector>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RootFinderKind {
    Tearing,
    Monolithic,
}

impl RootFinderKind {
    pub fn build(self, max_iterations: usize, tolerance: f64) -> Box<dyn LagrangianRootFinder> {
        match self {
            RootFinderKind::Tearing => Box::new(TearingRootFinder {
                settings: NewtonRaphsonSettings {
                    max_iterations,
                    tolerance,
                    ..NewtonRaphsonSettings::default()
                },
            }),
            RootFinderKind::Monolithic => Box::new(MonolithicRootFinder {
                settings: BroydenSettings {
                    max_iterations,
                    tolerance,
                    ..BroydenSettings::default()
                },
            }),
        }
    }
}

/// Quasi-Newton iteration over the full unknown vector.
#[derive(Debug, Clone, Default)]
pub struct MonolithicRootFinder {
    pub settings: BroydenSettings,
}

impl LagrangianRootFinder for MonolithicRootFinder {
    fn find_root(&self, equations: &EquationSystem<'_>, initial: StepVector) -> Result<StepVector> {
        let initial_norm = equations.residual(&initial).norm();
        if initial_norm <= self.settings.tolerance {
            debug!("monolithic: start vector already converged (residual norm {:e})", initial_norm);
            return nondegenerate("monolithic", initial);
        }

        let map = initial.map().clone();
        let pinned_rows = 0..map.len() - 1;
        let pinned_residual = |x: &DVector<f64>| {
            let step = StepVector::from_values(map.clone(), with_unit_dissipation(x))?;
            Ok(equations.residual_rows(&step, pinned_rows.clone()))
        };
        let reduced = initial.block(pinned_rows.clone());
        let pinned = broyden("monolithic (pinned)", reduced, &self.settings, pinned_residual)?;

        let residual = |x: &DVector<f64>| {
            let step = StepVector::from_values(map.clone(), x.clone())?;
            Ok(equations.residual(&step))
        };
        let start = with_unit_dissipation(&pinned.solution);
        let outcome = broyden("monolithic", start, &self.settings, residual)?;
        debug!(
            "monolithic root found after {}+{} iterations, residual norm {:e}",
            pinned.iterations, outcome.iterations, outcome.residual_norm
        );
        nondegenerate("monolithic", StepVector::from_values(map, outcome.solution)?)
    }
}

/// Tearing decomposition into per-particle blocks and the shared border.
///
/// For a fixed border each particle block is solved on its own, in parallel,
/// with a sparse LU of the block Jacobian. The border is then driven by
/// Newton-Raphson on the border rows, whose Jacobian is the Schur complement
/// `J_bb - sum_p J_bp J_pp^-1 J_pb`.
#[derive(Debug, Clone, Default)]
pub struct TearingRootFinder {
    pub settings: NewtonRaphsonSettings,
}

impl LagrangianRootFinder for TearingRootFinder {
    fn find_root(&self, equations: &EquationSystem<'_>, initial: StepVector) -> Result<StepVector> {
        let initial_norm = equations.residual(&initial).norm();
        if initial_norm <= self.settings.tolerance {
            debug!("tearing: start vector already converged (residual norm {:e})", initial_norm);
            return nondegenerate("tearing", initial);
        }

        let border = initial.map().border();
        // the dissipation multiplier is the last border unknown
        let pinned_border = border.start..border.end - 1;
        let mut pinned = initial;
        pinned.set(Unknown::LambdaDissipation, 1.0);

        let pinned = self.solve_border(equations, pinned, pinned_border)?;
        let solved = self.solve_border(equations, pinned, border)?;
        debug!(
            "tearing root found, full residual norm {:e}",
            equations.residual(&solved).norm()
        );
        nondegenerate("tearing", solved)
    }
}

impl TearingRootFinder {
    /// Newton-Raphson on the `border` unknowns with every particle block solved at each iterate.
    fn solve_border(
        &self,
        equations: &EquationSystem<'_>,
        base: StepVector,
        border: Range<usize>,
    ) -> Result<StepVector> {
        let start = base.block(border.clone());
        let border_residual = |values: &DVector<f64>| {
            let step = self.solve_particles(equations, &base, &border, values)?;
            Ok(equations.residual_rows(&step, border.clone()))
        };
        let border_jacobian = |values: &DVector<f64>| {
            let step = self.solve_particles(equations, &base, &border, values)?;
            self.schur_complement(equations, &step, &border)
        };
        let outcome = newton_raphson("tearing", start, &self.settings, border_residual, border_jacobian)?;
        debug!(
            "tearing: {} border unknowns solved in {} iterations",
            border.len(),
            outcome.iterations
        );
        self.solve_particles(equations, &base, &border, &outcome.solution)
    }

    /// Copy of `base` with the border set to `values` and every particle block solved.
    fn solve_particles(
        &self,
        equations: &EquationSystem<'_>,
        base: &StepVector,
        border: &Range<usize>,
        values: &DVector<f64>,
    ) -> Result<StepVector> {
        let mut step = base.clone();
        step.set_block(border.clone(), values);
        let blocks = step.map().particle_blocks().to_vec();
        let solutions = blocks
            .par_iter()
            .filter(|block| !block.is_empty())
            .map(|block| {
                let solution = self.solve_block(equations, &step, block)?;
                Ok((block.clone(), solution))
            })
            .collect::<Result<Vec<_>>>()?;
        for (block, solution) in solutions {
            step.set_block(block, &solution);
        }
        Ok(step)
    }

    fn solve_block(
        &self,
        equations: &EquationSystem<'_>,
        step: &StepVector,
        block: &Range<usize>,
    ) -> Result<DVector<f64>> {
        let with_block = |values: &DVector<f64>| {
            let mut trial = step.clone();
            trial.set_block(block.clone(), values);
            trial
        };
        let residual = |values: &DVector<f64>| Ok(equations.residual_rows(&with_block(values), block.clone()));
        let jacobian = |values: &DVector<f64>| {
            Ok(equations.jacobian_block_sparse(&with_block(values), block.clone(), block.clone()))
        };
        let outcome = newton_raphson("particle block", step.block(block.clone()), &self.settings, residual, jacobian)?;
        Ok(outcome.solution)
    }

    /// Reduced Jacobian of the `border` rows at a step whose particle blocks are solved.
    fn schur_complement(
        &self,
        equations: &EquationSystem<'_>,
        step: &StepVector,
        border: &Range<usize>,
    ) -> Result<DMatrix<f64>> {
        let full = equations.jacobian_block(step, border.clone(), border.clone());
        let blocks = step.map().particle_blocks().to_vec();
        let corrections = blocks
            .par_iter()
            .filter(|block| !block.is_empty())
            .map(|block| {
                let inner = equations.jacobian_block_sparse(step, block.clone(), block.clone());
                let inner_to_border = equations.jacobian_block(step, block.clone(), border.clone());
                let border_to_inner = equations.jacobian_block(step, border.clone(), block.clone());
                let eliminated = solve_sparse_columns(&inner, &inner_to_border)?;
                Ok(border_to_inner * eliminated)
            })
            .collect::<Result<Vec<DMatrix<f64>>>>()?;
        Ok(corrections.into_iter().fold(full, |reduced, correction| reduced - correction))
    }
}

/// Full unknown vector from all values but the last, with the dissipation multiplier set to one.
fn with_unit_dissipation(reduced: &DVector<f64>) -> DVector<f64> {
    DVector::from_iterator(reduced.len() + 1, reduced.iter().copied().chain(iter::once(1.0)))
}

fn nondegenerate(solver: &'static str, step: StepVector) -> Result<StepVector> {
    let lambda = step.lambda_dissipation();
    if lambda.is_finite() && lambda > 0.0 {
        Ok(step)
    } else {
        Err(SinterError::DegenerateRoot { solver, lambda })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::model::SolutionState;
    use crate::step_estimator::estimate_step;
    use crate::step_vector::{NodeUnknown, StepVectorMap, Unknown};
    use std::sync::Arc;

    fn solve(state: &SolutionState, kind: RootFinderKind) -> StepVector {
        let equations = EquationSystem::new(state, 1e-8);
        let map = Arc::new(StepVectorMap::new(state));
        let guess = estimate_step(&equations, map);
        kind.build(100, 1e-9).find_root(&equations, guess).expect("root")
    }

    #[test]
    fn single_particle_reduces_to_node_stationarity() {
        let system = fixtures::perturbed_circle(20, 0.05);
        let state = SolutionState::new(&system, &fixtures::unit_context()).expect("state");
        let step = solve(&state, RootFinderKind::Tearing);
        let equations = EquationSystem::new(&state, 1e-8);
        assert!(equations.residual(&step).norm() < 1e-8);
        assert!((step.lambda_dissipation() - 1.0).abs() < 1e-6);

        let residual = equations.residual(&step);
        let volume_rate: f64 = state
            .nodes
            .iter()
            .filter_map(|node| step.map().index(Unknown::Node(node.index, NodeUnknown::LambdaVolume)))
            .map(|row| residual[row])
            .sum();
        assert!(volume_rate.abs() < 1e-8);

        // Peaks of the perturbation recede, troughs fill.
        assert!(step.normal_displacement(0) < 0.0);
        let trough = state.nodes.iter().find(|n| (n.coordinates.phi - std::f64::consts::PI / 5.0).abs() < 1e-9);
        let trough = trough.expect("trough node");
        assert!(step.normal_displacement(trough.index) > 0.0);
    }

    #[test]
    fn tearing_and_monolithic_agree_on_single_particle() {
        let system = fixtures::perturbed_circle(12, 0.05);
        let state = SolutionState::new(&system, &fixtures::unit_context()).expect("state");
        let tearing = solve(&state, RootFinderKind::Tearing);
        let monolithic = solve(&state, RootFinderKind::Monolithic);
        let difference = (tearing.values() - monolithic.values()).abs().max();
        assert!(difference < 1e-6, "difference {}", difference);
    }

    #[test]
    fn converged_vector_is_returned_unchanged() {
        let system = fixtures::perturbed_circle(16, 0.05);
        let state = SolutionState::new(&system, &fixtures::unit_context()).expect("state");
        let first = solve(&state, RootFinderKind::Tearing);
        let equations = EquationSystem::new(&state, 1e-8);
        let again = TearingRootFinder {
            settings: NewtonRaphsonSettings {
                tolerance: 1e-8,
                ..NewtonRaphsonSettings::default()
            },
        }
        .find_root(&equations, first.clone())
        .expect("root");
        assert_eq!(again.values(), first.values());
    }

    #[test]
    fn perfect_circle_has_zero_rates() {
        let system = fixtures::perturbed_circle(16, 0.0);
        let state = SolutionState::new(&system, &fixtures::unit_context()).expect("state");
        let step = solve(&state, RootFinderKind::Tearing);
        for node in &state.nodes {
            assert!(step.normal_displacement(node.index).abs() < 1e-9);
            assert!(step.flux_to_upper(node.index).abs() < 1e-9);
        }
    }

    #[test]
    fn two_particle_root_pulls_centers_together() {
        let (system, context) = fixtures::two_particles(24, 5);
        let state = SolutionState::new(&system, &context).expect("state");
        let step = solve(&state, RootFinderKind::Tearing);
        let equations = EquationSystem::new(&state, 1e-8);
        assert_physical_root(&state, &step);
        assert!(step.radial_displacement(0) < 0.0);
    }

    fn assert_physical_root(state: &SolutionState, step: &StepVector) {
        let equations = EquationSystem::new(state, 1e-8);
        assert!(equations.residual(step).norm() < 1e-8);
        let lambda = step.lambda_dissipation();
        assert!((lambda - 1.0).abs() < 1e-3, "dissipation multiplier {}", lambda);
        let largest = state
            .nodes
            .iter()
            .map(|node| step.normal_displacement(node.index).abs())
            .fold(0.0, f64::max);
        assert!(largest > 1e-6 && largest < 1e3, "largest normal rate {}", largest);
    }

    #[test]
    fn two_particle_roots_are_physical_for_both_finders() {
        let (system, context) = fixtures::two_particles(12, 3);
        let state = SolutionState::new(&system, &context).expect("state");
        let tearing = solve(&state, RootFinderKind::Tearing);
        let monolithic = solve(&state, RootFinderKind::Monolithic);
        assert_physical_root(&state, &tearing);
        assert_physical_root(&state, &monolithic);
        let difference = (tearing.values() - monolithic.values()).abs().max();
        assert!(difference < 1e-6, "difference {}", difference);
    }

    #[test]
    fn trivial_root_is_rejected() {
        let (system, context) = fixtures::two_particles(12, 3);
        let state = SolutionState::new(&system, &context).expect("state");
        let equations = EquationSystem::new(&state, 1e-8);
        let mut trivial = StepVector::zeros(Arc::new(StepVectorMap::new(&state)));
        trivial.set(Unknown::LambdaDissipation, -1.0);
        assert!(equations.residual(&trivial).norm() < 1e-12);

        for kind in [RootFinderKind::Tearing, RootFinderKind::Monolithic] {
            let err = kind
                .build(100, 1e-9)
                .find_root(&equations, trivial.clone())
                .expect_err("degenerate root");
            assert!(matches!(err, SinterError::DegenerateRoot { lambda, .. } if lambda == -1.0));
            assert!(err.is_recoverable());
        }
    }

    #[test]
    fn two_particle_resolve_is_idempotent() {
        let (system, context) = fixtures::two_particles(24, 5);
        let state = SolutionState::new(&system, &context).expect("state");
        let first = solve(&state, RootFinderKind::Tearing);
        let equations = EquationSystem::new(&state, 1e-8);
        let again = RootFinderKind::Tearing
            .build(100, 1e-8)
            .find_root(&equations, first.clone())
            .expect("root");
        assert_eq!(again.values(), first.values());
    }

    #[test]
    fn two_particle_root_conserves_particle_volumes() {
        let (system, context) = fixtures::two_particles(24, 5);
        let state = SolutionState::new(&system, &context).expect("state");
        let step = solve(&state, RootFinderKind::Tearing);
        for particle in &state.particles {
            let volume_rate: f64 = state
                .particle_nodes(particle.index)
                .iter()
                .map(|node| {
                    let gradient = node.geometry.volume_gradient;
                    gradient.normal * step.normal_displacement(node.index)
                        + gradient.tangential * step.tangential_displacement(node.index)
                })
                .sum();
            assert!(volume_rate.abs() < 1e-8, "particle {} volume rate {}", particle.index, volume_rate);
        }
    }

    #[test]
    fn triangle_root_satisfies_closure() {
        let (system, context) = fixtures::triangle(36, 3);
        let state = SolutionState::new(&system, &context).expect("state");
        let step = solve(&state, RootFinderKind::Tearing);
        assert_physical_root(&state, &step);
    }
}
