use crate::error::{Result, SinterError};
use crate::model::SolutionState;
use crate::step_vector::StepVector;

/// Inspects a solved step before it is applied.
pub trait StepValidator: Send + Sync {
    fn validate(&self, state: &SolutionState, step: &StepVector) -> Result<()>;
}

/// Rejects steps whose normal displacements zigzag around a particle ring.
///
/// Differences of consecutive normal displacements are compared along the
/// ring; three sign changes in a row mark a buckling surface. Differences
/// below `relative_tolerance` times the largest displacement of the particle,
/// or below `absolute_tolerance`, count as zero and break a run. Particles
/// whose displacements all stay below `absolute_tolerance` are not inspected.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstabilityDetector {
    pub flips: usize,
    pub relative_tolerance: f64,
    pub absolute_tolerance: f64,
}

impl Default for InstabilityDetector {
    fn default() -> Self {
        Self {
            flips: 3,
            relative_tolerance: 1e-6,
            absolute_tolerance: 1e-8,
        }
    }
}

impl InstabilityDetector {
    pub fn with_absolute_tolerance(self, absolute_tolerance: f64) -> Self {
        Self {
            absolute_tolerance,
            ..self
        }
    }
}

impl StepValidator for InstabilityDetector {
    fn validate(&self, state: &SolutionState, step: &StepVector) -> Result<()> {
        for particle in &state.particles {
            let nodes = state.particle_nodes(particle.index);
            let displacements: Vec<f64> = nodes.iter().map(|n| step.normal_displacement(n.index)).collect();
            let scale = displacements.iter().fold(0.0f64, |m, u| m.max(u.abs()));
            if scale <= self.absolute_tolerance {
                continue;
            }
            let threshold = (self.relative_tolerance * scale).max(self.absolute_tolerance);
            let count = displacements.len();
            let signs: Vec<i8> = (0..count)
                .map(|i| {
                    let diff = displacements[(i + 1) % count] - displacements[i];
                    if diff.abs() <= threshold {
                        0
                    } else if diff > 0.0 {
                        1
                    } else {
                        -1
                    }
                })
                .collect();

            let mut run = 0;
            // Two laps so that runs crossing the ring seam are seen.
            for i in 0..2 * count {
                let (previous, current) = (signs[i % count], signs[(i + 1) % count]);
                if previous != 0 && current == -previous {
                    run += 1;
                    if run >= self.flips {
                        let node = &nodes[(i + 1) % count];
                        return Err(SinterError::Instability {
                            particle: particle.id.0,
                            node: node.id.0,
                        });
                    }
                } else {
                    run = 0;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::step_vector::{NodeUnknown, StepVectorMap, Unknown};
    use std::sync::Arc;

    fn single_particle_step(displacement: impl Fn(usize) -> f64) -> (SolutionState, StepVector) {
        let system = fixtures::perturbed_circle(16, 0.0);
        let state = SolutionState::new(&system, &fixtures::unit_context()).expect("state");
        let mut step = StepVector::zeros(Arc::new(StepVectorMap::new(&state)));
        for node in &state.nodes {
            step.set(Unknown::Node(node.index, NodeUnknown::NormalDisplacement), displacement(node.index));
        }
        (state, step)
    }

    #[test]
    fn zigzag_is_rejected() {
        let (state, step) = single_particle_step(|i| if i % 2 == 0 { 1.0 } else { -1.0 });
        let err = InstabilityDetector::default().validate(&state, &step).unwrap_err();
        assert!(matches!(err, SinterError::Instability { particle: 1, .. }));
        assert!(err.is_recoverable());
    }

    #[test]
    fn smooth_mode_passes() {
        let (state, step) = single_particle_step(|i| (2.0 * 2.0 * std::f64::consts::PI * i as f64 / 16.0).cos());
        InstabilityDetector::default().validate(&state, &step).expect("smooth");
    }

    #[test]
    fn local_wiggle_shorter_than_three_flips_passes() {
        let (state, step) = single_particle_step(|i| match i {
            4 => 1.0,
            5 => -1.0,
            _ => 0.0,
        });
        InstabilityDetector::default().validate(&state, &step).expect("two flips only");
    }

    #[test]
    fn rounding_noise_on_uniform_rates_is_ignored() {
        let (state, step) = single_particle_step(|i| 0.5 + 1e-12 * if i % 2 == 0 { 1.0 } else { -1.0 });
        InstabilityDetector::default().validate(&state, &step).expect("noise");
    }

    #[test]
    fn round_off_on_a_resting_circle_is_ignored() {
        let (state, step) = single_particle_step(|i| if i % 2 == 0 { 1e-15 } else { -1e-15 });
        InstabilityDetector::default().validate(&state, &step).expect("resting circle");
    }

    #[test]
    fn absolute_floor_does_not_hide_small_real_zigzag() {
        let (state, step) = single_particle_step(|i| if i % 2 == 0 { 1e-6 } else { -1e-6 });
        let detector = InstabilityDetector::default().with_absolute_tolerance(1e-9);
        assert!(detector.validate(&state, &step).is_err());
    }

    #[test]
    fn solved_perfect_circle_passes() {
        let system = fixtures::perturbed_circle(16, 0.0);
        let state = SolutionState::new(&system, &fixtures::unit_context()).expect("state");
        let equations = crate::equations::EquationSystem::new(&state, 1e-8);
        let guess = crate::step_estimator::estimate_step(&equations, Arc::new(StepVectorMap::new(&state)));
        let step = crate::root_finding::RootFinderKind::Tearing
            .build(100, 1e-9)
            .find_root(&equations, guess)
            .expect("root");
        InstabilityDetector::default().validate(&state, &step).expect("perfect circle");
    }
}
