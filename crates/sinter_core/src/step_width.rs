use crate::config::SolverOptions;
use crate::error::{Result, SinterError};
use crate::geometry::{angle_between, cos_law_c, sin_law_alpha};
use crate::model::SolutionState;
use crate::step_vector::StepVector;

/// Adapts the time step width so that no surface segment turns by more than
/// the configured angle within one step.
///
/// The last accepted width is remembered and serves as the starting point of
/// the next step after scaling it by the increase factor.
#[derive(Debug, Clone)]
pub struct StepWidthController {
    initial: f64,
    min: f64,
    max: f64,
    increase: f64,
    decrease: f64,
    max_angle: f64,
    last: Option<f64>,
}

impl StepWidthController {
    pub fn new(options: &SolverOptions) -> Self {
        Self {
            initial: options.initial_time_step_width,
            min: options.min_time_step_width,
            max: options.max_time_step_width,
            increase: options.time_step_increase_factor,
            decrease: options.time_step_decrease_factor,
            max_angle: options.max_displacement_angle,
            last: None,
        }
    }

    /// Largest admissible width for the rates in `step`, ratcheting from the last one.
    pub fn next_width(&mut self, state: &SolutionState, step: &StepVector) -> Result<f64> {
        if let Some(i) = step.values().iter().position(|v| !v.is_finite()) {
            return Err(SinterError::InvalidState {
                solver: "step width",
                iteration: 0,
                reason: format!("rate {} is {}", i, step.values()[i]),
            });
        }

        let mut width = self
            .last
            .map_or(self.initial, |last| last * self.increase)
            .min(self.max);
        while max_segment_rotation(state, step, width) >= self.max_angle {
            width *= self.decrease;
            if width < self.min {
                return Err(SinterError::StepWidthUnderflow {
                    width,
                    minimum: self.min,
                });
            }
        }
        self.last = Some(width);
        Ok(width)
    }

    /// Shrinks the remembered width after a rejected step.
    pub fn reduce(&mut self) -> Result<f64> {
        let width = self.last.unwrap_or(self.initial) * self.decrease;
        if width < self.min {
            return Err(SinterError::StepWidthUnderflow {
                width,
                minimum: self.min,
            });
        }
        // Stored divided by the increase factor so the next step starts exactly here.
        self.last = Some(width / self.increase);
        Ok(width)
    }
}

/// Worst rotation of a ring segment seen from its fixed neighbour when every
/// node moves by `width` times its displacement rate.
pub fn max_segment_rotation(state: &SolutionState, step: &StepVector, width: f64) -> f64 {
    state
        .nodes
        .iter()
        .map(|node| {
            let displacement = node.geometry.displacement(
                step.normal_displacement(node.index),
                step.tangential_displacement(node.index),
            ) * width;
            let delta = displacement.norm();
            if delta == 0.0 {
                return 0.0;
            }
            [node.upper, node.lower]
                .into_iter()
                .map(|neighbour| {
                    let chord = state.nodes[neighbour].geometry.position - node.geometry.position;
                    let beta = angle_between(&displacement, &chord);
                    let moved = cos_law_c(delta, chord.norm(), beta);
                    sin_law_alpha(delta, moved, beta).abs()
                })
                .fold(0.0, f64::max)
        })
        .fold(0.0, f64::max)
}
