//! Rules turning a solved root into the step that is applied to the state.

use crate::step_vector::StepVector;
use serde::{Deserialize, Serialize};

/// Combines the root of the current state with the previously applied step.
pub trait TimeStepper: Send + Sync {
    fn step(&self, root: StepVector, previous: Option<&StepVector>) -> StepVector;
}

/// Applies the root as is.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExplicitEuler;

impl TimeStepper for ExplicitEuler {
    fn step(&self, root: StepVector, _previous: Option<&StepVector>) -> StepVector {
        root
    }
}

/// Trapezoidal rule over the previous and the current rates.
///
/// Falls back to the root when there is no previous step or the previous
/// step was computed on a different unknown layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdamsMoulton;

impl TimeStepper for AdamsMoulton {
    fn step(&self, root: StepVector, previous: Option<&StepVector>) -> StepVector {
        match previous {
            Some(previous) if previous.map() == root.map() => {
                let averaged = (root.values() + previous.values()) * 0.5;
                let mut step = root;
                step.set_block(0..averaged.len(), &averaged);
                step
            }
            _ => root,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeStepperKind {
    ExplicitEuler,
    AdamsMoulton,
}

impl TimeStepperKind {
    pub fn build(self) -> Box<dyn TimeStepper> {
        match self {
            TimeStepperKind::ExplicitEuler => Box::new(ExplicitEuler),
            TimeStepperKind::AdamsMoulton => Box::new(AdamsMoulton),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::model::SolutionState;
    use crate::step_vector::StepVectorMap;
    use nalgebra::DVector;
    use std::sync::Arc;

    fn filled(map: &Arc<StepVectorMap>, value: f64) -> StepVector {
        StepVector::from_values(map.clone(), DVector::from_element(map.len(), value)).expect("step")
    }

    fn circle_map(nodes: usize) -> Arc<StepVectorMap> {
        let system = fixtures::perturbed_circle(nodes, 0.05);
        let state = SolutionState::new(&system, &fixtures::unit_context()).expect("state");
        Arc::new(StepVectorMap::new(&state))
    }

    #[test]
    fn euler_ignores_the_previous_step() {
        let map = circle_map(12);
        let stepped = ExplicitEuler.step(filled(&map, 2.0), Some(&filled(&map, 4.0)));
        assert!(stepped.values().iter().all(|v| *v == 2.0));
    }

    #[test]
    fn adams_moulton_averages_with_the_previous_step() {
        let map = circle_map(12);
        let stepped = AdamsMoulton.step(filled(&map, 2.0), Some(&filled(&map, 4.0)));
        assert!(stepped.values().iter().all(|v| (v - 3.0).abs() < 1e-15));
    }

    #[test]
    fn adams_moulton_starts_and_restarts_with_the_root() {
        let map = circle_map(12);
        let first = AdamsMoulton.step(filled(&map, 2.0), None);
        assert!(first.values().iter().all(|v| *v == 2.0));

        let other = circle_map(16);
        let after_remesh = AdamsMoulton.step(filled(&map, 2.0), Some(&filled(&other, 4.0)));
        assert!(after_remesh.values().iter().all(|v| *v == 2.0));
    }

    #[test]
    fn kind_round_trips_through_json() {
        let kind: TimeStepperKind = serde_json::from_str(r#""ExplicitEuler""#).expect("kind");
        assert_eq!(kind, TimeStepperKind::ExplicitEuler);
    }
}
