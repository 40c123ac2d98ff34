use crate::config::SolverOptions;
use crate::error::Result;
use crate::material::{MaterialRegistry, SinteringConditions};
use crate::model::{ModelContext, SolutionState};
use crate::norm::Norm;
use crate::recovery::StateHistory;
use crate::step_vector::{StepVector, StepVectorMap};
use crate::step_width::StepWidthController;
use crate::system::SystemState;

/// Mutable state owned by one run of the solver.
///
/// Everything that persists between time steps lives here: the current
/// state, the step width ratchet, the recovery history and the last accepted
/// step used for warm starts.
#[derive(Debug)]
pub struct SolverSession {
    pub context: ModelContext,
    /// Normalized end time.
    pub end_time: f64,
    pub current: SolutionState,
    pub last_step: Option<StepVector>,
    pub step_width: StepWidthController,
    pub history: StateHistory,
    pub step_index: usize,
    next_state_id: u64,
}

impl SolverSession {
    pub fn new(
        input: &SystemState,
        materials: MaterialRegistry,
        conditions: SinteringConditions,
        options: &SolverOptions,
    ) -> Result<Self> {
        let norm = Norm::from_system(input, &materials, &conditions)?;
        let end_time = input.time / norm.time + conditions.duration / norm.time;
        let context = ModelContext::new(materials, conditions, norm);
        let current = SolutionState::new(&norm.normalize_state(input), &context)?;
        Ok(Self {
            context,
            end_time,
            current,
            last_step: None,
            step_width: StepWidthController::new(options),
            history: StateHistory::new(options.solution_memory_count),
            step_index: 0,
            next_state_id: input.id + 1,
        })
    }

    pub fn norm(&self) -> &Norm {
        &self.context.norm
    }

    /// Fresh id for a state created within this session.
    pub fn next_state_id(&mut self) -> u64 {
        let id = self.next_state_id;
        self.next_state_id += 1;
        id
    }

    /// Last accepted step if it was computed on the same unknown layout.
    pub fn warm_start(&self, map: &StepVectorMap) -> Option<StepVector> {
        self.last_step.as_ref().filter(|step| **step.map() == *map).cloned()
    }

    /// SI record of the current state.
    pub fn current_system_state(&self) -> SystemState {
        self.norm().denormalize_state(&self.current.to_system_state())
    }

    pub fn remaining_time(&self) -> f64 {
        self.end_time - self.current.time
    }

    pub fn is_finished(&self) -> bool {
        self.remaining_time() <= 1e-12 * self.end_time.abs().max(1.0)
    }
}
