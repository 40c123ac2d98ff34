use crate::model::SolutionState;
use std::collections::VecDeque;

/// Bounded stack of recently accepted states to roll back to.
///
/// Once full, pushing a state forgets the oldest one.
#[derive(Debug, Clone)]
pub struct StateHistory {
    capacity: usize,
    states: VecDeque<SolutionState>,
}

impl StateHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            states: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, state: SolutionState) {
        if self.capacity == 0 {
            return;
        }
        if self.states.len() == self.capacity {
            self.states.pop_front();
        }
        self.states.push_back(state);
    }

    /// Most recent state, removed from the history.
    pub fn pop(&mut self) -> Option<SolutionState> {
        self.states.pop_back()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

/// Escalating reaction to a failed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStage {
    /// Solve the same base state again, starting from the heuristic estimate.
    RetryFromEstimate,
    /// Step back to the previous accepted state and shrink the step width.
    RollBack,
}

impl RecoveryStage {
    /// Stage to use after a failure; a warm-started attempt is first retried cold.
    pub fn after_failure(warm_started: bool) -> Self {
        if warm_started {
            RecoveryStage::RetryFromEstimate
        } else {
            RecoveryStage::RollBack
        }
    }
}
