//! Time integration driver.

use crate::config::SolverOptions;
use crate::equations::EquationSystem;
use crate::error::{Result, SinterError};
use crate::material::{MaterialRegistry, SinteringConditions};
use crate::model::SolutionState;
use crate::recovery::RecoveryStage;
use crate::remeshing::{remesh_all, Remesher};
use crate::root_finding::LagrangianRootFinder;
use crate::session::SolverSession;
use crate::step_estimator::estimate_step;
use crate::step_vector::{StepVector, StepVectorMap};
use crate::storage::{SolutionStorage, StateTransition};
use crate::system::SystemState;
use crate::time_stepping::TimeStepper;
use crate::validation::{InstabilityDetector, StepValidator};
use log::{error, info, warn};
use std::sync::Arc;

/// Accepted outcome of one time step.
struct AcceptedStep {
    base: SolutionState,
    step: StepVector,
    width: f64,
    next: SolutionState,
}

/// Sintering solver integrating a particle system up to the end of the
/// sintering duration.
pub struct SinteringSolver {
    options: SolverOptions,
    root_finder: Box<dyn LagrangianRootFinder>,
    time_stepper: Box<dyn TimeStepper>,
    validators: Vec<Box<dyn StepValidator>>,
    remeshers: Vec<Box<dyn Remesher>>,
}

impl SinteringSolver {
    pub fn new(options: SolverOptions) -> Result<Self> {
        options.validate()?;
        let mut validators: Vec<Box<dyn StepValidator>> = Vec::new();
        if options.instability_detection {
            validators.push(Box::new(
                InstabilityDetector::default().with_absolute_tolerance(options.accuracy),
            ));
        }
        Ok(Self {
            root_finder: options.root_finder(),
            time_stepper: options.time_stepper(),
            options,
            validators,
            remeshers: Vec::new(),
        })
    }

    pub fn options(&self) -> &SolverOptions {
        &self.options
    }

    pub fn with_root_finder(mut self, root_finder: Box<dyn LagrangianRootFinder>) -> Self {
        self.root_finder = root_finder;
        self
    }

    pub fn with_time_stepper(mut self, time_stepper: Box<dyn TimeStepper>) -> Self {
        self.time_stepper = time_stepper;
        self
    }

    pub fn with_validator(mut self, validator: Box<dyn StepValidator>) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn with_remesher(mut self, remesher: Box<dyn Remesher>) -> Self {
        self.remeshers.push(remesher);
        self
    }

    /// Integrates `input` (SI units) over the sintering duration and returns the final SI state.
    ///
    /// Every state and transition is handed to `storage`; storage failures are
    /// logged and otherwise ignored.
    pub fn solve(
        &self,
        input: &SystemState,
        materials: MaterialRegistry,
        conditions: SinteringConditions,
        storage: &mut dyn SolutionStorage,
    ) -> Result<SystemState> {
        let mut session = SolverSession::new(input, materials, conditions, &self.options)?;
        let initial_volume = session.current.total_volume();
        info!(
            "starting time integration of state {} with {} particles and {} nodes up to t = {:e} (volume {:e})",
            session.current.id,
            session.current.particles.len(),
            session.current.nodes.len(),
            session.end_time,
            initial_volume
        );
        report_state(storage, &session.current_system_state());

        while !session.is_finished() {
            let accepted = self.solve_step_until_valid(&mut session)?;
            let transition = StateTransition::between(
                &accepted.base,
                &accepted.next,
                &accepted.step,
                accepted.width,
                session.norm(),
            );

            session.history.push(accepted.base);
            session.current = accepted.next;
            session.last_step = Some(accepted.step);
            session.step_index += 1;
            report_transition(storage, &transition);
            report_state(storage, &session.current_system_state());
            info!(
                "time step {} accepted: t = {:e} of {:e} (width {:e})",
                session.step_index, session.current.time, session.end_time, accepted.width
            );

            let interval = self.options.remeshing_interval;
            if interval > 0 && session.step_index % interval == 0 && !session.is_finished() {
                self.remesh(&mut session)?;
                report_state(storage, &session.current_system_state());
            }
        }

        info!(
            "end time reached after {} steps, relative volume change {:e}",
            session.step_index,
            (session.current.total_volume() - initial_volume) / initial_volume
        );
        Ok(session.current_system_state())
    }

    /// Solves, validates and applies one step, escalating through the
    /// recovery stages on recoverable failures.
    fn solve_step_until_valid(&self, session: &mut SolverSession) -> Result<AcceptedStep> {
        let mut base = session.current.clone();
        let mut warm = true;
        let mut attempts = 0;

        loop {
            let failure = match self.attempt_step(session, &base, warm) {
                Ok(accepted) => return Ok(accepted),
                Err(e) if e.is_recoverable() => e,
                Err(e) => return Err(e),
            };
            error!("step from state {} (t = {:e}) failed: {}", base.id, base.time, failure);
            attempts += 1;
            if attempts > self.options.max_recovery_attempts {
                return Err(SinterError::RecoveryExhausted {
                    attempts,
                    source: Box::new(failure),
                });
            }

            match RecoveryStage::after_failure(warm && session.last_step.is_some()) {
                RecoveryStage::RetryFromEstimate => {
                    warn!("retrying state {} from the heuristic estimate", base.id);
                    warm = false;
                }
                RecoveryStage::RollBack => {
                    let previous = match session.history.pop() {
                        Some(previous) => previous,
                        None => {
                            return Err(SinterError::RecoveryExhausted {
                                attempts,
                                source: Box::new(failure),
                            })
                        }
                    };
                    let width = session.step_width.reduce()?;
                    warn!(
                        "rolling back from state {} to state {} with step width {:e}",
                        base.id, previous.id, width
                    );
                    base = previous;
                    session.last_step = None;
                    warm = false;
                }
            }
        }
    }

    fn attempt_step(&self, session: &mut SolverSession, base: &SolutionState, warm: bool) -> Result<AcceptedStep> {
        let equations = EquationSystem::new(base, self.options.direction_compliance);
        let map = Arc::new(StepVectorMap::new(base));
        let guess = match warm.then(|| session.warm_start(&map)).flatten() {
            Some(previous) => StepVector::from_values(map, previous.into_values())?,
            None => estimate_step(&equations, map),
        };

        let root = self.root_finder.find_root(&equations, guess)?;
        let step = self.time_stepper.step(root, session.last_step.as_ref());
        for validator in &self.validators {
            validator.validate(base, &step)?;
        }

        let remaining = session.end_time - base.time;
        let width = session.step_width.next_width(base, &step)?.min(remaining);
        let id = session.next_state_id();
        let next = base.apply_time_step(&step, width, id, &session.context)?;
        Ok(AcceptedStep {
            base: base.clone(),
            step,
            width,
            next,
        })
    }

    /// Sanitizes the current state, runs the remeshers on its SI record and
    /// restarts from the result.
    fn remesh(&self, session: &mut SolverSession) -> Result<()> {
        let norm = *session.norm();
        let mut sanitized = norm.denormalize_state(&session.current.sanitized());
        sanitized.id = session.next_state_id();
        let remeshed = remesh_all(&self.remeshers, sanitized).map_err(SinterError::Remeshing)?;
        session.current = SolutionState::new(&norm.normalize_state(&remeshed), &session.context)?;
        session.last_step = None;
        info!(
            "remeshed state {} now holds {} nodes",
            session.current.id,
            session.current.nodes.len()
        );
        Ok(())
    }
}

fn report_state(storage: &mut dyn SolutionStorage, state: &SystemState) {
    if let Err(e) = storage.store_state(state) {
        warn!("storing state {} failed: {:#}", state.id, e);
    }
}

fn report_transition(storage: &mut dyn SolutionStorage, transition: &StateTransition) {
    if let Err(e) = storage.store_state_transition(transition) {
        warn!(
            "storing transition {} -> {} failed: {:#}",
            transition.input_state_id, transition.output_state_id, e
        );
    }
}
