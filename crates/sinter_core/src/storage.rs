//! Sinks for simulation results and the records handed to them.
//!
//! Storage is fire-and-forget from the solver's point of view: a failing sink
//! is logged and skipped, it never changes the numerical result.

use crate::geometry::{ToUpperToLower, Vec2};
use crate::model::SolutionState;
use crate::norm::Norm;
use crate::step_vector::StepVector;
use crate::system::{NodeId, ParticleId, SystemState};
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Movement of one node within a time step, SI units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeTimeStep {
    pub node: NodeId,
    /// Distance moved along the outward normal.
    pub normal_displacement: f64,
    pub tangential_displacement: f64,
    /// Diffusional volume rates towards both ring neighbours.
    pub flux: ToUpperToLower<f64>,
}

/// Rigid movement of one particle within a time step, SI units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticleTimeStep {
    pub particle: ParticleId,
    pub horizontal_displacement: f64,
    pub vertical_displacement: f64,
    pub rotation_displacement: f64,
    pub nodes: Vec<NodeTimeStep>,
}

/// Link between two consecutive stored states.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTransition {
    pub input_state_id: u64,
    pub output_state_id: u64,
    /// SI width of the step.
    pub time_step_width: f64,
    pub particles: Vec<ParticleTimeStep>,
}

impl StateTransition {
    /// Record of the step taking `from` to `to` with normalized width `width`.
    pub fn between(from: &SolutionState, to: &SolutionState, step: &StepVector, width: f64, norm: &Norm) -> Self {
        let particles = from
            .particles
            .iter()
            .zip(&to.particles)
            .map(|(before, after)| {
                let shift: Vec2 = (after.center - before.center) * norm.length;
                let nodes = from
                    .particle_nodes(before.index)
                    .iter()
                    .map(|node| NodeTimeStep {
                        node: node.id,
                        normal_displacement: step.normal_displacement(node.index) * width * norm.length,
                        tangential_displacement: step.tangential_displacement(node.index) * width * norm.length,
                        flux: ToUpperToLower::new(
                            step.flux_to_upper(node.index) * norm.flux(),
                            -step.flux_to_upper(node.lower) * norm.flux(),
                        ),
                    })
                    .collect();
                ParticleTimeStep {
                    particle: before.id,
                    horizontal_displacement: shift.x,
                    vertical_displacement: shift.y,
                    rotation_displacement: after.rotation - before.rotation,
                    nodes,
                }
            })
            .collect();
        Self {
            input_state_id: from.id,
            output_state_id: to.id,
            time_step_width: width * norm.time,
            particles,
        }
    }
}

/// Receiver of states and transitions produced by a solver session.
pub trait SolutionStorage: Send {
    fn store_state(&mut self, state: &SystemState) -> Result<()>;

    fn store_state_transition(&mut self, transition: &StateTransition) -> Result<()>;
}

/// Keeps everything in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStorage {
    pub states: Vec<SystemState>,
    pub transitions: Vec<StateTransition>,
}

impl SolutionStorage for InMemoryStorage {
    fn store_state(&mut self, state: &SystemState) -> Result<()> {
        self.states.push(state.clone());
        Ok(())
    }

    fn store_state_transition(&mut self, transition: &StateTransition) -> Result<()> {
        self.transitions.push(transition.clone());
        Ok(())
    }
}

/// Forwards every record to all contained sinks.
///
/// Every sink receives the record even if an earlier one fails; the failures
/// are reported together afterwards.
#[derive(Default)]
pub struct CompoundStorage {
    sinks: Vec<Box<dyn SolutionStorage>>,
}

impl CompoundStorage {
    pub fn new(sinks: Vec<Box<dyn SolutionStorage>>) -> Self {
        Self { sinks }
    }

    pub fn push(&mut self, sink: Box<dyn SolutionStorage>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    fn forward(&mut self, mut store: impl FnMut(&mut dyn SolutionStorage) -> Result<()>) -> Result<()> {
        let failures: Vec<String> = self
            .sinks
            .iter_mut()
            .enumerate()
            .filter_map(|(i, sink)| store(sink.as_mut()).err().map(|e| format!("sink {}: {:#}", i, e)))
            .collect();
        if !failures.is_empty() {
            bail!("{} of {} sinks failed: {}", failures.len(), self.sinks.len(), failures.join("; "));
        }
        Ok(())
    }
}

impl SolutionStorage for CompoundStorage {
    fn store_state(&mut self, state: &SystemState) -> Result<()> {
        self.forward(|sink| sink.store_state(state))
    }

    fn store_state_transition(&mut self, transition: &StateTransition) -> Result<()> {
        self.forward(|sink| sink.store_state_transition(transition))
    }
}
