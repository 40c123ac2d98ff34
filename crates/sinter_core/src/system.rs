//! Plain value records describing a particle system.
//!
//! These are the input of a simulation and the snapshots handed to storage
//! and remeshers. They carry no derived geometry; see [`crate::model`] for the
//! evaluated model built from them.

use crate::geometry::PolarPoint;
use crate::material::MaterialId;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParticleId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

impl fmt::Display for ParticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "particle#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Surface,
    Neck,
    GrainBoundary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeState {
    pub id: NodeId,
    pub coordinates: PolarPoint,
    pub node_type: NodeType,
    /// Linked node in the other particle; required for neck and grain boundary nodes.
    #[serde(default)]
    pub contacted_node: Option<NodeId>,
}

impl NodeState {
    pub fn surface(id: NodeId, coordinates: PolarPoint) -> Self {
        Self {
            id,
            coordinates,
            node_type: NodeType::Surface,
            contacted_node: None,
        }
    }

    pub fn contact(id: NodeId, coordinates: PolarPoint, node_type: NodeType, contacted: NodeId) -> Self {
        Self {
            id,
            coordinates,
            node_type,
            contacted_node: Some(contacted),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticleState {
    pub id: ParticleId,
    pub material: MaterialId,
    pub center: [f64; 2],
    pub rotation: f64,
    /// Surface ring, counter-clockwise with monotonic angles.
    pub nodes: Vec<NodeState>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemState {
    pub id: u64,
    pub time: f64,
    /// The first particle is the root of the contact tree.
    pub particles: Vec<ParticleState>,
}

impl SystemState {
    pub fn node_count(&self) -> usize {
        self.particles.iter().map(|p| p.nodes.len()).sum()
    }
}
