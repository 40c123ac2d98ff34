use crate::geometry::{rotate, Vec2};
use crate::material::MaterialId;
use crate::system::ParticleId;
use std::ops::Range;

/// Evaluated particle. Its nodes occupy the contiguous arena range `nodes`, in ring order.
#[derive(Debug, Clone)]
pub struct Particle {
    pub id: ParticleId,
    pub index: usize,
    pub material: MaterialId,
    pub center: Vec2,
    pub rotation: f64,
    /// Normalized `R T / (V_m c_v)` of the particle material.
    pub vacancy_volume_energy: f64,
    pub nodes: Range<usize>,
}

impl Particle {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Absolute position of a point given in the local particle frame.
    pub fn to_absolute(&self, local: &Vec2) -> Vec2 {
        self.center + rotate(local, self.rotation)
    }

    pub fn to_local(&self, absolute: &Vec2) -> Vec2 {
        rotate(&(absolute - self.center), -self.rotation)
    }
}
