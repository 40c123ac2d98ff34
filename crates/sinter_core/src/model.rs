//! Evaluated particle model: nodes with cached geometry, particles, contacts
//! and the immutable [`SolutionState`] snapshot tying them together.

pub mod contact;
pub mod graph;
pub mod node;
pub mod particle;
pub mod state;

pub use contact::ParticleContact;
pub use graph::{ContactGraph, ParticleCycle};
pub use node::{ContactGeometry, ContactLink, Node, NodeGeometry, NodeKind};
pub use particle::Particle;
pub use state::SolutionState;

use crate::error::Result;
use crate::material::{InterfaceProperties, MaterialId, MaterialRegistry, SinteringConditions};
use crate::norm::Norm;

/// Material data and scales needed to evaluate a state in normalized units.
#[derive(Debug, Clone)]
pub struct ModelContext {
    pub materials: MaterialRegistry,
    pub conditions: SinteringConditions,
    pub norm: Norm,
}

impl ModelContext {
    pub fn new(materials: MaterialRegistry, conditions: SinteringConditions, norm: Norm) -> Self {
        Self {
            materials,
            conditions,
            norm,
        }
    }

    pub fn vacancy_volume_energy(&self, material: MaterialId) -> Result<f64> {
        Ok(self
            .materials
            .vacancy_volume_energy(material, &self.conditions)?
            / self.norm.vacancy_volume_energy)
    }

    /// Normalized properties of a ring segment of a particle made of `own`.
    ///
    /// Grain boundary segments carry half of the interface energy, the other
    /// half belongs to the contacted particle's ring.
    pub fn segment_properties(
        &self,
        own: MaterialId,
        contacted: Option<MaterialId>,
    ) -> Result<InterfaceProperties> {
        let properties = match contacted {
            Some(other) => {
                let interface = self.materials.interface(own, other)?;
                InterfaceProperties::new(interface.diffusion_coefficient, interface.energy / 2.0)
            }
            None => self.materials.material(own)?.surface,
        };
        Ok(InterfaceProperties::new(
            properties.diffusion_coefficient / self.norm.diffusion_coefficient,
            properties.energy / self.norm.energy,
        ))
    }
}
