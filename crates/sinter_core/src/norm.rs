use crate::error::{Result, SinterError};
use crate::material::{MaterialRegistry, SinteringConditions};
use crate::system::SystemState;
use serde::{Deserialize, Serialize};

/// Reference scales of the dimensionless formulation.
///
/// Length is the mean node radius of the first particle, energy and diffusion
/// scales are the surface values of its material. The time scale is chosen so
/// that normalized displacement rates are of order one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Norm {
    pub length: f64,
    pub time: f64,
    pub energy: f64,
    pub diffusion_coefficient: f64,
    pub vacancy_volume_energy: f64,
}

impl Norm {
    pub fn from_system(
        system: &SystemState,
        registry: &MaterialRegistry,
        conditions: &SinteringConditions,
    ) -> Result<Self> {
        let reference = system
            .particles
            .first()
            .ok_or_else(|| SinterError::InvalidInput("system contains no particles".into()))?;
        if reference.nodes.is_empty() {
            return Err(SinterError::InvalidInput(format!(
                "{} has no nodes",
                reference.id
            )));
        }
        let length = reference.nodes.iter().map(|n| n.coordinates.r).sum::<f64>()
            / reference.nodes.len() as f64;
        let material = registry.material(reference.material)?;
        let energy = material.surface.energy;
        let diffusion_coefficient = material.surface.diffusion_coefficient;
        let vacancy_volume_energy = registry.vacancy_volume_energy(reference.material, conditions)?;
        if length <= 0.0 || energy <= 0.0 {
            return Err(SinterError::InvalidInput(
                "reference length and surface energy must be positive".into(),
            ));
        }
        let time = vacancy_volume_energy * length.powi(4) / (energy * diffusion_coefficient);
        Ok(Self {
            length,
            time,
            energy,
            diffusion_coefficient,
            vacancy_volume_energy,
        })
    }

    /// Scales for SI quantities; identity when every reference is one.
    pub fn unit() -> Self {
        Self {
            length: 1.0,
            time: 1.0,
            energy: 1.0,
            diffusion_coefficient: 1.0,
            vacancy_volume_energy: 1.0,
        }
    }

    pub fn flux(&self) -> f64 {
        self.length * self.length / self.time
    }

    pub fn normalize_state(&self, system: &SystemState) -> SystemState {
        self.rescale_state(system, 1.0 / self.length, 1.0 / self.time)
    }

    pub fn denormalize_state(&self, system: &SystemState) -> SystemState {
        self.rescale_state(system, self.length, self.time)
    }

    fn rescale_state(&self, system: &SystemState, length: f64, time: f64) -> SystemState {
        let mut scaled = system.clone();
        scaled.time *= time;
        for particle in &mut scaled.particles {
            particle.center = [particle.center[0] * length, particle.center[1] * length];
            for node in &mut particle.nodes {
                node.coordinates.r *= length;
            }
        }
        scaled
    }
}
