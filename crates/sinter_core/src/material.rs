use crate::error::{Result, SinterError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MaterialId(pub u64);

/// Energy and diffusion coefficient of a surface or an interface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InterfaceProperties {
    pub diffusion_coefficient: f64,
    pub energy: f64,
}

impl InterfaceProperties {
    pub fn new(diffusion_coefficient: f64, energy: f64) -> Self {
        Self {
            diffusion_coefficient,
            energy,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub id: MaterialId,
    pub name: String,
    pub molar_volume: f64,
    pub equilibrium_vacancy_concentration: f64,
    pub surface: InterfaceProperties,
}

/// Grain boundary properties between two materials (unordered pair).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialInterface {
    pub from: MaterialId,
    pub to: MaterialId,
    pub properties: InterfaceProperties,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinteringConditions {
    pub temperature: f64,
    pub duration: f64,
    pub gas_constant: f64,
}

impl Default for SinteringConditions {
    fn default() -> Self {
        Self {
            temperature: 2073.0,
            duration: 3600.0,
            gas_constant: 8.31446261815324,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MaterialRegistry {
    materials: HashMap<MaterialId, Material>,
    interfaces: HashMap<(MaterialId, MaterialId), InterfaceProperties>,
}

impl MaterialRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_material(&mut self, material: Material) -> Result<()> {
        if material.molar_volume <= 0.0 || material.equilibrium_vacancy_concentration <= 0.0 {
            return Err(SinterError::InvalidInput(format!(
                "material '{}' needs positive molar volume and vacancy concentration",
                material.name
            )));
        }
        if material.surface.diffusion_coefficient <= 0.0 {
            return Err(SinterError::InvalidInput(format!(
                "material '{}' needs a positive surface diffusion coefficient",
                material.name
            )));
        }
        self.materials.insert(material.id, material);
        Ok(())
    }

    pub fn insert_interface(&mut self, interface: MaterialInterface) -> Result<()> {
        if interface.properties.diffusion_coefficient <= 0.0 {
            return Err(SinterError::InvalidInput(format!(
                "interface {:?}/{:?} needs a positive diffusion coefficient",
                interface.from, interface.to
            )));
        }
        self.interfaces
            .insert(ordered(interface.from, interface.to), interface.properties);
        Ok(())
    }

    pub fn material(&self, id: MaterialId) -> Result<&Material> {
        self.materials
            .get(&id)
            .ok_or_else(|| SinterError::InvalidInput(format!("unknown material {:?}", id)))
    }

    pub fn interface(&self, a: MaterialId, b: MaterialId) -> Result<&InterfaceProperties> {
        self.interfaces.get(&ordered(a, b)).ok_or_else(|| {
            SinterError::InvalidInput(format!("no interface defined between {:?} and {:?}", a, b))
        })
    }

    /// Energy of one vacancy volume: `R T / (V_m c_v)`.
    pub fn vacancy_volume_energy(
        &self,
        id: MaterialId,
        conditions: &SinteringConditions,
    ) -> Result<f64> {
        let material = self.material(id)?;
        Ok(conditions.gas_constant * conditions.temperature
            / (material.molar_volume * material.equilibrium_vacancy_concentration))
    }
}

fn ordered(a: MaterialId, b: MaterialId) -> (MaterialId, MaterialId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}
