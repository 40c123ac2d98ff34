pub mod map;

pub use map::{ClosureComponent, ContactUnknown, NodeUnknown, PairUnknown, StepVectorMap, Unknown};

use crate::error::{Result, SinterError};
use nalgebra::DVector;
use std::ops::Range;
use std::sync::Arc;

/// Values of all unknowns of one time step, bound to a [`StepVectorMap`].
///
/// Displacements and fluxes are rates; the step width only enters when the
/// vector is applied to a state.
#[derive(Debug, Clone)]
pub struct StepVector {
    map: Arc<StepVectorMap>,
    values: DVector<f64>,
}

impl StepVector {
    pub fn zeros(map: Arc<StepVectorMap>) -> Self {
        let values = DVector::zeros(map.len());
        Self { map, values }
    }

    pub fn from_values(map: Arc<StepVectorMap>, values: DVector<f64>) -> Result<Self> {
        if values.len() != map.len() {
            return Err(SinterError::InvalidInput(format!(
                "step vector has {} values but the map defines {} unknowns",
                values.len(),
                map.len()
            )));
        }
        Ok(Self { map, values })
    }

    pub fn map(&self) -> &Arc<StepVectorMap> {
        &self.map
    }

    pub fn values(&self) -> &DVector<f64> {
        &self.values
    }

    pub fn into_values(self) -> DVector<f64> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of `unknown`, zero if the map does not define it.
    pub fn get(&self, unknown: Unknown) -> f64 {
        self.map.index(unknown).map_or(0.0, |i| self.values[i])
    }

    pub fn set(&mut self, unknown: Unknown, value: f64) {
        if let Some(i) = self.map.index(unknown) {
            self.values[i] = value;
        }
    }

    pub fn block(&self, range: Range<usize>) -> DVector<f64> {
        self.values.rows(range.start, range.len()).into_owned()
    }

    pub fn set_block(&mut self, range: Range<usize>, block: &DVector<f64>) {
        self.values.rows_mut(range.start, range.len()).copy_from(block);
    }

    pub fn lambda_volume(&self, node: usize) -> f64 {
        self.get(Unknown::Node(node, NodeUnknown::LambdaVolume))
    }

    pub fn flux_to_upper(&self, node: usize) -> f64 {
        self.get(Unknown::Node(node, NodeUnknown::FluxToUpper))
    }

    pub fn normal_displacement(&self, node: usize) -> f64 {
        self.get(Unknown::Node(node, NodeUnknown::NormalDisplacement))
    }

    pub fn tangential_displacement(&self, node: usize) -> f64 {
        self.get(Unknown::Node(node, NodeUnknown::TangentialDisplacement))
    }

    pub fn radial_displacement(&self, contact: usize) -> f64 {
        self.get(Unknown::Contact(contact, ContactUnknown::RadialDisplacement))
    }

    pub fn angle_displacement(&self, contact: usize) -> f64 {
        self.get(Unknown::Contact(contact, ContactUnknown::AngleDisplacement))
    }

    pub fn rotation_displacement(&self, contact: usize) -> f64 {
        self.get(Unknown::Contact(contact, ContactUnknown::RotationDisplacement))
    }

    pub fn lambda_torque(&self, contact: usize) -> f64 {
        self.get(Unknown::Contact(contact, ContactUnknown::LambdaTorque))
    }

    pub fn lambda_contact_distance(&self, from_node: usize) -> f64 {
        self.get(Unknown::Pair(from_node, PairUnknown::LambdaContactDistance))
    }

    pub fn lambda_contact_direction(&self, from_node: usize) -> f64 {
        self.get(Unknown::Pair(from_node, PairUnknown::LambdaContactDirection))
    }

    pub fn lambda_dissipation(&self) -> f64 {
        self.get(Unknown::LambdaDissipation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::model::SolutionState;

    #[test]
    fn named_access_matches_flat_layout() {
        let system = fixtures::perturbed_circle(8, 0.0);
        let state = SolutionState::new(&system, &fixtures::unit_context()).expect("state");
        let map = Arc::new(StepVectorMap::new(&state));
        let values = DVector::from_iterator(map.len(), (0..map.len()).map(|i| i as f64));
        let step = StepVector::from_values(map.clone(), values).expect("step");
        assert_eq!(step.lambda_volume(0), 0.0);
        assert_eq!(step.flux_to_upper(0), 1.0);
        assert_eq!(step.normal_displacement(1), 5.0);
        assert_eq!(step.tangential_displacement(1), 0.0);
        assert_eq!(step.lambda_dissipation(), (map.len() - 1) as f64);
    }

    #[test]
    fn rejects_mismatched_length() {
        let system = fixtures::perturbed_circle(8, 0.0);
        let state = SolutionState::new(&system, &fixtures::unit_context()).expect("state");
        let map = Arc::new(StepVectorMap::new(&state));
        let err = StepVector::from_values(map, DVector::zeros(3)).unwrap_err();
        assert!(err.to_string().contains("unknowns"));
    }
}
