use crate::equations::EquationSystem;
use crate::step_vector::{ContactUnknown, NodeUnknown, StepVector, StepVectorMap, Unknown};
use std::sync::Arc;

/// Heuristic initial guess from the local diffusion balance of every node.
///
/// With the dissipation multiplier at one, the normal stationarity row fixes
/// each volume multiplier, the flux rows fix the fluxes and the volume rows
/// the normal displacements. Contact displacements are averaged from the
/// constraint rows of their node pairs; all remaining multipliers start at zero.
/// For a particle without contacts the guess is already the exact root.
pub fn estimate_step(equations: &EquationSystem<'_>, map: Arc<StepVectorMap>) -> StepVector {
    let state = equations.state;
    let mut step = StepVector::zeros(map);
    step.set(Unknown::LambdaDissipation, 1.0);

    let potentials: Vec<f64> = state
        .nodes
        .iter()
        .map(|node| ratio(2.0 * node.geometry.gibbs_energy_gradient.normal, node.geometry.volume_gradient.normal))
        .collect();
    let fluxes: Vec<f64> = state
        .nodes
        .iter()
        .map(|node| ratio(potentials[node.upper] - potentials[node.index], 2.0 * equations.resistance(node)))
        .collect();

    for node in &state.nodes {
        let displacement = ratio(fluxes[node.index] - fluxes[node.lower], node.geometry.volume_gradient.normal);
        step.set(Unknown::Node(node.index, NodeUnknown::LambdaVolume), potentials[node.index]);
        step.set(Unknown::Node(node.index, NodeUnknown::FluxToUpper), fluxes[node.index]);
        step.set(Unknown::Node(node.index, NodeUnknown::NormalDisplacement), displacement);
    }

    for contact in &state.contacts {
        let (mut radial, mut angle, mut count) = (0.0, 0.0, 0usize);
        for pair in equations.contact_pairs(contact.index) {
            let (Some(from), Some(to)) = (equations.link_geometry(pair.from_node), equations.link_geometry(pair.to_node))
            else {
                continue;
            };
            let (u_from, u_to) = (step.normal_displacement(pair.from_node), step.normal_displacement(pair.to_node));
            radial += from.distance_gradient.normal * u_from + to.distance_gradient.normal * u_to;
            angle += from.direction_gradient.normal * u_from + to.direction_gradient.normal * u_to;
            count += 1;
        }
        if count > 0 {
            step.set(Unknown::Contact(contact.index, ContactUnknown::RadialDisplacement), radial / count as f64);
            step.set(Unknown::Contact(contact.index, ContactUnknown::AngleDisplacement), angle / count as f64);
        }
    }
    step
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator.abs() > f64::EPSILON {
        numerator / denominator
    } else {
        0.0
    }
}
