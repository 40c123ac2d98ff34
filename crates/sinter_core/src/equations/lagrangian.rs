use super::{component_index, EquationSystem, NodePair};
use crate::geometry::NormalTangential;
use crate::model::Node;
use crate::step_vector::{ContactUnknown, NodeUnknown, PairUnknown, StepVector, Unknown};

impl EquationSystem<'_> {
    /// Derivative of the Lagrangian with respect to `unknown`.
    pub(crate) fn row_value(&self, step: &StepVector, unknown: Unknown) -> f64 {
        let state = self.state;
        match unknown {
            Unknown::Node(i, NodeUnknown::LambdaVolume) => self.volume_balance(step, &state.nodes[i]),
            Unknown::Node(i, NodeUnknown::FluxToUpper) => self.flux_stationarity(step, &state.nodes[i]),
            Unknown::Node(i, NodeUnknown::NormalDisplacement) => {
                let node = &state.nodes[i];
                let contact = self.contact_forces(step, node, |g| g.normal);
                -(1.0 + step.lambda_dissipation()) * node.geometry.gibbs_energy_gradient.normal
                    + step.lambda_volume(i) * node.geometry.volume_gradient.normal
                    + contact
            }
            Unknown::Node(i, NodeUnknown::TangentialDisplacement) => {
                let node = &state.nodes[i];
                let contact = self.contact_forces(step, node, |g| g.tangential);
                -(1.0 + step.lambda_dissipation()) * node.geometry.gibbs_energy_gradient.tangential
                    + step.lambda_volume(i) * node.geometry.volume_gradient.tangential
                    + contact
            }
            Unknown::Contact(c, ContactUnknown::RadialDisplacement) => {
                -self.contact_pairs(c).map(|p| step.lambda_contact_distance(p.from_node)).sum::<f64>()
                    + self.closure_forces(step, unknown)
            }
            Unknown::Contact(c, ContactUnknown::AngleDisplacement) => {
                -self.contact_pairs(c).map(|p| step.lambda_contact_direction(p.from_node)).sum::<f64>()
                    + self.closure_forces(step, unknown)
            }
            Unknown::Contact(c, ContactUnknown::RotationDisplacement) => {
                self.contact_pairs(c)
                    .filter_map(|p| {
                        let to = self.link_geometry(p.to_node)?;
                        Some(
                            step.lambda_contact_distance(p.from_node) * to.rotation_distance_gradient
                                + step.lambda_contact_direction(p.from_node) * to.rotation_direction_gradient,
                        )
                    })
                    .sum::<f64>()
                    + self.closure_forces(step, unknown)
            }
            Unknown::Contact(c, ContactUnknown::LambdaTorque) => self
                .contact_pairs(c)
                .flat_map(|p| [p.from_node, p.to_node])
                .filter_map(|k| {
                    let arm = self.link_geometry(k)?.torque_lever_arm;
                    Some(arm.normal * step.normal_displacement(k) + arm.tangential * step.tangential_displacement(k))
                })
                .sum(),
            Unknown::Pair(k, which) => {
                let pair = match self.node_pair(&state.nodes[k]) {
                    Some(pair) => pair,
                    None => return 0.0,
                };
                self.contact_constraint(step, pair, which)
            }
            Unknown::Closure(cycle, component) => {
                let column = component_index(component);
                self.closure_coefficients(cycle)
                    .into_iter()
                    .map(|(u, coefficients)| coefficients[column] * step.get(u))
                    .sum()
            }
            Unknown::LambdaDissipation => self.dissipation_equality(step),
        }
    }

    /// Volume rate of the node must equal the net flux it receives.
    fn volume_balance(&self, step: &StepVector, node: &Node) -> f64 {
        let gradient = node.geometry.volume_gradient;
        gradient.normal * step.normal_displacement(node.index)
            + gradient.tangential * step.tangential_displacement(node.index)
            - step.flux_to_upper(node.index)
            + step.flux_to_upper(node.lower)
    }

    fn flux_stationarity(&self, step: &StepVector, node: &Node) -> f64 {
        -2.0 * step.lambda_dissipation() * self.resistance(node) * step.flux_to_upper(node.index)
            - step.lambda_volume(node.index)
            + step.lambda_volume(node.upper)
    }

    /// Gibbs energy rate must equal the dissipation of all fluxes.
    fn dissipation_equality(&self, step: &StepVector) -> f64 {
        self.state
            .nodes
            .iter()
            .map(|node| {
                let gibbs = node.geometry.gibbs_energy_gradient;
                let flux = step.flux_to_upper(node.index);
                -gibbs.normal * step.normal_displacement(node.index)
                    - gibbs.tangential * step.tangential_displacement(node.index)
                    - self.resistance(node) * flux * flux
            })
            .sum()
    }

    /// Multiplier-weighted contact gradients acting on one displacement direction of `node`.
    fn contact_forces(
        &self,
        step: &StepVector,
        node: &Node,
        component: impl Fn(&NormalTangential<f64>) -> f64,
    ) -> f64 {
        let (link, pair) = match (node.contact(), self.node_pair(node)) {
            (Some(link), Some(pair)) => (link, pair),
            _ => return 0.0,
        };
        let geometry = &link.geometry;
        step.lambda_contact_distance(pair.from_node) * component(&geometry.distance_gradient)
            + step.lambda_contact_direction(pair.from_node) * component(&geometry.direction_gradient)
            + step.lambda_torque(pair.contact) * component(&geometry.torque_lever_arm)
    }

    /// Kinematic coupling of a contact node pair to the rigid contact displacements.
    fn contact_constraint(&self, step: &StepVector, pair: NodePair, which: PairUnknown) -> f64 {
        let (Some(from), Some(to)) = (self.link_geometry(pair.from_node), self.link_geometry(pair.to_node)) else {
            return 0.0;
        };
        let node_rate = |k: usize, gradient: &NormalTangential<f64>| {
            gradient.normal * step.normal_displacement(k) + gradient.tangential * step.tangential_displacement(k)
        };
        match which {
            PairUnknown::LambdaContactDistance => {
                node_rate(pair.from_node, &from.distance_gradient)
                    + node_rate(pair.to_node, &to.distance_gradient)
                    + to.rotation_distance_gradient * step.rotation_displacement(pair.contact)
                    - step.radial_displacement(pair.contact)
            }
            PairUnknown::LambdaContactDirection => {
                node_rate(pair.from_node, &from.direction_gradient)
                    + node_rate(pair.to_node, &to.direction_gradient)
                    + to.rotation_direction_gradient * step.rotation_displacement(pair.contact)
                    - step.angle_displacement(pair.contact)
                    - self.direction_compliance * step.lambda_contact_direction(pair.from_node)
            }
        }
    }

    fn closure_forces(&self, step: &StepVector, unknown: Unknown) -> f64 {
        self.closure_terms(unknown)
            .into_iter()
            .map(|(multiplier, coefficient)| coefficient * step.get(multiplier))
            .sum()
    }
}
