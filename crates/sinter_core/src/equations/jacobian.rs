use super::{component_index, EquationSystem, JacobianRow, NodePair};
use crate::geometry::NormalTangential;
use crate::model::Node;
use crate::step_vector::{ContactUnknown, NodeUnknown, PairUnknown, StepVector, StepVectorMap, Unknown};

impl EquationSystem<'_> {
    /// Gradient of the residual row belonging to `unknown`.
    pub(crate) fn row_derivative(&self, step: &StepVector, unknown: Unknown) -> JacobianRow {
        let state = self.state;
        let map: &StepVectorMap = step.map();
        let mut row = JacobianRow::default();
        match unknown {
            Unknown::Node(i, NodeUnknown::LambdaVolume) => {
                let node = &state.nodes[i];
                let gradient = node.geometry.volume_gradient;
                row.push(map, Unknown::Node(i, NodeUnknown::NormalDisplacement), gradient.normal);
                row.push(map, Unknown::Node(i, NodeUnknown::TangentialDisplacement), gradient.tangential);
                row.push(map, Unknown::Node(i, NodeUnknown::FluxToUpper), -1.0);
                row.push(map, Unknown::Node(node.lower, NodeUnknown::FluxToUpper), 1.0);
            }
            Unknown::Node(i, NodeUnknown::FluxToUpper) => {
                let node = &state.nodes[i];
                let eta = self.resistance(node);
                row.push(map, unknown, -2.0 * step.lambda_dissipation() * eta);
                row.push(map, Unknown::LambdaDissipation, -2.0 * eta * step.flux_to_upper(i));
                row.push(map, Unknown::Node(i, NodeUnknown::LambdaVolume), -1.0);
                row.push(map, Unknown::Node(node.upper, NodeUnknown::LambdaVolume), 1.0);
            }
            Unknown::Node(i, NodeUnknown::NormalDisplacement) => {
                self.displacement_row(map, &mut row, &state.nodes[i], |g| g.normal);
            }
            Unknown::Node(i, NodeUnknown::TangentialDisplacement) => {
                self.displacement_row(map, &mut row, &state.nodes[i], |g| g.tangential);
            }
            Unknown::Contact(c, ContactUnknown::RadialDisplacement) => {
                for pair in self.contact_pairs(c) {
                    row.push(map, Unknown::Pair(pair.from_node, PairUnknown::LambdaContactDistance), -1.0);
                }
                self.push_closure_terms(map, &mut row, unknown);
            }
            Unknown::Contact(c, ContactUnknown::AngleDisplacement) => {
                for pair in self.contact_pairs(c) {
                    row.push(map, Unknown::Pair(pair.from_node, PairUnknown::LambdaContactDirection), -1.0);
                }
                self.push_closure_terms(map, &mut row, unknown);
            }
            Unknown::Contact(c, ContactUnknown::RotationDisplacement) => {
                for pair in self.contact_pairs(c) {
                    if let Some(to) = self.link_geometry(pair.to_node) {
                        row.push(
                            map,
                            Unknown::Pair(pair.from_node, PairUnknown::LambdaContactDistance),
                            to.rotation_distance_gradient,
                        );
                        row.push(
                            map,
                            Unknown::Pair(pair.from_node, PairUnknown::LambdaContactDirection),
                            to.rotation_direction_gradient,
                        );
                    }
                }
                self.push_closure_terms(map, &mut row, unknown);
            }
            Unknown::Contact(c, ContactUnknown::LambdaTorque) => {
                for pair in self.contact_pairs(c) {
                    for k in [pair.from_node, pair.to_node] {
                        if let Some(geometry) = self.link_geometry(k) {
                            push_node_rate(map, &mut row, k, &geometry.torque_lever_arm);
                        }
                    }
                }
            }
            Unknown::Pair(k, which) => {
                if let Some(pair) = self.node_pair(&state.nodes[k]) {
                    self.constraint_row(map, &mut row, pair, which);
                }
            }
            Unknown::Closure(cycle, component) => {
                let column = component_index(component);
                for (contact_unknown, coefficients) in self.closure_coefficients(cycle) {
                    if coefficients[column] != 0.0 {
                        row.push(map, contact_unknown, coefficients[column]);
                    }
                }
            }
            Unknown::LambdaDissipation => {
                for node in &state.nodes {
                    let gibbs = node.geometry.gibbs_energy_gradient;
                    let flux = step.flux_to_upper(node.index);
                    row.push(map, Unknown::Node(node.index, NodeUnknown::NormalDisplacement), -gibbs.normal);
                    row.push(
                        map,
                        Unknown::Node(node.index, NodeUnknown::TangentialDisplacement),
                        -gibbs.tangential,
                    );
                    row.push(
                        map,
                        Unknown::Node(node.index, NodeUnknown::FluxToUpper),
                        -2.0 * self.resistance(node) * flux,
                    );
                }
            }
        }
        row
    }

    fn displacement_row(
        &self,
        map: &StepVectorMap,
        row: &mut JacobianRow,
        node: &Node,
        component: impl Fn(&NormalTangential<f64>) -> f64,
    ) {
        let geometry = &node.geometry;
        row.push(map, Unknown::LambdaDissipation, -component(&geometry.gibbs_energy_gradient));
        row.push(
            map,
            Unknown::Node(node.index, NodeUnknown::LambdaVolume),
            component(&geometry.volume_gradient),
        );
        if let (Some(link), Some(pair)) = (node.contact(), self.node_pair(node)) {
            let contact = &link.geometry;
            row.push(
                map,
                Unknown::Pair(pair.from_node, PairUnknown::LambdaContactDistance),
                component(&contact.distance_gradient),
            );
            row.push(
                map,
                Unknown::Pair(pair.from_node, PairUnknown::LambdaContactDirection),
                component(&contact.direction_gradient),
            );
            row.push(
                map,
                Unknown::Contact(pair.contact, ContactUnknown::LambdaTorque),
                component(&contact.torque_lever_arm),
            );
        }
    }

    fn constraint_row(&self, map: &StepVectorMap, row: &mut JacobianRow, pair: NodePair, which: PairUnknown) {
        let (Some(from), Some(to)) = (self.link_geometry(pair.from_node), self.link_geometry(pair.to_node)) else {
            return;
        };
        match which {
            PairUnknown::LambdaContactDistance => {
                push_node_rate(map, row, pair.from_node, &from.distance_gradient);
                push_node_rate(map, row, pair.to_node, &to.distance_gradient);
                row.push(
                    map,
                    Unknown::Contact(pair.contact, ContactUnknown::RotationDisplacement),
                    to.rotation_distance_gradient,
                );
                row.push(map, Unknown::Contact(pair.contact, ContactUnknown::RadialDisplacement), -1.0);
            }
            PairUnknown::LambdaContactDirection => {
                push_node_rate(map, row, pair.from_node, &from.direction_gradient);
                push_node_rate(map, row, pair.to_node, &to.direction_gradient);
                row.push(
                    map,
                    Unknown::Contact(pair.contact, ContactUnknown::RotationDisplacement),
                    to.rotation_direction_gradient,
                );
                row.push(map, Unknown::Contact(pair.contact, ContactUnknown::AngleDisplacement), -1.0);
                row.push(
                    map,
                    Unknown::Pair(pair.from_node, PairUnknown::LambdaContactDirection),
                    -self.direction_compliance,
                );
            }
        }
    }

    fn push_closure_terms(&self, map: &StepVectorMap, row: &mut JacobianRow, unknown: Unknown) {
        for (multiplier, coefficient) in self.closure_terms(unknown) {
            row.push(map, multiplier, coefficient);
        }
    }
}

fn push_node_rate(map: &StepVectorMap, row: &mut JacobianRow, node: usize, gradient: &NormalTangential<f64>) {
    row.push(map, Unknown::Node(node, NodeUnknown::NormalDisplacement), gradient.normal);
    row.push(map, Unknown::Node(node, NodeUnknown::TangentialDisplacement), gradient.tangential);
}
