//! Stationarity conditions of the sintering Lagrangian.
//!
//! Unknowns are the node rates (normal/tangential displacement, flux to the
//! upper neighbour), the rigid displacement rates of every contact and the
//! Lagrange multipliers of the constraints. Row `k` of the residual is the
//! derivative of the Lagrangian with respect to unknown `k`, so the Jacobian
//! is symmetric and shares the block layout of the [`StepVectorMap`].
//!
//! ```text
//! L = -(1 + lambda) sum_i G_i . w_i - lambda sum_i eta_i j_i^2
//!     + sum_i mu_i (V_i . w_i - j_i + j_{i-1})
//!     + sum_k lambda_d,k C_d,k + lambda_a,k C_a,k - eps/2 lambda_a,k^2
//!     + sum_c kappa_c T_c + sum_y zeta_y . K_y
//! ```

mod jacobian;
mod lagrangian;

use crate::geometry::{rot_ccw, Vec2};
use crate::model::{ContactGeometry, Node, SolutionState};
use crate::step_vector::{ClosureComponent, ContactUnknown, StepVector, StepVectorMap, Unknown};
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::{CooMatrix, CscMatrix};
use std::ops::Range;

/// Sparse row of the Jacobian as (column, value) pairs. Columns may repeat.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JacobianRow {
    pub entries: Vec<(usize, f64)>,
}

impl JacobianRow {
    /// Adds `value` at the column of `unknown`; unknowns absent from the map are skipped.
    pub fn push(&mut self, map: &StepVectorMap, unknown: Unknown, value: f64) {
        if let Some(column) = map.index(unknown) {
            self.entries.push((column, value));
        }
    }
}

/// Linked contact node pair, identified by the node on the contact's `from` particle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct NodePair {
    pub from_node: usize,
    pub to_node: usize,
    pub contact: usize,
}

/// Equations of one [`SolutionState`].
#[derive(Debug, Clone, Copy)]
pub struct EquationSystem<'a> {
    pub state: &'a SolutionState,
    /// Compliance of the contact direction constraints; keeps redundant
    /// direction constraints of straight grain boundaries well posed.
    pub direction_compliance: f64,
}

impl<'a> EquationSystem<'a> {
    pub fn new(state: &'a SolutionState, direction_compliance: f64) -> Self {
        Self {
            state,
            direction_compliance,
        }
    }

    pub fn residual(&self, step: &StepVector) -> DVector<f64> {
        self.residual_rows(step, 0..step.len())
    }

    pub fn residual_rows(&self, step: &StepVector, rows: Range<usize>) -> DVector<f64> {
        let map = step.map();
        DVector::from_iterator(rows.len(), rows.map(|row| self.row_value(step, map.unknown(row))))
    }

    pub fn jacobian_row(&self, step: &StepVector, row: usize) -> JacobianRow {
        self.row_derivative(step, step.map().unknown(row))
    }

    /// Full sparse Jacobian.
    pub fn jacobian(&self, step: &StepVector) -> CscMatrix<f64> {
        self.jacobian_block_sparse(step, 0..step.len(), 0..step.len())
    }

    /// Sparse sub-block of the Jacobian; entries outside `columns` are dropped.
    pub fn jacobian_block_sparse(
        &self,
        step: &StepVector,
        rows: Range<usize>,
        columns: Range<usize>,
    ) -> CscMatrix<f64> {
        let mut coo = CooMatrix::new(rows.len(), columns.len());
        for (local_row, row) in rows.enumerate() {
            for (column, value) in self.jacobian_row(step, row).entries {
                if columns.contains(&column) {
                    coo.push(local_row, column - columns.start, value);
                }
            }
        }
        CscMatrix::from(&coo)
    }

    /// Dense sub-block of the Jacobian; entries outside `columns` are dropped.
    pub fn jacobian_block(
        &self,
        step: &StepVector,
        rows: Range<usize>,
        columns: Range<usize>,
    ) -> DMatrix<f64> {
        let mut block = DMatrix::zeros(rows.len(), columns.len());
        for (local_row, row) in rows.enumerate() {
            for (column, value) in self.jacobian_row(step, row).entries {
                if columns.contains(&column) {
                    block[(local_row, column - columns.start)] += value;
                }
            }
        }
        block
    }

    pub(crate) fn node_pair(&self, node: &Node) -> Option<NodePair> {
        let link = node.contact()?;
        let contact = &self.state.contacts[link.contact];
        Some(if node.particle == contact.from {
            NodePair {
                from_node: node.index,
                to_node: link.contacted,
                contact: link.contact,
            }
        } else {
            NodePair {
                from_node: link.contacted,
                to_node: node.index,
                contact: link.contact,
            }
        })
    }

    pub(crate) fn contact_pairs(&self, contact: usize) -> impl Iterator<Item = NodePair> + '_ {
        self.state.contacts[contact]
            .from_nodes
            .iter()
            .filter_map(move |&k| self.node_pair(&self.state.nodes[k]))
    }

    pub(crate) fn link_geometry(&self, node: usize) -> Option<&'a ContactGeometry> {
        self.state.nodes[node].contact().map(|link| &link.geometry)
    }

    pub(crate) fn resistance(&self, node: &Node) -> f64 {
        node.flux_resistance(self.state.particles[node.particle].vacancy_volume_energy)
    }

    /// Coefficients of the closure constraints of `cycle` as
    /// (contact unknown, [x, y, rotation]) pairs.
    pub(crate) fn closure_coefficients(&self, cycle: usize) -> Vec<(Unknown, [f64; 3])> {
        let state = self.state;
        let cycle = &state.cycles[cycle];
        let closing = &state.contacts[cycle.contact];
        let end = state.particles[closing.to].center;
        let mut coefficients = Vec::new();

        let paths = [(&cycle.to_path, 1.0), (&cycle.from_path, -1.0)];
        for (path, sign) in paths {
            for &m in path.iter() {
                let contact = &state.contacts[m];
                let (e, e_perp) = contact_frame(contact.direction);
                let lever = rot_ccw(&(end - state.particles[contact.to].center));
                coefficients.push((
                    Unknown::Contact(m, ContactUnknown::RadialDisplacement),
                    [sign * e.x, sign * e.y, 0.0],
                ));
                coefficients.push((
                    Unknown::Contact(m, ContactUnknown::AngleDisplacement),
                    [
                        sign * contact.distance * e_perp.x,
                        sign * contact.distance * e_perp.y,
                        0.0,
                    ],
                ));
                coefficients.push((
                    Unknown::Contact(m, ContactUnknown::RotationDisplacement),
                    [sign * lever.x, sign * lever.y, sign],
                ));
            }
        }

        let (e, e_perp) = contact_frame(closing.direction);
        coefficients.push((
            Unknown::Contact(cycle.contact, ContactUnknown::RadialDisplacement),
            [-e.x, -e.y, 0.0],
        ));
        coefficients.push((
            Unknown::Contact(cycle.contact, ContactUnknown::AngleDisplacement),
            [
                -closing.distance * e_perp.x,
                -closing.distance * e_perp.y,
                0.0,
            ],
        ));
        coefficients.push((
            Unknown::Contact(cycle.contact, ContactUnknown::RotationDisplacement),
            [0.0, 0.0, -1.0],
        ));
        coefficients
    }

    /// Closure multipliers weighting `unknown` in any cycle, as (multiplier, coefficient).
    pub(crate) fn closure_terms(&self, unknown: Unknown) -> Vec<(Unknown, f64)> {
        let mut terms = Vec::new();
        for cycle in 0..self.state.cycles.len() {
            for (candidate, coefficients) in self.closure_coefficients(cycle) {
                if candidate != unknown {
                    continue;
                }
                for (component, coefficient) in CLOSURE_COMPONENTS.iter().zip(coefficients) {
                    if coefficient != 0.0 {
                        terms.push((Unknown::Closure(cycle, *component), coefficient));
                    }
                }
            }
        }
        terms
    }
}

pub(crate) const CLOSURE_COMPONENTS: [ClosureComponent; 3] =
    [ClosureComponent::X, ClosureComponent::Y, ClosureComponent::Rotation];

pub(crate) fn component_index(component: ClosureComponent) -> usize {
    match component {
        ClosureComponent::X => 0,
        ClosureComponent::Y => 1,
        ClosureComponent::Rotation => 2,
    }
}

fn contact_frame(direction: f64) -> (Vec2, Vec2) {
    let e = Vec2::new(direction.cos(), direction.sin());
    (e, rot_ccw(&e))
}
