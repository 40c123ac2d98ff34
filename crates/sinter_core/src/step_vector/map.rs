use crate::model::SolutionState;
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeUnknown {
    LambdaVolume,
    FluxToUpper,
    NormalDisplacement,
    TangentialDisplacement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContactUnknown {
    RadialDisplacement,
    AngleDisplacement,
    RotationDisplacement,
    LambdaTorque,
}

/// Multipliers shared by a linked pair of contact nodes, keyed by the `from` node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PairUnknown {
    LambdaContactDistance,
    LambdaContactDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClosureComponent {
    X,
    Y,
    Rotation,
}

/// Named unknown of the step vector. Entities are arena indices of the owning state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unknown {
    Node(usize, NodeUnknown),
    Contact(usize, ContactUnknown),
    Pair(usize, PairUnknown),
    Closure(usize, ClosureComponent),
    LambdaDissipation,
}

const NODE_UNKNOWNS: [NodeUnknown; 4] = [
    NodeUnknown::LambdaVolume,
    NodeUnknown::FluxToUpper,
    NodeUnknown::NormalDisplacement,
    NodeUnknown::TangentialDisplacement,
];

const CONTACT_UNKNOWNS: [ContactUnknown; 4] = [
    ContactUnknown::RadialDisplacement,
    ContactUnknown::AngleDisplacement,
    ContactUnknown::RotationDisplacement,
    ContactUnknown::LambdaTorque,
];

const CLOSURE_COMPONENTS: [ClosureComponent; 3] =
    [ClosureComponent::X, ClosureComponent::Y, ClosureComponent::Rotation];

/// Flat index layout of all unknowns of one [`SolutionState`].
///
/// Free surface nodes of each particle form one contiguous block. The border
/// block follows: per contact its rigid displacements and torque multiplier,
/// then per linked node pair the pair multipliers and the unknowns of both
/// contact nodes, then the cycle closure multipliers. The global dissipation
/// multiplier is the very last entry.
#[derive(Debug, Clone, PartialEq)]
pub struct StepVectorMap {
    unknowns: Vec<Unknown>,
    node_base: Vec<Option<usize>>,
    node_width: Vec<usize>,
    contact_base: Vec<usize>,
    pair_base: Vec<Option<usize>>,
    closure_base: Vec<usize>,
    particle_blocks: Vec<Range<usize>>,
    border: Range<usize>,
}

impl StepVectorMap {
    pub fn new(state: &SolutionState) -> Self {
        let mut map = Self {
            unknowns: Vec::new(),
            node_base: vec![None; state.nodes.len()],
            node_width: state
                .nodes
                .iter()
                .map(|n| if n.has_tangential_freedom() { 4 } else { 3 })
                .collect(),
            contact_base: Vec::with_capacity(state.contacts.len()),
            pair_base: vec![None; state.nodes.len()],
            closure_base: Vec::with_capacity(state.cycles.len()),
            particle_blocks: Vec::with_capacity(state.particles.len()),
            border: 0..0,
        };

        for particle in &state.particles {
            let start = map.unknowns.len();
            for node in state.particle_nodes(particle.index) {
                if node.contact().is_none() {
                    map.push_node(node.index);
                }
            }
            map.particle_blocks.push(start..map.unknowns.len());
        }

        let border_start = map.unknowns.len();
        for contact in &state.contacts {
            map.contact_base.push(map.unknowns.len());
            for unknown in CONTACT_UNKNOWNS {
                map.unknowns.push(Unknown::Contact(contact.index, unknown));
            }
            for &k in &contact.from_nodes {
                map.pair_base[k] = Some(map.unknowns.len());
                map.unknowns.push(Unknown::Pair(k, PairUnknown::LambdaContactDistance));
                map.unknowns.push(Unknown::Pair(k, PairUnknown::LambdaContactDirection));
                map.push_node(k);
                if let Some(partner) = state.contacted(&state.nodes[k]) {
                    map.push_node(partner.index);
                }
            }
        }
        for cycle in 0..state.cycles.len() {
            map.closure_base.push(map.unknowns.len());
            for component in CLOSURE_COMPONENTS {
                map.unknowns.push(Unknown::Closure(cycle, component));
            }
        }
        map.unknowns.push(Unknown::LambdaDissipation);
        map.border = border_start..map.unknowns.len();
        map
    }

    fn push_node(&mut self, node: usize) {
        self.node_base[node] = Some(self.unknowns.len());
        for unknown in &NODE_UNKNOWNS[..self.node_width[node]] {
            self.unknowns.push(Unknown::Node(node, *unknown));
        }
    }

    pub fn len(&self) -> usize {
        self.unknowns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.unknowns.is_empty()
    }

    pub fn unknowns(&self) -> &[Unknown] {
        &self.unknowns
    }

    pub fn unknown(&self, index: usize) -> Unknown {
        self.unknowns[index]
    }

    pub fn particle_blocks(&self) -> &[Range<usize>] {
        &self.particle_blocks
    }

    pub fn border(&self) -> Range<usize> {
        self.border.clone()
    }

    pub fn index(&self, unknown: Unknown) -> Option<usize> {
        match unknown {
            Unknown::Node(node, which) => {
                let offset = match which {
                    NodeUnknown::LambdaVolume => 0,
                    NodeUnknown::FluxToUpper => 1,
                    NodeUnknown::NormalDisplacement => 2,
                    NodeUnknown::TangentialDisplacement => 3,
                };
                let base = (*self.node_base.get(node)?)?;
                (offset < self.node_width[node]).then_some(base + offset)
            }
            Unknown::Contact(contact, which) => {
                let offset = match which {
                    ContactUnknown::RadialDisplacement => 0,
                    ContactUnknown::AngleDisplacement => 1,
                    ContactUnknown::RotationDisplacement => 2,
                    ContactUnknown::LambdaTorque => 3,
                };
                self.contact_base.get(contact).map(|base| base + offset)
            }
            Unknown::Pair(node, which) => {
                let base = (*self.pair_base.get(node)?)?;
                Some(match which {
                    PairUnknown::LambdaContactDistance => base,
                    PairUnknown::LambdaContactDirection => base + 1,
                })
            }
            Unknown::Closure(cycle, which) => {
                let base = *self.closure_base.get(cycle)?;
                Some(match which {
                    ClosureComponent::X => base,
                    ClosureComponent::Y => base + 1,
                    ClosureComponent::Rotation => base + 2,
                })
            }
            Unknown::LambdaDissipation => self.unknowns.len().checked_sub(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use std::collections::HashSet;

    fn assert_bijection(map: &StepVectorMap) {
        let mut seen = HashSet::new();
        for (i, unknown) in map.unknowns().iter().enumerate() {
            assert!(seen.insert(*unknown), "{:?} listed twice", unknown);
            assert_eq!(map.index(*unknown), Some(i), "{:?}", unknown);
        }
        assert_eq!(seen.len(), map.len());
    }

    #[test]
    fn single_particle_border_holds_only_dissipation_multiplier() {
        let system = fixtures::perturbed_circle(20, 0.05);
        let state = SolutionState::new(&system, &fixtures::unit_context()).expect("state");
        let map = StepVectorMap::new(&state);
        assert_bijection(&map);
        assert_eq!(map.len(), 3 * 20 + 1);
        assert_eq!(map.particle_blocks(), &[0..60]);
        assert_eq!(map.border(), 60..61);
        assert_eq!(map.unknown(60), Unknown::LambdaDissipation);
    }

    #[test]
    fn two_particle_layout_is_a_bijection() {
        let (system, context) = fixtures::two_particles(16, 5);
        let state = SolutionState::new(&system, &context).expect("state");
        let map = StepVectorMap::new(&state);
        assert_bijection(&map);

        let necks = state.nodes.iter().filter(|n| n.is_neck()).count();
        let pairs = state.contacts[0].pair_count();
        let expected = 3 * state.nodes.len() + necks + 4 + 2 * pairs + 1;
        assert_eq!(map.len(), expected);

        let blocks = map.particle_blocks();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].end, blocks[1].start);
        assert_eq!(blocks[1].end, map.border().start);
        assert_eq!(map.border().end, map.len());
        for node in &state.nodes {
            let index = map
                .index(Unknown::Node(node.index, NodeUnknown::NormalDisplacement))
                .expect("every node has a normal displacement");
            assert_eq!(node.contact().is_some(), map.border().contains(&index));
        }
    }

    #[test]
    fn tangential_unknown_exists_for_necks_only() {
        let (system, context) = fixtures::two_particles(16, 3);
        let state = SolutionState::new(&system, &context).expect("state");
        let map = StepVectorMap::new(&state);
        for node in &state.nodes {
            let tangential = map.index(Unknown::Node(node.index, NodeUnknown::TangentialDisplacement));
            assert_eq!(tangential.is_some(), node.is_neck());
        }
    }

    #[test]
    fn triangle_layout_includes_closure_unknowns() {
        let (system, context) = fixtures::triangle(36, 3);
        let state = SolutionState::new(&system, &context).expect("state");
        let map = StepVectorMap::new(&state);
        assert_bijection(&map);
        for component in CLOSURE_COMPONENTS {
            let index = map.index(Unknown::Closure(0, component)).expect("closure unknown");
            assert!(map.border().contains(&index));
        }
        assert!(map.index(Unknown::Closure(1, ClosureComponent::X)).is_none());
    }
}
