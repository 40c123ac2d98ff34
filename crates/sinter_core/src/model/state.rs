use super::graph::{ContactGraph, ParticleCycle};
use super::node::{segment_is_grain_boundary, ContactGeometry, ContactLink, Node, NodeGeometry, NodeKind, TangentRule};
use super::{ModelContext, Particle, ParticleContact};
use crate::error::{Result, SinterError};
use crate::geometry::{PolarPoint, ToUpperToLower, Vec2};
use crate::step_vector::StepVector;
use crate::system::{NodeId, NodeState, NodeType, ParticleState, SystemState};
use std::collections::{HashMap, HashSet};

/// Immutable snapshot of the particle system in normalized units.
///
/// Nodes of all particles live in one arena; each particle owns a contiguous
/// range of it. The first particle is the root of the contact spanning tree.
#[derive(Debug, Clone)]
pub struct SolutionState {
    pub id: u64,
    pub time: f64,
    pub particles: Vec<Particle>,
    pub nodes: Vec<Node>,
    pub contacts: Vec<ParticleContact>,
    pub cycles: Vec<ParticleCycle>,
    /// Tree contacts ordered so that every parent precedes its children.
    pub tree_order: Vec<usize>,
}

impl SolutionState {
    /// Evaluates a normalized system record.
    pub fn new(system: &SystemState, context: &ModelContext) -> Result<Self> {
        let (node_index, ranges) = index_system(system)?;
        let records: Vec<(&NodeState, usize)> = system
            .particles
            .iter()
            .enumerate()
            .flat_map(|(p, particle)| particle.nodes.iter().map(move |n| (n, p)))
            .collect();

        let contacted = resolve_contacts(&records, &node_index)?;

        let mut pair_index: HashMap<(usize, usize), usize> = HashMap::new();
        let mut pairs = Vec::new();
        let mut node_contact = vec![None; records.len()];
        for (i, partner) in contacted.iter().enumerate() {
            if let Some(j) = partner {
                let (a, b) = (records[i].1, records[*j].1);
                let key = (a.min(b), a.max(b));
                let next = pairs.len();
                let contact = *pair_index.entry(key).or_insert(next);
                if contact == next {
                    pairs.push(key);
                }
                node_contact[i] = Some(contact);
            }
        }
        let graph = ContactGraph::explore(system.particles.len(), &pairs)?;

        let particles = system
            .particles
            .iter()
            .enumerate()
            .map(|(index, record)| {
                Ok(Particle {
                    id: record.id,
                    index,
                    material: record.material,
                    center: Vec2::new(record.center[0], record.center[1]),
                    rotation: record.rotation,
                    vacancy_volume_energy: context.vacancy_volume_energy(record.material)?,
                    nodes: ranges[index].clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut nodes = Vec::with_capacity(records.len());
        for particle in &particles {
            let start = particle.nodes.start;
            let count = particle.node_count();
            for k in 0..count {
                let index = start + k;
                let upper = start + (k + 1) % count;
                let lower = start + (k + count - 1) % count;
                let node = build_node(
                    index,
                    upper,
                    lower,
                    &records,
                    &contacted,
                    &node_contact,
                    &particles,
                    context,
                )?;
                nodes.push(node);
            }
        }

        let mut contacts: Vec<ParticleContact> = graph
            .edges
            .iter()
            .enumerate()
            .map(|(index, edge)| {
                let offset = particles[edge.to].center - particles[edge.from].center;
                ParticleContact {
                    index,
                    from: edge.from,
                    to: edge.to,
                    from_nodes: Vec::new(),
                    in_tree: edge.in_tree,
                    distance: offset.norm(),
                    direction: offset.y.atan2(offset.x),
                }
            })
            .collect();
        for node in &nodes {
            if let Some(link) = node.contact() {
                let contact = &mut contacts[link.contact];
                if node.particle == contact.from {
                    contact.from_nodes.push(node.index);
                }
            }
        }

        for i in 0..nodes.len() {
            let partner = match contacted[i] {
                Some(j) => j,
                None => continue,
            };
            let own = &particles[nodes[i].particle];
            let other = &particles[nodes[partner].particle];
            let geometry = ContactGeometry::new(&nodes[i].geometry, own.center, own.rotation, other.center);
            if let NodeKind::Neck(link) | NodeKind::GrainBoundary(link) = &mut nodes[i].kind {
                link.geometry = geometry;
            }
        }

        Ok(Self {
            id: system.id,
            time: system.time,
            particles,
            nodes,
            contacts,
            cycles: graph.cycles,
            tree_order: graph.tree_order,
        })
    }

    pub fn particle_nodes(&self, particle: usize) -> &[Node] {
        &self.nodes[self.particles[particle].nodes.clone()]
    }

    /// Enclosed area of a particle, summed over the elements between each node and its upper neighbour.
    pub fn particle_volume(&self, particle: usize) -> f64 {
        self.particle_nodes(particle).iter().map(|n| n.geometry.volume.to_upper).sum()
    }

    pub fn total_volume(&self) -> f64 {
        (0..self.particles.len()).map(|p| self.particle_volume(p)).sum()
    }

    /// Contacted partner of a contact node.
    pub fn contacted(&self, node: &Node) -> Option<&Node> {
        node.contact().map(|link| &self.nodes[link.contacted])
    }

    pub fn absolute_position(&self, node: &Node) -> Vec2 {
        self.particles[node.particle].to_absolute(&node.geometry.position)
    }

    /// Normalized plain record of this state.
    pub fn to_system_state(&self) -> SystemState {
        SystemState {
            id: self.id,
            time: self.time,
            particles: self
                .particles
                .iter()
                .map(|particle| ParticleState {
                    id: particle.id,
                    material: particle.material,
                    center: [particle.center.x, particle.center.y],
                    rotation: particle.rotation,
                    nodes: self.particle_nodes(particle.index).iter().map(node_record).collect(),
                })
                .collect(),
        }
    }

    /// Advances every particle by `width` times the rates in `step`.
    ///
    /// The root particle stays in place; children follow their parent contact
    /// in tree order. Non-tree contacts only enter through the closure rows.
    pub fn apply_time_step(
        &self,
        step: &StepVector,
        width: f64,
        id: u64,
        context: &ModelContext,
    ) -> Result<SolutionState> {
        let mut centers: Vec<Vec2> = self.particles.iter().map(|p| p.center).collect();
        let mut rotations: Vec<f64> = self.particles.iter().map(|p| p.rotation).collect();

        for &c in &self.tree_order {
            let contact = &self.contacts[c];
            let parent_turn = rotations[contact.from] - self.particles[contact.from].rotation;
            let distance = contact.distance + width * step.radial_displacement(c);
            let direction = contact.direction + parent_turn + width * step.angle_displacement(c);
            centers[contact.to] =
                centers[contact.from] + Vec2::new(direction.cos(), direction.sin()) * distance;
            rotations[contact.to] = self.particles[contact.to].rotation
                + parent_turn
                + width * step.rotation_displacement(c);
        }

        let mut system = self.to_system_state();
        system.id = id;
        system.time = self.time + width;
        for (particle, record) in self.particles.iter().zip(system.particles.iter_mut()) {
            record.center = [centers[particle.index].x, centers[particle.index].y];
            record.rotation = rotations[particle.index];
            for (node, node_record) in self.particle_nodes(particle.index).iter().zip(record.nodes.iter_mut()) {
                let displacement = node.geometry.displacement(
                    step.normal_displacement(node.index),
                    step.tangential_displacement(node.index),
                ) * width;
                let moved = node.geometry.position + displacement;
                if !moved.x.is_finite() || !moved.y.is_finite() {
                    return Err(SinterError::InvalidState {
                        solver: "time step",
                        iteration: 0,
                        reason: format!("{} moved to a non-finite position", node.id),
                    });
                }
                node_record.coordinates = PolarPoint::from_cartesian_near(moved, node.coordinates.phi);
            }
        }

        SolutionState::new(&system, context)
    }

    /// Normalized record with every contact pair moved onto its common midpoint.
    pub fn sanitized(&self) -> SystemState {
        let mut system = self.to_system_state();
        let mut moved: HashMap<usize, PolarPoint> = HashMap::new();
        for contact in &self.contacts {
            for &k in &contact.from_nodes {
                let node = &self.nodes[k];
                let partner = match self.contacted(node) {
                    Some(partner) => partner,
                    None => continue,
                };
                let midpoint = (self.absolute_position(node) + self.absolute_position(partner)) * 0.5;
                for n in [node, partner] {
                    let local = self.particles[n.particle].to_local(&midpoint);
                    moved.insert(n.index, PolarPoint::from_cartesian_near(local, n.coordinates.phi));
                }
            }
        }
        for (particle, record) in self.particles.iter().zip(system.particles.iter_mut()) {
            for (offset, node_record) in record.nodes.iter_mut().enumerate() {
                if let Some(point) = moved.get(&(particle.nodes.start + offset)) {
                    node_record.coordinates = *point;
                }
            }
        }
        system
    }
}

fn node_record(node: &Node) -> NodeState {
    NodeState {
        id: node.id,
        coordinates: node.coordinates,
        node_type: node.node_type(),
        contacted_node: node.contact().map(|link| link.contacted_node),
    }
}

type SystemIndex = (HashMap<NodeId, usize>, Vec<std::ops::Range<usize>>);

fn index_system(system: &SystemState) -> Result<SystemIndex> {
    if system.particles.is_empty() {
        return Err(SinterError::InvalidInput("system contains no particles".into()));
    }
    let mut particle_ids = HashSet::new();
    let mut node_index = HashMap::new();
    let mut ranges = Vec::with_capacity(system.particles.len());
    let mut offset = 0;
    for particle in &system.particles {
        if particle.nodes.len() < 3 {
            return Err(SinterError::InvalidInput(format!(
                "{} needs at least three nodes",
                particle.id
            )));
        }
        if !particle_ids.insert(particle.id) {
            return Err(SinterError::InvalidInput(format!("duplicate {}", particle.id)));
        }
        for (k, node) in particle.nodes.iter().enumerate() {
            if !(node.coordinates.r >= 0.0) || !node.coordinates.phi.is_finite() {
                return Err(SinterError::InvalidInput(format!(
                    "{} has invalid coordinates",
                    node.id
                )));
            }
            if node_index.insert(node.id, offset + k).is_some() {
                return Err(SinterError::InvalidInput(format!("duplicate {}", node.id)));
            }
        }
        ranges.push(offset..offset + particle.nodes.len());
        offset += particle.nodes.len();
    }
    Ok((node_index, ranges))
}

fn resolve_contacts(
    records: &[(&NodeState, usize)],
    node_index: &HashMap<NodeId, usize>,
) -> Result<Vec<Option<usize>>> {
    records
        .iter()
        .map(|(node, particle)| match (node.node_type, node.contacted_node) {
            (NodeType::Surface, None) => Ok(None),
            (NodeType::Surface, Some(_)) => Err(SinterError::Topology(format!(
                "surface {} must not reference a contacted node",
                node.id
            ))),
            (_, None) => Err(SinterError::Topology(format!(
                "contact {} has no contacted node",
                node.id
            ))),
            (node_type, Some(contacted)) => {
                let j = *node_index.get(&contacted).ok_or_else(|| {
                    SinterError::Topology(format!(
                        "{} references missing contacted {}",
                        node.id, contacted
                    ))
                })?;
                let (partner, partner_particle) = records[j];
                if partner.contacted_node != Some(node.id) {
                    return Err(SinterError::Topology(format!(
                        "contact of {} and {} is not reciprocal",
                        node.id, partner.id
                    )));
                }
                if partner.node_type != node_type {
                    return Err(SinterError::Topology(format!(
                        "{} and {} are contacted but of different type",
                        node.id, partner.id
                    )));
                }
                if partner_particle == *particle {
                    return Err(SinterError::Topology(format!(
                        "{} contacts {} within the same particle",
                        node.id, partner.id
                    )));
                }
                Ok(Some(j))
            }
        })
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn build_node(
    index: usize,
    upper: usize,
    lower: usize,
    records: &[(&NodeState, usize)],
    contacted: &[Option<usize>],
    node_contact: &[Option<usize>],
    particles: &[Particle],
    context: &ModelContext,
) -> Result<Node> {
    let (record, particle) = records[index];
    let own_type = record.node_type;
    let upper_type = records[upper].0.node_type;
    let lower_type = records[lower].0.node_type;
    let material = particles[particle].material;

    // Material of the particle across the grain boundary segment between a and b.
    let across = |a: usize, b: usize| -> Option<usize> {
        contacted[a].or(contacted[b]).map(|partner| records[partner].1)
    };
    let upper_gb = segment_is_grain_boundary(own_type, upper_type);
    let lower_gb = segment_is_grain_boundary(lower_type, own_type);
    let to_upper = context.segment_properties(
        material,
        if upper_gb { across(index, upper).map(|p| particles[p].material) } else { None },
    )?;
    let to_lower = context.segment_properties(
        material,
        if lower_gb { across(index, lower).map(|p| particles[p].material) } else { None },
    )?;
    let interface_energy = ToUpperToLower::new(to_upper.energy, to_lower.energy);

    let rule = match own_type {
        NodeType::Neck if upper_gb => TangentRule::AlongUpper,
        NodeType::Neck if lower_gb => TangentRule::AlongLower,
        _ => TangentRule::Bisector,
    };
    let geometry = NodeGeometry::new(
        record.coordinates,
        records[upper].0.coordinates,
        records[lower].0.coordinates,
        rule,
        interface_energy,
    );

    let link = match (contacted[index], node_contact[index]) {
        (Some(partner), Some(contact)) => Some(ContactLink {
            contacted_node: records[partner].0.id,
            contacted_particle: particles[records[partner].1].id,
            contacted: partner,
            contact,
            geometry: ContactGeometry::default(),
        }),
        _ => None,
    };
    let kind = match (own_type, link) {
        (NodeType::Neck, Some(link)) => NodeKind::Neck(link),
        (NodeType::GrainBoundary, Some(link)) => NodeKind::GrainBoundary(link),
        _ => NodeKind::Surface,
    };

    Ok(Node {
        id: record.id,
        index,
        particle,
        upper,
        lower,
        coordinates: record.coordinates,
        kind,
        interface_energy,
        diffusion_coefficient: ToUpperToLower::new(
            to_upper.diffusion_coefficient,
            to_lower.diffusion_coefficient,
        ),
        geometry,
    })
}
