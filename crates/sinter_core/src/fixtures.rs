//! Geometry fixtures shared by the unit tests.

use crate::geometry::{PolarPoint, Vec2};
use crate::material::{
    InterfaceProperties, Material, MaterialId, MaterialInterface, MaterialRegistry,
    SinteringConditions,
};
use crate::model::ModelContext;
use crate::norm::Norm;
use crate::system::{NodeId, NodeState, NodeType, ParticleId, ParticleState, SystemState};
use std::f64::consts::PI;

pub const MATERIAL: MaterialId = MaterialId(1);

/// Materials for which SI and normalized units coincide.
pub fn unit_materials() -> (MaterialRegistry, SinteringConditions) {
    let mut registry = MaterialRegistry::new();
    registry
        .insert_material(Material {
            id: MATERIAL,
            name: "unit".into(),
            molar_volume: 1.0,
            equilibrium_vacancy_concentration: 1.0,
            surface: InterfaceProperties::new(1.0, 1.0),
        })
        .expect("material");
    registry
        .insert_interface(MaterialInterface {
            from: MATERIAL,
            to: MATERIAL,
            properties: InterfaceProperties::new(1.0, 0.5),
        })
        .expect("interface");
    let conditions = SinteringConditions {
        temperature: 1.0,
        duration: 1.0,
        gas_constant: 1.0,
    };
    (registry, conditions)
}

pub fn unit_context() -> ModelContext {
    let (registry, conditions) = unit_materials();
    ModelContext::new(registry, conditions, Norm::unit())
}

/// Single particle with radius `1 + amplitude cos(5 phi)`.
pub fn perturbed_circle(count: usize, amplitude: f64) -> SystemState {
    let nodes = (0..count)
        .map(|k| {
            let phi = 2.0 * PI * k as f64 / count as f64;
            NodeState::surface(
                NodeId(k as u64 + 1),
                PolarPoint::new(phi, 1.0 + amplitude * (5.0 * phi).cos()),
            )
        })
        .collect();
    SystemState {
        id: 0,
        time: 0.0,
        particles: vec![ParticleState {
            id: ParticleId(1),
            material: MATERIAL,
            center: [0.0, 0.0],
            rotation: 0.0,
            nodes,
        }],
    }
}

/// Two unit circles 1.9 apart joined by a straight grain boundary.
pub fn two_particles(surface_count: usize, grain_boundary_count: usize) -> (SystemState, ModelContext) {
    let system = cluster(
        &[(Vec2::new(0.0, 0.0), 0.0), (Vec2::new(1.9, 0.0), PI)],
        &[(0, 1)],
        surface_count,
        grain_boundary_count,
    );
    (system, unit_context())
}

/// Three unit circles on an equilateral triangle of side 1.9, all in mutual contact.
pub fn triangle(surface_count: usize, grain_boundary_count: usize) -> (SystemState, ModelContext) {
    let height = 1.9 * 3.0f64.sqrt() / 2.0;
    let system = cluster(
        &[
            (Vec2::new(0.0, 0.0), 0.0),
            (Vec2::new(1.9, 0.0), PI),
            (Vec2::new(0.95, height), PI / 3.0),
        ],
        &[(0, 1), (1, 2), (2, 0)],
        surface_count,
        grain_boundary_count,
    );
    (system, unit_context())
}

fn contact_node_id(particle: usize, other: usize, slot: usize) -> NodeId {
    NodeId((10_000 * (particle + 1) + 100 * (other + 1) + slot) as u64)
}

/// Unit circles with straight grain boundaries on every overlap.
fn cluster(
    particles: &[(Vec2, f64)],
    contacts: &[(usize, usize)],
    surface_count: usize,
    grain_boundary_count: usize,
) -> SystemState {
    let slots = grain_boundary_count + 2;
    let spacing = 2.0 * PI / surface_count as f64;
    let mut states = Vec::new();

    for (p, &(center, rotation)) in particles.iter().enumerate() {
        let mut regions = Vec::new();
        for &(a, b) in contacts {
            let other = match (a == p, b == p) {
                (true, _) => b,
                (_, true) => a,
                _ => continue,
            };
            let offset = particles[other].0 - center;
            let half = offset.norm() / 2.0;
            let h = (1.0 - half * half).sqrt();
            let alpha = offset.y.atan2(offset.x) - rotation;
            let nodes: Vec<NodeState> = (0..slots)
                .map(|slot| {
                    let y = -h + 2.0 * h * slot as f64 / (slots - 1) as f64;
                    let node_type = if slot == 0 || slot == slots - 1 {
                        NodeType::Neck
                    } else {
                        NodeType::GrainBoundary
                    };
                    NodeState::contact(
                        contact_node_id(p, other, slot),
                        PolarPoint::new(alpha + y.atan2(half), (half * half + y * y).sqrt()),
                        node_type,
                        contact_node_id(other, p, slots - 1 - slot),
                    )
                })
                .collect();
            regions.push(nodes);
        }

        let nodes = if regions.is_empty() {
            (0..surface_count)
                .map(|k| {
                    NodeState::surface(
                        NodeId((10_000 * (p + 1) + 5_000 + k) as u64),
                        PolarPoint::new(spacing * k as f64, 1.0),
                    )
                })
                .collect()
        } else {
            ring_with_regions(p, regions, spacing)
        };

        states.push(ParticleState {
            id: ParticleId(p as u64 + 1),
            material: MATERIAL,
            center: [center.x, center.y],
            rotation,
            nodes,
        });
    }

    SystemState {
        id: 0,
        time: 0.0,
        particles: states,
    }
}

fn ring_with_regions(p: usize, mut regions: Vec<Vec<NodeState>>, spacing: f64) -> Vec<NodeState> {
    let start = regions[0][0].coordinates.phi;
    let unwrap = |phi: f64| start + (phi - start).rem_euclid(2.0 * PI);
    for region in &mut regions {
        for node in region.iter_mut() {
            node.coordinates.phi = unwrap(node.coordinates.phi);
        }
    }
    regions.sort_by(|a, b| a[0].coordinates.phi.total_cmp(&b[0].coordinates.phi));

    let mut ring = Vec::new();
    let mut surface = 0;
    for (i, region) in regions.iter().enumerate() {
        ring.extend(region.iter().cloned());
        let arc_start = region[region.len() - 1].coordinates.phi;
        let arc_end = if i + 1 < regions.len() {
            regions[i + 1][0].coordinates.phi
        } else {
            start + 2.0 * PI
        };
        let length = arc_end - arc_start;
        let count = ((length / spacing).round() as usize).saturating_sub(1).max(1);
        for k in 1..=count {
            ring.push(NodeState::surface(
                NodeId((10_000 * (p + 1) + 5_000 + surface) as u64),
                PolarPoint::new(arc_start + length * k as f64 / (count + 1) as f64, 1.0),
            ));
            surface += 1;
        }
    }
    ring
}
