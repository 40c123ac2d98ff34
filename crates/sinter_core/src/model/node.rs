use crate::geometry::{
    angle_between, cross, rot_ccw, rot_cw, rotate, signed_angle, NormalTangential, PolarPoint,
    ToUpperToLower, Vec2,
};
use crate::system::{NodeId, NodeType, ParticleId};

/// Evaluated surface node. Immutable once its [`crate::model::SolutionState`] is built.
///
/// `particle`, `upper`, `lower` and the contact link hold arena indices into
/// the owning state, so ring neighbours and contacted nodes are resolved by
/// lookup instead of references.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub index: usize,
    pub particle: usize,
    pub upper: usize,
    pub lower: usize,
    pub coordinates: PolarPoint,
    pub kind: NodeKind,
    pub interface_energy: ToUpperToLower<f64>,
    pub diffusion_coefficient: ToUpperToLower<f64>,
    pub geometry: NodeGeometry,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Surface,
    Neck(ContactLink),
    GrainBoundary(ContactLink),
}

/// Link of a contact node to its partner in the other particle.
#[derive(Debug, Clone)]
pub struct ContactLink {
    pub contacted_node: NodeId,
    pub contacted_particle: ParticleId,
    /// Arena index of the contacted node.
    pub contacted: usize,
    /// Index of the particle contact this node belongs to.
    pub contact: usize,
    pub geometry: ContactGeometry,
}

impl Node {
    pub fn node_type(&self) -> NodeType {
        match self.kind {
            NodeKind::Surface => NodeType::Surface,
            NodeKind::Neck(_) => NodeType::Neck,
            NodeKind::GrainBoundary(_) => NodeType::GrainBoundary,
        }
    }

    pub fn contact(&self) -> Option<&ContactLink> {
        match &self.kind {
            NodeKind::Surface => None,
            NodeKind::Neck(link) | NodeKind::GrainBoundary(link) => Some(link),
        }
    }

    pub fn is_neck(&self) -> bool {
        matches!(self.kind, NodeKind::Neck(_))
    }

    /// Whether the node carries a tangential displacement unknown.
    pub fn has_tangential_freedom(&self) -> bool {
        self.is_neck()
    }

    /// Dissipation factor of the flux towards the upper neighbour.
    pub fn flux_resistance(&self, vacancy_volume_energy: f64) -> f64 {
        vacancy_volume_energy * self.geometry.surface_distance.to_upper
            / self.diffusion_coefficient.to_upper
    }
}

/// Which direction the tangent of a node follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TangentRule {
    /// Bisector of the two forward chord directions.
    Bisector,
    /// Along the chord to the upper neighbour (neck whose upper segment is a grain boundary).
    AlongUpper,
    /// Along the chord coming from the lower neighbour.
    AlongLower,
}

/// Quantities derived from a node and its two ring neighbours, local particle frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeGeometry {
    pub position: Vec2,
    pub angle_distance: ToUpperToLower<f64>,
    pub surface_distance: ToUpperToLower<f64>,
    /// Angle at the node between the radius towards the center and each chord.
    pub surface_radius_angle: ToUpperToLower<f64>,
    /// Area of the triangle spanned by the center, the node and each neighbour.
    pub volume: ToUpperToLower<f64>,
    pub normal: Vec2,
    pub tangent: Vec2,
    /// Angle between the outward normal and each chord.
    pub surface_normal_angle: ToUpperToLower<f64>,
    pub surface_tangent_angle: ToUpperToLower<f64>,
    pub gibbs_energy_gradient: NormalTangential<f64>,
    pub volume_gradient: NormalTangential<f64>,
}

impl NodeGeometry {
    pub fn new(
        own: PolarPoint,
        upper: PolarPoint,
        lower: PolarPoint,
        rule: TangentRule,
        interface_energy: ToUpperToLower<f64>,
    ) -> Self {
        let p = own.to_cartesian();
        let pu = upper.to_cartesian();
        let pl = lower.to_cartesian();

        let to_upper = pu - p;
        let to_lower = pl - p;
        let surface_distance = ToUpperToLower::new(to_upper.norm(), to_lower.norm());
        let u_hat = unit_or_zero(&to_upper);
        let l_hat = unit_or_zero(&to_lower);

        let angle_distance = ToUpperToLower::new(
            signed_angle(own.phi, upper.phi),
            signed_angle(lower.phi, own.phi),
        );
        let inward = -p;
        let surface_radius_angle = ToUpperToLower::new(
            angle_between(&inward, &to_upper),
            angle_between(&inward, &to_lower),
        );
        let volume = ToUpperToLower::new(
            0.5 * own.r * upper.r * angle_distance.to_upper.sin(),
            0.5 * own.r * lower.r * angle_distance.to_lower.sin(),
        );

        let tangent = match rule {
            TangentRule::Bisector => unit_or_zero(&(u_hat - l_hat)),
            TangentRule::AlongUpper => u_hat,
            TangentRule::AlongLower => -l_hat,
        };
        let normal = rot_cw(&tangent);

        let surface_normal_angle = ToUpperToLower::new(
            angle_between(&normal, &to_upper),
            angle_between(&normal, &to_lower),
        );
        let surface_tangent_angle = ToUpperToLower::new(
            angle_between(&tangent, &to_upper),
            angle_between(&tangent, &to_lower),
        );

        let gibbs = -(u_hat * interface_energy.to_upper + l_hat * interface_energy.to_lower);
        let volume_rate = rot_cw(&(pu - pl)) * 0.5;

        Self {
            position: p,
            angle_distance,
            surface_distance,
            surface_radius_angle,
            volume,
            normal,
            tangent,
            surface_normal_angle,
            surface_tangent_angle,
            gibbs_energy_gradient: NormalTangential::project(gibbs, normal, tangent),
            volume_gradient: NormalTangential::project(volume_rate, normal, tangent),
        }
    }

    /// Local displacement vector of a normal/tangential rate pair.
    pub fn displacement(&self, normal: f64, tangential: f64) -> Vec2 {
        self.normal * normal + self.tangent * tangential
    }
}

/// Contact quantities of a contact node, absolute frame.
///
/// `e` denotes the unit vector from the own particle center towards the
/// contacted particle center; `r` the node position relative to its own center.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ContactGeometry {
    pub distance: f64,
    pub direction: f64,
    /// Rate of the center distance per unit node displacement.
    pub distance_gradient: NormalTangential<f64>,
    /// Rate of the contact direction angle per unit node displacement.
    pub direction_gradient: NormalTangential<f64>,
    /// Moment of a unit node displacement about the own particle center.
    pub torque_lever_arm: NormalTangential<f64>,
    /// `(z x r) . e`: radial shift of the node under a unit rotation of its particle.
    pub rotation_distance_gradient: f64,
    /// `(z x r) . e_perp / d`.
    pub rotation_direction_gradient: f64,
}

impl ContactGeometry {
    pub fn new(
        geometry: &NodeGeometry,
        own_center: Vec2,
        own_rotation: f64,
        contacted_center: Vec2,
    ) -> Self {
        let offset = contacted_center - own_center;
        let distance = offset.norm();
        let e = unit_or_zero(&offset);
        let e_perp = rot_ccw(&e);
        let normal = rotate(&geometry.normal, own_rotation);
        let tangent = rotate(&geometry.tangent, own_rotation);
        let r = rotate(&geometry.position, own_rotation);
        let lever = rot_ccw(&r);
        let inverse_distance = if distance > 0.0 { 1.0 / distance } else { 0.0 };

        Self {
            distance,
            direction: offset.y.atan2(offset.x),
            distance_gradient: NormalTangential::new(e.dot(&normal), e.dot(&tangent)),
            direction_gradient: NormalTangential::new(
                e_perp.dot(&normal) * inverse_distance,
                e_perp.dot(&tangent) * inverse_distance,
            ),
            torque_lever_arm: NormalTangential::new(cross(&r, &normal), cross(&r, &tangent)),
            rotation_distance_gradient: lever.dot(&e),
            rotation_direction_gradient: lever.dot(&e_perp) * inverse_distance,
        }
    }
}

fn unit_or_zero(v: &Vec2) -> Vec2 {
    let norm = v.norm();
    if norm > 0.0 {
        v / norm
    } else {
        Vec2::zeros()
    }
}

/// A ring segment is a grain boundary if either end is a grain boundary node
/// or both ends are necks.
pub fn segment_is_grain_boundary(a: NodeType, b: NodeType) -> bool {
    matches!(
        (a, b),
        (NodeType::GrainBoundary, _) | (_, NodeType::GrainBoundary) | (NodeType::Neck, NodeType::Neck)
    )
}
