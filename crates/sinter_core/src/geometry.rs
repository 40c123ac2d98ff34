use nalgebra::{Rotation2, Vector2};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

pub type Vec2 = Vector2<f64>;

/// Point in a particle's local polar frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolarPoint {
    pub phi: f64,
    pub r: f64,
}

impl PolarPoint {
    pub fn new(phi: f64, r: f64) -> Self {
        Self { phi, r }
    }

    pub fn to_cartesian(self) -> Vec2 {
        Vec2::new(self.r * self.phi.cos(), self.r * self.phi.sin())
    }

    /// Converts `point` back to polar form, choosing the angle branch closest to `self.phi`.
    pub fn from_cartesian_near(point: Vec2, reference_phi: f64) -> Self {
        let phi = point.y.atan2(point.x);
        Self {
            phi: reference_phi + signed_angle(reference_phi, phi),
            r: point.norm(),
        }
    }
}

/// Pair of values belonging to the segment towards the upper and the lower ring neighbour.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ToUpperToLower<T> {
    pub to_upper: T,
    pub to_lower: T,
}

impl<T> ToUpperToLower<T> {
    pub fn new(to_upper: T, to_lower: T) -> Self {
        Self { to_upper, to_lower }
    }
}

/// Components of a quantity along the surface normal and tangent.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NormalTangential<T> {
    pub normal: T,
    pub tangential: T,
}

impl<T> NormalTangential<T> {
    pub fn new(normal: T, tangential: T) -> Self {
        Self { normal, tangential }
    }
}

impl NormalTangential<f64> {
    pub fn project(vector: Vec2, normal: Vec2, tangent: Vec2) -> Self {
        Self {
            normal: vector.dot(&normal),
            tangential: vector.dot(&tangent),
        }
    }
}

/// Shortest signed angle taking `from` onto `to`, in `(-pi, pi]`.
pub fn signed_angle(from: f64, to: f64) -> f64 {
    let mut diff = (to - from) % (2.0 * PI);
    if diff <= -PI {
        diff += 2.0 * PI;
    } else if diff > PI {
        diff -= 2.0 * PI;
    }
    diff
}

/// Unsigned angle between two vectors in `[0, pi]`.
pub fn angle_between(a: &Vec2, b: &Vec2) -> f64 {
    let denominator = a.norm() * b.norm();
    if denominator <= 0.0 {
        return 0.0;
    }
    (a.dot(b) / denominator).clamp(-1.0, 1.0).acos()
}

pub fn rotate(vector: &Vec2, angle: f64) -> Vec2 {
    Rotation2::new(angle) * vector
}

/// Rotation by -90 degrees; turns a counter-clockwise tangent into the outward normal.
pub fn rot_cw(v: &Vec2) -> Vec2 {
    Vec2::new(v.y, -v.x)
}

/// Rotation by +90 degrees, i.e. `z x v`.
pub fn rot_ccw(v: &Vec2) -> Vec2 {
    Vec2::new(-v.y, v.x)
}

pub fn cross(a: &Vec2, b: &Vec2) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Law of cosines: side opposite to `gamma` given the two enclosing sides.
pub fn cos_law_c(a: f64, b: f64, gamma: f64) -> f64 {
    (a * a + b * b - 2.0 * a * b * gamma.cos()).max(0.0).sqrt()
}

/// Law of sines: angle opposite to `a`, given side `c` opposite to `gamma`.
pub fn sin_law_alpha(a: f64, c: f64, gamma: f64) -> f64 {
    if c <= 0.0 {
        return 0.0;
    }
    (a * gamma.sin() / c).clamp(-1.0, 1.0).asin()
}
