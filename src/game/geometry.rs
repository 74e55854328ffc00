//! Axis-aligned bounding volumes and segment tests

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// World axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// Unit vector pointing along the positive direction of the axis
    pub fn unit(self) -> Vec3 {
        match self {
            Axis::X => Vec3::X,
            Axis::Y => Vec3::Y,
            Axis::Z => Vec3::Z,
        }
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Build a box from two corners in any order
    pub fn new(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Box centered on `center` with the given half extents
    pub fn from_center(center: Vec3, half_extents: Vec3) -> Self {
        Self::new(center - half_extents, center + half_extents)
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Grow the box in the direction of `delta` only (swept volume)
    pub fn stretch(&self, delta: Vec3) -> Self {
        Self {
            min: self.min + delta.min(Vec3::ZERO),
            max: self.max + delta.max(Vec3::ZERO),
        }
    }

    /// Grow the box by `margin` on every side
    pub fn expand(&self, margin: f32) -> Self {
        Self {
            min: self.min - Vec3::splat(margin),
            max: self.max + Vec3::splat(margin),
        }
    }

    /// Extrude both ends of the box along `axis` by `distance`
    pub fn extrude(&self, axis: Axis, distance: f32) -> Self {
        let offset = axis.unit() * distance;
        Self::new(self.min - offset, self.max + offset)
    }

    pub fn contains(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.cmple(other.max).all() && self.max.cmpge(other.min).all()
    }

    /// First point of the segment `from -> to` that lies inside the box.
    ///
    /// Slab test. Returns `from` itself when the segment starts inside.
    pub fn raycast(&self, from: Vec3, to: Vec3) -> Option<Vec3> {
        let delta = to - from;
        let mut t_enter = 0.0_f32;
        let mut t_exit = 1.0_f32;

        for axis in 0..3 {
            let origin = from[axis];
            let dir = delta[axis];
            let (lo, hi) = (self.min[axis], self.max[axis]);

            if dir.abs() < f32::EPSILON {
                if origin < lo || origin > hi {
                    return None;
                }
                continue;
            }

            let inv = 1.0 / dir;
            let mut t0 = (lo - origin) * inv;
            let mut t1 = (hi - origin) * inv;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }

            t_enter = t_enter.max(t0);
            t_exit = t_exit.min(t1);
            if t_enter > t_exit {
                return None;
            }
        }

        Some(from + delta * t_enter)
    }
}
