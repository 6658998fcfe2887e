//! Axis-aligned bounding boxes, stored as `(center, half_size)` per spec.

use crate::prelude::Vec3;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub center: Vec3,
    pub half_size: Vec3,
}

impl Aabb {
    /// An AABB that contains nothing; combining it with any point or box
    /// yields that point/box unchanged.
    pub const EMPTY: Self = Self {
        center: Vec3::ZERO,
        half_size: Vec3::splat(-f32::INFINITY),
    };

    pub fn from_min_max(min: Vec3, max: Vec3) -> Self {
        Self {
            center: (min + max) * 0.5,
            half_size: (max - min) * 0.5,
        }
    }

    pub fn min(&self) -> Vec3 {
        self.center - self.half_size
    }

    pub fn max(&self) -> Vec3 {
        self.center + self.half_size
    }

    pub fn is_empty(&self) -> bool {
        self.half_size.x < 0.0 || self.half_size.y < 0.0 || self.half_size.z < 0.0
    }

    pub fn union_point(&self, p: Vec3) -> Self {
        if self.is_empty() {
            return Self::from_min_max(p, p);
        }
        Self::from_min_max(self.min().min(p), self.max().max(p))
    }

    pub fn union(&self, other: &Self) -> Self {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Self::from_min_max(self.min().min(other.min()), self.max().max(other.max()))
    }

    /// `2*(s.x*s.y + s.x*s.z + s.y*s.z)` as specified for the SAH cost model.
    pub fn surface_area(&self) -> f32 {
        if self.is_empty() {
            return 0.0;
        }
        let s = self.half_size;
        2.0 * (s.x * s.y + s.x * s.z + s.y * s.z)
    }

    /// Index of the axis along which this box is longest.
    pub fn max_extent_axis(&self) -> usize {
        let s = self.half_size;
        if s.x > s.y && s.x > s.z {
            0
        } else if s.y > s.z {
            1
        } else {
            2
        }
    }
}
