//! The six attribute solvers. Each is a [`crate::runner::Task`]; they
//! share no base type
//! but do share the handful of free functions below plus [`SliceCursor`] for
//! cooperative-slice bookkeeping.

pub mod ao;
pub mod bent_normals;
pub mod height;
pub mod normal;
pub mod position;
pub mod thickness;

use crate::bvh::flat::{FlatBvh, TRIANGLE_NONE};
use crate::mapping::MappingOutput;
use crate::prelude::Vec3;
use crate::ray::{intersect_bvh, Ray};

/// The hit triangle's three flat-BVH vertex positions.
pub fn hit_triangle_positions(mapping: &MappingOutput, tidx: u32) -> [Vec3; 3] {
    let base = tidx as usize;
    [
        mapping.bvh.vertex_positions[base],
        mapping.bvh.vertex_positions[base + 1],
        mapping.bvh.vertex_positions[base + 2],
    ]
}

/// The hit triangle's three flat-BVH vertex normals.
pub fn hit_triangle_normals(mapping: &MappingOutput, tidx: u32) -> [Vec3; 3] {
    let base = tidx as usize;
    [
        mapping.bvh.vertex_normals[base],
        mapping.bvh.vertex_normals[base + 1],
        mapping.bvh.vertex_normals[base + 2],
    ]
}

/// Geometric (winding-order) normal of a triangle given by its three vertex
/// positions, matching the one the mapping stage's backface test uses.
pub fn geometric_normal(positions: &[Vec3; 3]) -> Vec3 {
    (positions[1] - positions[0])
        .cross(positions[2] - positions[0])
        .normalize()
}

/// Per-texel ray-data for hemisphere sampling: the hit point,
/// its geometric normal, and an orthonormal tangent frame around it. `None`
/// for a texel whose mapping ray missed.
pub struct RayData {
    pub origin: Vec3,
    pub normal: Vec3,
    pub tangent: Vec3,
    pub bitangent: Vec3,
}

pub fn ray_data_for_texel(mapping: &MappingOutput, i: usize) -> Option<RayData> {
    let tidx = mapping.tidx[i];
    if tidx == TRIANGLE_NONE {
        return None;
    }
    let positions = hit_triangle_positions(mapping, tidx);
    let normal = geometric_normal(&positions);
    let ray_origin = mapping.uvmap.positions[i];
    let ray_dir = mapping.uvmap.directions[i];
    let origin = ray_origin + ray_dir * mapping.coords[i].t;
    let (tangent, bitangent) = normal.coord_system();
    Some(RayData {
        origin,
        normal,
        tangent,
        bitangent,
    })
}

/// Casts one hemisphere sample ray against the BVH, returning
/// the hit distance or `None` within `max_distance`.
pub fn cast_sample(
    bvh: &FlatBvh,
    origin: Vec3,
    direction: Vec3,
    max_distance: f32,
    cull_backfaces: bool,
) -> Option<f32> {
    let ray = Ray::new(origin, direction);
    intersect_bvh(&ray, bvh, max_distance, cull_backfaces).map(|hit| hit.t)
}

/// Tracks a task's cooperative-slice progress through one linear range of
/// work (one phase, or the whole of a direct solver's single pass).
pub struct SliceCursor {
    offset: usize,
    count: usize,
    per_frame: usize,
}

impl SliceCursor {
    pub fn new(count: usize, per_frame: usize) -> Self {
        Self {
            offset: 0,
            count,
            per_frame: per_frame.max(1),
        }
    }

    /// Advances by one slice, returning the `[start, end)` range to process.
    pub fn advance(&mut self) -> (usize, usize) {
        let start = self.offset;
        let end = (self.offset + self.per_frame).min(self.count);
        self.offset = end;
        (start, end)
    }

    pub fn done(&self) -> bool {
        self.offset >= self.count
    }

    pub fn progress(&self) -> f32 {
        if self.count == 0 {
            1.0
        } else {
            self.offset as f32 / self.count as f32
        }
    }

    pub fn reset(&mut self, count: usize) {
        self.offset = 0;
        self.count = count;
    }
}
