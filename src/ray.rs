//! Ray/AABB and ray/triangle intersection, and BVH traversal shared by the
//! mesh-mapping stage and the sampling solvers' hemisphere casts.

use crate::bvh::flat::FlatBvh;
use crate::prelude::Vec3;

const DIR_EPSILON: f32 = 1e-8;
const HIT_EPSILON: f32 = 1e-6;

#[derive(Clone, Copy, Debug)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction }
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// Slab-method ray/AABB test. Any direction component smaller than
/// [`DIR_EPSILON`] in magnitude is clamped to it before dividing, so an
/// axis-aligned ray never divides by zero. Accepts rays whose origin lies
/// inside the box, which the mapping stage relies on.
pub fn ray_aabb_intersect(ray: &Ray, aabb_min: Vec3, aabb_max: Vec3) -> bool {
    let mut t_min = f32::NEG_INFINITY;
    let mut t_max = f32::INFINITY;

    for axis in 0..3 {
        let d = ray.direction[axis];
        let d = if d.abs() < DIR_EPSILON {
            DIR_EPSILON.copysign(d)
        } else {
            d
        };
        let inv_d = 1.0 / d;
        let mut t0 = (aabb_min[axis] - ray.origin[axis]) * inv_d;
        let mut t1 = (aabb_max[axis] - ray.origin[axis]) * inv_d;
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }
        t_min = t_min.max(t0);
        t_max = t_max.min(t1);
    }

    t_max >= 0.0 && t_min <= t_max
}

/// Möller-Trumbore ray/triangle intersection. Returns `(t, u, v, w)` where
/// the hit point is `w*a + u*b + v*c` (`u`/`v` weight `b`/`c`, `w = 1-u-v`
/// is `a`'s weight), or `None` if the ray misses, the triangle is
/// degenerate, or the hit lies behind the ray origin.
pub fn moller_trumbore(ray: &Ray, a: Vec3, b: Vec3, c: Vec3) -> Option<(f32, f32, f32, f32)> {
    let edge1 = b - a;
    let edge2 = c - a;
    let pvec = ray.direction.cross(edge2);
    let det = edge1.dot(pvec);
    if det.abs() < 1e-6 {
        return None;
    }
    let inv_det = 1.0 / det;
    let tvec = ray.origin - a;
    let u = tvec.dot(pvec) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let qvec = tvec.cross(edge1);
    let v = qvec.dot(ray.direction) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = edge2.dot(qvec) * inv_det;
    if t < HIT_EPSILON {
        return None;
    }
    Some((t, u, v, 1.0 - u - v))
}

/// Result of a closest-hit BVH traversal: `t`, barycentrics `(u, v, w)`, and
/// the flat-BVH vertex-triple start index of the hit triangle.
#[derive(Clone, Copy, Debug)]
pub struct Hit {
    pub t: f32,
    pub u: f32,
    pub v: f32,
    pub w: f32,
    pub tri_index: u32,
}

/// Finds the closest triangle along `ray` within `max_t`, iteratively
/// traversing the flat, skip-indexed BVH.
pub fn intersect_bvh(ray: &Ray, bvh: &FlatBvh, max_t: f32, cull_backfaces: bool) -> Option<Hit> {
    let mut cursor = 0usize;
    let mut best: Option<Hit> = None;
    let n_nodes = bvh.nodes.len();

    while cursor < n_nodes {
        let node = &bvh.nodes[cursor];
        if !ray_aabb_intersect(ray, node.aabb_min, node.aabb_max) {
            cursor = node.skip_index as usize;
            continue;
        }
        if node.is_leaf() {
            let mut tri = node.tri_start;
            while tri < node.tri_end {
                let a = bvh.vertex_positions[tri as usize];
                let b = bvh.vertex_positions[tri as usize + 1];
                let c = bvh.vertex_positions[tri as usize + 2];
                if let Some((t, u, v, w)) = moller_trumbore(ray, a, b, c) {
                    if t < max_t && best.map_or(true, |h| t < h.t) {
                        let front_facing = ray.direction.dot((b - a).cross(c - a)) < 0.0;
                        if !cull_backfaces || front_facing {
                            best = Some(Hit {
                                t,
                                u,
                                v,
                                w,
                                tri_index: tri,
                            });
                        }
                    }
                }
                tri += 3;
            }
        }
        cursor += 1;
    }

    best
}
