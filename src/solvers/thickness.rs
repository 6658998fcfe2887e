//! Thickness solver: cosine-weighted sampling into the *inverted* hemisphere
//! (the solid interior), averaging hit distance.

use std::sync::Arc;

use rayon::prelude::*;

use crate::error::BakeError;
use crate::image_writer::write_scalar;
use crate::mapping::MappingOutput;
use crate::runner::Task;
use crate::sampling::SamplePool;

use super::{cast_sample, ray_data_for_texel, RayData, SliceCursor};

#[derive(Clone, Copy, PartialEq)]
enum Phase {
    RayData,
    Sampling,
    Aggregate,
}

pub struct Thickness {
    mapping: Arc<MappingOutput>,
    pool: Arc<SamplePool>,
    output_path: String,
    dilation: usize,
    min_distance: f32,
    max_distance: f32,
    cull_backfaces: bool,
    /// Some pipelines want `1.0 - d` (thin surfaces read bright) instead of
    /// raw distance; exposed as an explicit option rather than hard-coded
    /// either way.
    invert: bool,

    phase: Phase,
    cursor: SliceCursor,
    ray_data: Vec<Option<RayData>>,
    accum: Vec<f32>,
    values: Vec<f32>,
}

impl Thickness {
    pub fn new(
        mapping: Arc<MappingOutput>,
        pool: Arc<SamplePool>,
        output_path: String,
        dilation: usize,
        min_distance: f32,
        max_distance: f32,
        cull_backfaces: bool,
        invert: bool,
        work_per_frame: usize,
    ) -> Self {
        let count = mapping.uvmap.len();
        Self {
            ray_data: (0..count).map(|_| None).collect(),
            accum: vec![0.0; count],
            values: vec![0.0; count],
            cursor: SliceCursor::new(count, work_per_frame),
            mapping,
            pool,
            output_path,
            dilation,
            min_distance,
            max_distance,
            cull_backfaces,
            invert,
            phase: Phase::RayData,
        }
    }

    fn texel_count(&self) -> usize {
        self.mapping.uvmap.len()
    }

    /// The per-texel aggregated thickness values, valid once the aggregate
    /// phase has completed (before `finish` has necessarily been called).
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    fn run_ray_data_phase(&mut self) -> bool {
        let (start, end) = self.cursor.advance();
        let mapping = &self.mapping;
        self.ray_data[start..end]
            .par_iter_mut()
            .enumerate()
            .for_each(|(offset, slot)| {
                *slot = ray_data_for_texel(mapping, start + offset);
            });
        self.cursor.done()
    }

    fn run_sampling_phase(&mut self) -> bool {
        let (start, end) = self.cursor.advance();
        let bvh = &self.mapping.bvh;
        let pool = &self.pool;
        let min_distance = self.min_distance;
        let max_distance = self.max_distance;
        let cull = self.cull_backfaces;
        self.accum[start..end]
            .par_iter_mut()
            .zip(self.ray_data[start..end].par_iter())
            .enumerate()
            .for_each(|(offset, (sum, data))| {
                let i = start + offset;
                let Some(data) = data else {
                    *sum = max_distance * pool.sample_count() as f32;
                    return;
                };
                // Sampling into the solid requires flipping the normal; this
                // is only correct because the origin is offset outward first
                //, keeping the two conventions consistent.
                let inward_normal = data.normal * -1.0;
                let origin = data.origin + data.normal * min_distance;
                let mut total = 0.0f32;
                for sample in pool.permutation_for(i) {
                    let direction = (data.tangent * sample.x
                        + data.bitangent * sample.y
                        + inward_normal * sample.z)
                        .normalize();
                    total += cast_sample(bvh, origin, direction, max_distance, cull)
                        .unwrap_or(max_distance);
                }
                *sum = total;
            });
        self.cursor.done()
    }

    fn run_aggregate_phase(&mut self) -> bool {
        let (start, end) = self.cursor.advance();
        let sample_count = self.pool.sample_count() as f32;
        let invert = self.invert;
        self.values[start..end]
            .par_iter_mut()
            .zip(self.accum[start..end].par_iter())
            .for_each(|(v, &sum)| {
                let d = sum / sample_count;
                *v = if invert { 1.0 - d } else { d };
            });
        self.cursor.done()
    }
}

impl Task for Thickness {
    fn run_step(&mut self) -> bool {
        match self.phase {
            Phase::RayData => {
                if self.run_ray_data_phase() {
                    self.cursor.reset(self.texel_count());
                    self.phase = Phase::Sampling;
                }
                false
            }
            Phase::Sampling => {
                if self.run_sampling_phase() {
                    self.cursor.reset(self.texel_count());
                    self.phase = Phase::Aggregate;
                }
                false
            }
            Phase::Aggregate => self.run_aggregate_phase(),
        }
    }

    fn finish(&mut self) -> Result<(), BakeError> {
        write_scalar(
            &self.output_path,
            &self.mapping.uvmap,
            &self.values,
            self.dilation,
            false,
        )?;
        Ok(())
    }

    fn progress(&self) -> f32 {
        let phase_weight = match self.phase {
            Phase::RayData => 0.0,
            Phase::Sampling => 1.0,
            Phase::Aggregate => 2.0,
        };
        (phase_weight + self.cursor.progress()) / 3.0
    }

    fn name(&self) -> &str {
        "thickness"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bvh::build;
    use crate::bvh::FlatBvh;
    use crate::mapping::Coords;
    use crate::mesh::{Mesh, Triangle, Vertex};
    use crate::prelude::{Vec2, Vec3};
    use crate::uvmap::CompressedUvMap;
    use rand::SeedableRng;

    /// A closed unit cube, 12 triangles, outward-facing normals.
    fn unit_cube() -> Mesh {
        let p = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, 1.0),
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::new(0.0, 1.0, 1.0),
        ];
        let faces: [[usize; 4]; 6] = [
            [0, 3, 2, 1], // -Z
            [4, 5, 6, 7], // +Z
            [0, 1, 5, 4], // -Y
            [3, 7, 6, 2], // +Y
            [0, 4, 7, 3], // -X
            [1, 2, 6, 5], // +X
        ];
        let mut positions = Vec::new();
        let mut vertices = Vec::new();
        let mut triangles = Vec::new();
        let mut normals = Vec::new();
        for quad in faces {
            let a = p[quad[0]];
            let b = p[quad[1]];
            let c = p[quad[2]];
            let n = (b - a).cross(c - a).normalize();
            let normal_idx = normals.len() as u32;
            normals.push(n);
            let base = positions.len() as u32;
            for &vi in &quad {
                positions.push(p[vi]);
                vertices.push(Vertex::new(positions.len() as u32 - 1, 0, normal_idx));
            }
            triangles.push(Triangle::new(base, base + 1, base + 2));
            triangles.push(Triangle::new(base, base + 2, base + 3));
        }
        Mesh::new(
            positions,
            vec![Vec2::ZERO],
            normals,
            Vec::new(),
            Vec::new(),
            vertices,
            triangles,
        )
    }

    #[test]
    fn thickness_of_a_unit_cube_is_within_tolerance_of_its_side_length() {
        let mesh = unit_cube();
        let tree = build::build(&mesh, 4, 32);
        let bvh = Arc::new(FlatBvh::from_tree(&tree, &mesh));

        // A single texel on the -Z face, mapped exactly onto itself.
        let uvmap = Arc::new(CompressedUvMap {
            width: 1,
            height: 1,
            indices: vec![0],
            positions: vec![Vec3::new(0.5, 0.5, 0.0)],
            directions: vec![Vec3::new(0.0, 0.0, -1.0)],
            normals: vec![Vec3::new(0.0, 0.0, -1.0)],
            tangents: vec![Vec3::X],
            bitangents: vec![Vec3::Y],
        });
        let mapping = Arc::new(MappingOutput {
            coords: vec![Coords {
                u: 0.5,
                v: 0.5,
                w: 0.0,
                t: 0.0,
            }],
            tidx: vec![0],
            uvmap,
            bvh,
        });

        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        let pool = Arc::new(SamplePool::generate(256, &mut rng));
        let mut thickness = Thickness::new(
            mapping,
            pool,
            String::new(),
            0,
            0.001,
            2.0,
            false,
            false,
            256,
        );
        while !thickness.run_step() {}

        assert!(
            (thickness.values[0] - 1.0).abs() < 0.3,
            "thickness was {}",
            thickness.values[0]
        );
    }
}
