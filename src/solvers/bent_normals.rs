//! Bent-normal solver: the normalized sum of unoccluded hemisphere sample
//! directions, with an optional tangent-space postprocess.

use std::sync::Arc;

use rayon::prelude::*;

use crate::error::BakeError;
use crate::image_writer::write_vector;
use crate::mapping::MappingOutput;
use crate::prelude::Vec3;
use crate::runner::Task;
use crate::sampling::SamplePool;

use super::{cast_sample, ray_data_for_texel, RayData, SliceCursor};

#[derive(Clone, Copy, PartialEq)]
enum Phase {
    RayData,
    Sampling,
    Aggregate,
    TangentSpace,
}

pub struct BentNormals {
    mapping: Arc<MappingOutput>,
    pool: Arc<SamplePool>,
    output_path: String,
    dilation: usize,
    min_distance: f32,
    max_distance: f32,
    cull_backfaces: bool,
    tangent_space: bool,

    phase: Phase,
    cursor: SliceCursor,
    ray_data: Vec<Option<RayData>>,
    accum: Vec<Vec3>,
    values: Vec<Vec3>,
}

impl BentNormals {
    pub fn new(
        mapping: Arc<MappingOutput>,
        pool: Arc<SamplePool>,
        output_path: String,
        dilation: usize,
        min_distance: f32,
        max_distance: f32,
        cull_backfaces: bool,
        tangent_space: bool,
        work_per_frame: usize,
    ) -> Self {
        let count = mapping.uvmap.len();
        Self {
            ray_data: (0..count).map(|_| None).collect(),
            accum: vec![Vec3::ZERO; count],
            values: vec![Vec3::ZERO; count],
            cursor: SliceCursor::new(count, work_per_frame),
            mapping,
            pool,
            output_path,
            dilation,
            min_distance,
            max_distance,
            cull_backfaces,
            tangent_space,
            phase: Phase::RayData,
        }
    }

    fn texel_count(&self) -> usize {
        self.mapping.uvmap.len()
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
                    *sum = Vec3::ZERO;
                    return;
                };
                let origin = data.origin + data.normal * min_distance;
                let mut total = Vec3::ZERO;
                for sample in pool.permutation_for(i) {
                    let direction = (data.tangent * sample.x
                        + data.bitangent * sample.y
                        + data.normal * sample.z)
                        .normalize();
                    if cast_sample(bvh, origin, direction, max_distance, cull).is_none() {
                        total = total + direction;
                    }
                }
                *sum = total;
            });
        self.cursor.done()
    }

    fn run_aggregate_phase(&mut self) -> bool {
        let (start, end) = self.cursor.advance();
        self.values[start..end]
            .par_iter_mut()
            .zip(self.accum[start..end].par_iter())
            .for_each(|(v, sum)| {
                *v = sum.normalize();
            });
        self.cursor.done()
    }

    fn run_tangent_space_phase(&mut self) -> bool {
        let (start, end) = self.cursor.advance();
        let uvmap = &self.mapping.uvmap;
        self.values[start..end]
            .par_iter_mut()
            .enumerate()
            .for_each(|(offset, v)| {
                let i = start + offset;
                let t = uvmap.tangents[i];
                let b = uvmap.bitangents[i];
                let n = uvmap.normals[i];
                *v = Vec3::new(v.dot(t), v.dot(b), v.dot(n));
            });
        self.cursor.done()
    }
}

impl Task for BentNormals {
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
            Phase::Aggregate => {
                let done = self.run_aggregate_phase();
                if done {
                    if self.tangent_space {
                        self.cursor.reset(self.texel_count());
                        self.phase = Phase::TangentSpace;
                        return false;
                    }
                    return true;
                }
                false
            }
            Phase::TangentSpace => self.run_tangent_space_phase(),
        }
    }

    fn finish(&mut self) -> Result<(), BakeError> {
        write_vector(
            &self.output_path,
            &self.mapping.uvmap,
            &self.values,
            self.dilation,
            true,
        )?;
        Ok(())
    }

    fn progress(&self) -> f32 {
        let phases = if self.tangent_space { 4.0 } else { 3.0 };
        let phase_weight = match self.phase {
            Phase::RayData => 0.0,
            Phase::Sampling => 1.0,
            Phase::Aggregate => 2.0,
            Phase::TangentSpace => 3.0,
        };
        (phase_weight + self.cursor.progress()) / phases
    }

    fn name(&self) -> &str {
        "bent_normals"
    }
}
