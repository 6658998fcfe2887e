//! Ambient occlusion solver: cosine-weighted hemisphere sampling against the
//! BVH, three pipelined phases with a full barrier between each.

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

pub struct AmbientOcclusion {
    mapping: Arc<MappingOutput>,
    pool: Arc<SamplePool>,
    output_path: String,
    dilation: usize,
    min_distance: f32,
    max_distance: f32,
    cull_backfaces: bool,

    phase: Phase,
    cursor: SliceCursor,
    ray_data: Vec<Option<RayData>>,
    hit_counts: Vec<u32>,
    values: Vec<f32>,
}

impl AmbientOcclusion {
    pub fn new(
        mapping: Arc<MappingOutput>,
        pool: Arc<SamplePool>,
        output_path: String,
        dilation: usize,
        min_distance: f32,
        max_distance: f32,
        cull_backfaces: bool,
        work_per_frame: usize,
    ) -> Self {
        let count = mapping.uvmap.len();
        Self {
            ray_data: (0..count).map(|_| None).collect(),
            hit_counts: vec![0; count],
            values: vec![0.0; count],
            cursor: SliceCursor::new(count, work_per_frame),
            mapping,
            pool,
            output_path,
            dilation,
            min_distance,
            max_distance,
            cull_backfaces,
            phase: Phase::RayData,
        }
    }

    fn texel_count(&self) -> usize {
        self.mapping.uvmap.len()
    }

    /// The per-texel aggregated AO values, valid once the aggregate phase
    /// has completed (before `finish` has necessarily been called).
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
        self.hit_counts[start..end]
            .par_iter_mut()
            .zip(self.ray_data[start..end].par_iter())
            .enumerate()
            .for_each(|(offset, (count, data))| {
                let i = start + offset;
                let Some(data) = data else {
                    *count = 0;
                    return;
                };
                let origin = data.origin + data.normal * min_distance;
                let mut hits = 0u32;
                for sample in pool.permutation_for(i) {
                    let direction = (data.tangent * sample.x
                        + data.bitangent * sample.y
                        + data.normal * sample.z)
                        .normalize();
                    if cast_sample(bvh, origin, direction, max_distance, cull).is_some() {
                        hits += 1;
                    }
                }
                *count = hits;
            });
        self.cursor.done()
    }

    fn run_aggregate_phase(&mut self) -> bool {
        let (start, end) = self.cursor.advance();
        let sample_count = self.pool.sample_count() as f32;
        self.values[start..end]
            .par_iter_mut()
            .zip(self.hit_counts[start..end].par_iter())
            .for_each(|(v, &hits)| {
                *v = hits as f32 / sample_count;
            });
        self.cursor.done()
    }
}

impl Task for AmbientOcclusion {
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
        "ambient_occlusion"
    }
}
