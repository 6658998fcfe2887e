//! Mesh mapping: one ray cast per valid texel against the high-poly BVH.
//! Produces the `(barycentric, hit_distance, triangle)` table every
//! direct and sampling solver reads from.

use std::sync::Arc;

use rayon::prelude::*;
use tracing::debug;

use crate::bvh::flat::{FlatBvh, TRIANGLE_NONE};
use crate::error::BakeError;
use crate::ray::{intersect_bvh, Ray};
use crate::runner::Task;
use crate::uvmap::CompressedUvMap;

/// Work is scheduled in multiples of this group size, mirroring the kind of
/// GPU/SIMD `group_size` batching a compute-shader port would use.
pub const GROUP_SIZE: usize = 64;

#[derive(Clone, Copy, Debug, Default)]
pub struct Coords {
    pub u: f32,
    pub v: f32,
    pub w: f32,
    pub t: f32,
}

/// The completed mapping result, shared (read-only) by every solver task.
pub struct MappingOutput {
    pub uvmap: Arc<CompressedUvMap>,
    pub bvh: Arc<FlatBvh>,
    pub coords: Vec<Coords>,
    pub tidx: Vec<u32>,
}

pub struct Mapping {
    uvmap: Arc<CompressedUvMap>,
    bvh: Arc<FlatBvh>,
    cull_backfaces: bool,
    work_offset: usize,
    work_count: usize,
    work_per_frame: usize,
    coords: Vec<Coords>,
    tidx: Vec<u32>,
    output: Option<Arc<MappingOutput>>,
}

impl Mapping {
    pub fn new(
        uvmap: Arc<CompressedUvMap>,
        bvh: Arc<FlatBvh>,
        cull_backfaces: bool,
        work_per_frame: usize,
    ) -> Self {
        let work_count = uvmap.len();
        let padded = work_count.div_ceil(GROUP_SIZE) * GROUP_SIZE;
        let work_per_frame = (work_per_frame.max(GROUP_SIZE) / GROUP_SIZE) * GROUP_SIZE;
        Self {
            uvmap,
            bvh,
            cull_backfaces,
            work_offset: 0,
            work_count,
            work_per_frame,
            coords: vec![Coords::default(); padded],
            tidx: vec![TRIANGLE_NONE; padded],
            output: None,
        }
    }

    /// The fully-computed mapping, available after [`Task::finish`] has run.
    pub fn output(&self) -> Arc<MappingOutput> {
        self.output
            .clone()
            .expect("Mapping::output called before finish()")
    }

    fn process_slice(&mut self, start: usize, end: usize) {
        let uvmap = &self.uvmap;
        let bvh = &self.bvh;
        let cull = self.cull_backfaces;
        self.coords[start..end]
            .par_iter_mut()
            .zip(self.tidx[start..end].par_iter_mut())
            .enumerate()
            .for_each(|(offset, (coord, tri))| {
                let i = start + offset;
                let origin = uvmap.positions[i];
                let direction = uvmap.directions[i];
                let ray = Ray::new(origin, direction);
                match intersect_bvh(&ray, bvh, f32::INFINITY, cull) {
                    Some(hit) => {
                        *coord = Coords {
                            u: hit.u,
                            v: hit.v,
                            w: hit.w,
                            t: hit.t,
                        };
                        *tri = hit.tri_index;
                    }
                    None => {
                        *coord = Coords::default();
                        *tri = TRIANGLE_NONE;
                    }
                }
            });
    }
}

impl Task for Mapping {
    fn run_step(&mut self) -> bool {
        let end = (self.work_offset + self.work_per_frame).min(self.work_count);
        self.process_slice(self.work_offset, end);
        self.work_offset = end;
        self.work_offset >= self.work_count
    }

    fn finish(&mut self) -> Result<(), BakeError> {
        debug!(texels = self.work_count, "mapping complete");
        self.output = Some(Arc::new(MappingOutput {
            uvmap: self.uvmap.clone(),
            bvh: self.bvh.clone(),
            coords: std::mem::take(&mut self.coords),
            tidx: std::mem::take(&mut self.tidx),
        }));
        Ok(())
    }

    fn progress(&self) -> f32 {
        if self.work_count == 0 {
            1.0
        } else {
            self.work_offset as f32 / self.work_count as f32
        }
    }

    fn name(&self) -> &str {
        "mapping"
    }
}
