//! Position solver: the reconstructed world-space hit point. Written
//! unnormalized, so only EXR is a sensible target.

use std::sync::Arc;

use rayon::prelude::*;

use crate::bvh::flat::TRIANGLE_NONE;
use crate::error::BakeError;
use crate::image_writer::write_vector;
use crate::mapping::MappingOutput;
use crate::prelude::Vec3;
use crate::runner::Task;

use super::{hit_triangle_positions, SliceCursor};

pub struct Position {
    mapping: Arc<MappingOutput>,
    output_path: String,
    dilation: usize,
    cursor: SliceCursor,
    values: Vec<Vec3>,
}

impl Position {
    pub fn new(
        mapping: Arc<MappingOutput>,
        output_path: String,
        dilation: usize,
        work_per_frame: usize,
    ) -> Self {
        let count = mapping.uvmap.len();
        Self {
            values: vec![Vec3::ZERO; count],
            cursor: SliceCursor::new(count, work_per_frame),
            mapping,
            output_path,
            dilation,
        }
    }
}

impl Task for Position {
    fn run_step(&mut self) -> bool {
        let (start, end) = self.cursor.advance();
        let mapping = &self.mapping;
        self.values[start..end]
            .par_iter_mut()
            .enumerate()
            .for_each(|(offset, v)| {
                let i = start + offset;
                let tidx = mapping.tidx[i];
                *v = if tidx == TRIANGLE_NONE {
                    Vec3::ZERO
                } else {
                    let p = hit_triangle_positions(mapping, tidx);
                    let c = mapping.coords[i];
                    // Möller-Trumbore's (u, v) pair with V1/V2; V0's weight
                    // is the complement w = 1 - u - v.
                    p[0] * c.w + p[1] * c.u + p[2] * c.v
                };
            });
        self.cursor.done()
    }

    fn finish(&mut self) -> Result<(), BakeError> {
        write_vector(
            &self.output_path,
            &self.mapping.uvmap,
            &self.values,
            self.dilation,
            false,
        )?;
        Ok(())
    }

    fn progress(&self) -> f32 {
        self.cursor.progress()
    }

    fn name(&self) -> &str {
        "position"
    }
}
