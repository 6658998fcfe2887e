//! Height solver: the raw mapping-ray parameter, one float per texel.

use std::sync::Arc;

use rayon::prelude::*;

use crate::bvh::flat::TRIANGLE_NONE;
use crate::error::BakeError;
use crate::image_writer::write_scalar;
use crate::mapping::MappingOutput;
use crate::runner::Task;

use super::SliceCursor;

pub struct Height {
    mapping: Arc<MappingOutput>,
    output_path: String,
    dilation: usize,
    cursor: SliceCursor,
    values: Vec<f32>,
}

impl Height {
    pub fn new(
        mapping: Arc<MappingOutput>,
        output_path: String,
        dilation: usize,
        work_per_frame: usize,
    ) -> Self {
        let count = mapping.uvmap.len();
        Self {
            values: vec![0.0; count],
            cursor: SliceCursor::new(count, work_per_frame),
            mapping,
            output_path,
            dilation,
        }
    }
}

impl Task for Height {
    fn run_step(&mut self) -> bool {
        let (start, end) = self.cursor.advance();
        let mapping = &self.mapping;
        self.values[start..end]
            .par_iter_mut()
            .enumerate()
            .for_each(|(offset, v)| {
                let i = start + offset;
                *v = if mapping.tidx[i] == TRIANGLE_NONE {
                    0.0
                } else {
                    mapping.coords[i].t
                };
            });
        self.cursor.done()
    }

    fn finish(&mut self) -> Result<(), BakeError> {
        // Writer normalizes min/max itself.
        write_scalar(
            &self.output_path,
            &self.mapping.uvmap,
            &self.values,
            self.dilation,
            true,
        )?;
        Ok(())
    }

    fn progress(&self) -> f32 {
        self.cursor.progress()
    }

    fn name(&self) -> &str {
        "height"
    }
}
