//! Object-space normal solver, with an optional tangent-space postprocess
//! against the low-poly TBN.

use std::sync::Arc;

use rayon::prelude::*;

use crate::bvh::flat::TRIANGLE_NONE;
use crate::error::BakeError;
use crate::image_writer::write_vector;
use crate::mapping::MappingOutput;
use crate::prelude::Vec3;
use crate::runner::Task;

use super::{hit_triangle_normals, SliceCursor};

pub struct Normal {
    mapping: Arc<MappingOutput>,
    output_path: String,
    dilation: usize,
    tangent_space: bool,
    cursor: SliceCursor,
    values: Vec<Vec3>,
}

impl Normal {
    pub fn new(
        mapping: Arc<MappingOutput>,
        output_path: String,
        dilation: usize,
        tangent_space: bool,
        work_per_frame: usize,
    ) -> Self {
        let count = mapping.uvmap.len();
        Self {
            values: vec![Vec3::ZERO; count],
            cursor: SliceCursor::new(count, work_per_frame),
            mapping,
            output_path,
            dilation,
            tangent_space,
        }
    }
}

impl Task for Normal {
    fn run_step(&mut self) -> bool {
        let (start, end) = self.cursor.advance();
        let mapping = &self.mapping;
        let tangent_space = self.tangent_space;
        self.values[start..end]
            .par_iter_mut()
            .enumerate()
            .for_each(|(offset, v)| {
                let i = start + offset;
                let tidx = mapping.tidx[i];
                if tidx == TRIANGLE_NONE {
                    *v = Vec3::ZERO;
                    return;
                }
                let n = hit_triangle_normals(mapping, tidx);
                let c = mapping.coords[i];
                // Möller-Trumbore's (u, v) pair with V1/V2; V0's weight is
                // the complement w = 1 - u - v.
                let object_space = (n[0] * c.w + n[1] * c.u + n[2] * c.v).normalize();
                *v = if tangent_space {
                    let t = mapping.uvmap.tangents[i];
                    let b = mapping.uvmap.bitangents[i];
                    let lp_n = mapping.uvmap.normals[i];
                    Vec3::new(
                        object_space.dot(t),
                        object_space.dot(b),
                        object_space.dot(lp_n),
                    )
                } else {
                    object_space
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
            true,
        )?;
        Ok(())
    }

    fn progress(&self) -> f32 {
        self.cursor.progress()
    }

    fn name(&self) -> &str {
        "normal"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bvh::flat::FlatNode;
    use crate::bvh::FlatBvh;
    use crate::mapping::Coords;
    use crate::uvmap::CompressedUvMap;

    #[test]
    fn a_miss_yields_the_zero_vector() {
        let uvmap = Arc::new(CompressedUvMap {
            width: 1,
            height: 1,
            indices: vec![0],
            positions: vec![Vec3::ZERO],
            directions: vec![Vec3::Y],
            normals: vec![Vec3::Y],
            tangents: vec![Vec3::X],
            bitangents: vec![Vec3::Z],
        });
        let bvh = Arc::new(FlatBvh {
            nodes: vec![FlatNode {
                aabb_min: Vec3::ZERO,
                aabb_max: Vec3::ZERO,
                tri_start: 0,
                tri_end: 0,
                skip_index: 1,
            }],
            vertex_positions: Vec::new(),
            vertex_normals: Vec::new(),
        });
        let mapping = Arc::new(MappingOutput {
            uvmap,
            bvh,
            coords: vec![Coords {
                u: 0.0,
                v: 0.0,
                w: 0.0,
                t: 0.0,
            }],
            tidx: vec![TRIANGLE_NONE],
        });
        let mut normal = Normal::new(mapping, String::new(), 0, false, 64);
        while !normal.run_step() {}
        assert_eq!(normal.values[0], Vec3::ZERO);
    }
}
