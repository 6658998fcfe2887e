//! Wavefront OBJ loading, via `tobj`.
//!
//! Thin translation layer from `tobj`'s flat per-vertex buffers into
//! [`Mesh`]'s `positions`/`texcoords`/`normals` + `vertices` shape. Not a
//! general-purpose OBJ toolkit: one mesh, one material-less shape per file.

use crate::mesh::{LoadError, Mesh, Triangle, Vertex, INVALID};
use crate::prelude::{Vec2, Vec3};

/// Loads a single mesh from an OBJ file at `path`.
///
/// Uses `tobj`'s GPU load options (triangulated, single-indexed) so that
/// position/texcoord/normal share one index per vertex; a corner missing a
/// texcoord or normal in the source file is not representable by `tobj`'s
/// single-index buffers, so such files load with every vertex sharing
/// whichever attributes the file provides uniformly (texcoord/normal arrays
/// are simply empty when the file has none, per `INVALID` handling below).
pub fn load(path: &str) -> Result<Mesh, LoadError> {
    let (models, _materials) = tobj::load_obj(path, &tobj::GPU_LOAD_OPTIONS)?;
    let model = models.into_iter().next().ok_or(LoadError::NoModels)?;
    let mesh = model.mesh;

    if mesh.positions.is_empty() {
        return Err(LoadError::NoVertices);
    }
    if mesh.indices.len() % 3 != 0 {
        return Err(LoadError::InvalidFaces);
    }

    let positions: Vec<Vec3> = mesh
        .positions
        .chunks_exact(3)
        .map(|c| Vec3::new(c[0], c[1], c[2]))
        .collect();

    let has_texcoords = !mesh.texcoords.is_empty();
    let texcoords: Vec<Vec2> = mesh
        .texcoords
        .chunks_exact(2)
        .map(|c| Vec2::new(c[0], c[1]))
        .collect();

    let has_normals = !mesh.normals.is_empty();
    let normals: Vec<Vec3> = mesh
        .normals
        .chunks_exact(3)
        .map(|c| Vec3::new(c[0], c[1], c[2]))
        .collect();

    let vertex_count = positions.len();
    let vertices: Vec<Vertex> = (0..vertex_count as u32)
        .map(|i| {
            Vertex::new(
                i,
                if has_texcoords { i } else { INVALID },
                if has_normals { i } else { INVALID },
            )
        })
        .collect();

    let triangles: Vec<Triangle> = mesh
        .indices
        .chunks_exact(3)
        .map(|c| Triangle::new(c[0], c[1], c[2]))
        .collect();

    Ok(Mesh::new(
        positions,
        texcoords,
        normals,
        Vec::new(),
        Vec::new(),
        vertices,
        triangles,
    ))
}
