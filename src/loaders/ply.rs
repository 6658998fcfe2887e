//! Minimal ASCII PLY loading.
//!
//! Handles exactly the subset needed to produce a [`Mesh`]: an ASCII-format
//! header declaring one `vertex` element (with `x,y,z` and optionally
//! `nx,ny,nz`/`u,v` or `s,t` properties) and one `face` element whose
//! `vertex_indices`/`vertex_index` list property may be declared 32- or
//! 16-bit. Binary PLY, color properties, and multi-element files are not
//! supported — parsing mesh files is not the subject of this crate.

use crate::mesh::{LoadError, Mesh, Triangle, Vertex, INVALID};
use crate::prelude::{Vec2, Vec3};

struct VertexProp {
    name: String,
}

/// Parses an ASCII PLY file at `path` into a [`Mesh`].
pub fn load(path: &str) -> Result<Mesh, LoadError> {
    let text = std::fs::read_to_string(path)?;
    let mut lines = text.lines().enumerate();

    let (_, magic) = lines
        .next()
        .ok_or_else(|| LoadError::PlyParse(1, "empty file".to_string()))?;
    if magic.trim() != "ply" {
        return Err(LoadError::PlyParse(1, "missing 'ply' magic header".to_string()));
    }

    let mut vertex_count = 0usize;
    let mut face_count = 0usize;
    let mut vertex_props: Vec<VertexProp> = Vec::new();
    let mut in_vertex_element = false;
    let mut header_lines = 1;

    for (lineno, line) in &mut lines {
        header_lines = lineno + 1;
        let line = line.trim();
        if line == "end_header" {
            break;
        }
        if line.starts_with("format") && !line.contains("ascii") {
            return Err(LoadError::PlyParse(lineno + 1, "only ascii PLY is supported".to_string()));
        }
        if let Some(rest) = line.strip_prefix("element ") {
            let mut parts = rest.split_whitespace();
            let name = parts.next().unwrap_or_default();
            let count: usize = parts
                .next()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| LoadError::PlyParse(lineno + 1, "bad element count".to_string()))?;
            in_vertex_element = name == "vertex";
            if name == "vertex" {
                vertex_count = count;
            } else if name == "face" {
                face_count = count;
            }
        } else if let Some(rest) = line.strip_prefix("property ") {
            if in_vertex_element && !rest.trim_start().starts_with("list") {
                let prop_name = rest.split_whitespace().last().unwrap_or_default();
                vertex_props.push(VertexProp {
                    name: prop_name.to_string(),
                });
            }
        }
    }

    let prop_index = |want: &[&str]| -> Option<usize> {
        vertex_props
            .iter()
            .position(|p| want.contains(&p.name.as_str()))
    };
    let ix = prop_index(&["x"]);
    let iy = prop_index(&["y"]);
    let iz = prop_index(&["z"]);
    let inx = prop_index(&["nx"]);
    let iny = prop_index(&["ny"]);
    let inz = prop_index(&["nz"]);
    let iu = prop_index(&["u", "s"]);
    let iv = prop_index(&["v", "t"]);

    let (ix, iy, iz) = match (ix, iy, iz) {
        (Some(x), Some(y), Some(z)) => (x, y, z),
        _ => return Err(LoadError::PlyParse(header_lines, "vertex element missing x/y/z".to_string())),
    };
    let has_normals = inx.is_some() && iny.is_some() && inz.is_some();
    let has_texcoords = iu.is_some() && iv.is_some();

    let mut positions = Vec::with_capacity(vertex_count);
    let mut normals = Vec::with_capacity(if has_normals { vertex_count } else { 0 });
    let mut texcoords = Vec::with_capacity(if has_texcoords { vertex_count } else { 0 });

    for _ in 0..vertex_count {
        let (lineno, line) = lines
            .next()
            .ok_or_else(|| LoadError::PlyParse(header_lines, "truncated vertex list".to_string()))?;
        let fields: Vec<f32> = line
            .split_whitespace()
            .map(|s| s.parse::<f32>())
            .collect::<Result<_, _>>()
            .map_err(|e| LoadError::PlyParse(lineno + 1, e.to_string()))?;
        positions.push(Vec3::new(fields[ix], fields[iy], fields[iz]));
        if has_normals {
            normals.push(Vec3::new(
                fields[inx.unwrap()],
                fields[iny.unwrap()],
                fields[inz.unwrap()],
            ));
        }
        if has_texcoords {
            texcoords.push(Vec2::new(fields[iu.unwrap()], fields[iv.unwrap()]));
        }
    }

    if positions.is_empty() {
        return Err(LoadError::NoVertices);
    }

    let vertices: Vec<Vertex> = (0..positions.len() as u32)
        .map(|i| {
            Vertex::new(
                i,
                if has_texcoords { i } else { INVALID },
                if has_normals { i } else { INVALID },
            )
        })
        .collect();

    let mut triangles = Vec::with_capacity(face_count);
    for _ in 0..face_count {
        let (lineno, line) = lines
            .next()
            .ok_or_else(|| LoadError::PlyParse(header_lines, "truncated face list".to_string()))?;
        // `vertex_indices`/`vertex_index` list property: leading count, then indices.
        // Width (16- vs 32-bit) is a storage detail already resolved by the
        // text representation; only the triangulated index values matter here.
        let fields: Vec<i64> = line
            .split_whitespace()
            .map(|s| s.parse::<i64>())
            .collect::<Result<_, _>>()
            .map_err(|e| LoadError::PlyParse(lineno + 1, e.to_string()))?;
        let n = *fields
            .first()
            .ok_or_else(|| LoadError::PlyParse(lineno + 1, "empty face record".to_string()))? as usize;
        if fields.len() < 1 + n || n < 3 {
            return Err(LoadError::PlyParse(lineno + 1, "malformed face record".to_string()));
        }
        // Fan-triangulate faces with more than three vertices.
        for k in 1..n - 1 {
            triangles.push(Triangle::new(
                fields[1] as u32,
                fields[1 + k] as u32,
                fields[2 + k] as u32,
            ));
        }
    }

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
