//! UV rasterizer: turns the low-poly mesh into a dense per-texel grid of
//! surface samples, plus the compressed index list every solver consumes.

use crate::mesh::{LoadError, Mesh};
use crate::prelude::{Vec2, Vec3};

/// How the per-texel ray direction is derived from the low-poly surface.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MappingMode {
    /// Interpolated per-face low-poly normal.
    LowPolyNormals,
    /// Interpolated normal of a separately-smoothed copy of the mesh.
    Smooth,
    /// Blend of `Smooth` (near triangle edges) and `LowPolyNormals` (interior),
    /// crossing over at `edge_distance` world units from the nearest edge.
    Hybrid { edge_distance: f32 },
}

/// One populated texel of the dense grid.
#[derive(Clone, Copy, Debug)]
pub struct Texel {
    pub position: Vec3,
    pub direction: Vec3,
    pub normal: Vec3,
    pub tangent: Vec3,
    pub bitangent: Vec3,
}

/// Compressed form: parallel arrays over only the valid (populated) texels.
/// `indices[i]` is the flat `y * width + x` cell index of the i-th entry.
pub struct CompressedUvMap {
    pub width: usize,
    pub height: usize,
    pub indices: Vec<u32>,
    pub positions: Vec<Vec3>,
    pub directions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub tangents: Vec<Vec3>,
    pub bitangents: Vec<Vec3>,
}

impl CompressedUvMap {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Perpendicular distance from `p` to the line through `a` and `b` (the
/// infinite line, not the segment — an edge-adjacent texel just past a
/// triangle's corner should still blend smoothly).
fn point_line_distance(p: Vec2, a: Vec2, b: Vec2) -> f32 {
    let edge_len = (b - a).magnitude();
    if edge_len < f32::EPSILON {
        return (p - a).magnitude();
    }
    crate::math::vec2::edge_function(a, b, p).abs() / edge_len
}

/// Minimum distance from `p` to any of the triangle's three edge lines.
fn triangle_edge_distance(p: Vec2, a: Vec2, b: Vec2, c: Vec2) -> f32 {
    point_line_distance(p, a, b)
        .min(point_line_distance(p, b, c))
        .min(point_line_distance(p, c, a))
}

/// Rasterizes `mesh`'s UV chart into a dense `width x height` grid.
///
/// `smoothing` supplies the vertex normals used by [`MappingMode::Smooth`]
/// and [`MappingMode::Hybrid`]; it must share `mesh`'s topology (same
/// triangles/vertex indices), which is exactly what
/// [`Mesh::recompute_vertex_normals_aggressive`] preserves when run on a
/// clone of `mesh`. Ignored for [`MappingMode::LowPolyNormals`].
pub fn rasterize(
    mesh: &Mesh,
    smoothing: Option<&Mesh>,
    width: usize,
    height: usize,
    mode: MappingMode,
) -> Result<CompressedUvMap, LoadError> {
    let mut dense: Vec<Option<Texel>> = vec![None; width * height];
    let w = width as f32;
    let h = height as f32;

    for tri in mesh.triangles() {
        if !mesh.is_bakeable(tri) {
            return Err(LoadError::InvalidTopology);
        }
        let [ia, ib, ic] = tri.indices();

        let uv = [
            mesh.vertex_texcoord(ia).unwrap(),
            mesh.vertex_texcoord(ib).unwrap(),
            mesh.vertex_texcoord(ic).unwrap(),
        ];
        let pos = [
            mesh.vertex_position(ia),
            mesh.vertex_position(ib),
            mesh.vertex_position(ic),
        ];
        let normal = [
            mesh.vertex_normal(ia).unwrap(),
            mesh.vertex_normal(ib).unwrap(),
            mesh.vertex_normal(ic).unwrap(),
        ];
        let has_tangents = !mesh.tangents().is_empty();
        let tangent = if has_tangents {
            [
                mesh.tangents()[ia as usize],
                mesh.tangents()[ib as usize],
                mesh.tangents()[ic as usize],
            ]
        } else {
            [Vec3::ZERO; 3]
        };
        let has_bitangents = !mesh.bitangents().is_empty();
        let bitangent = if has_bitangents {
            [
                mesh.bitangents()[ia as usize],
                mesh.bitangents()[ib as usize],
                mesh.bitangents()[ic as usize],
            ]
        } else {
            [Vec3::ZERO; 3]
        };

        let smooth_normal = match (mode, smoothing) {
            (MappingMode::LowPolyNormals, _) => None,
            (_, Some(smooth_mesh)) => Some([
                smooth_mesh.vertex_normal(ia).unwrap_or(normal[0]),
                smooth_mesh.vertex_normal(ib).unwrap_or(normal[1]),
                smooth_mesh.vertex_normal(ic).unwrap_or(normal[2]),
            ]),
            (_, None) => None,
        };

        let pixel = |p: Vec2| (p.x * w - 0.5, p.y * h - 0.5);
        let (px0, py0) = pixel(uv[0]);
        let (px1, py1) = pixel(uv[1]);
        let (px2, py2) = pixel(uv[2]);

        let min_x = px0.min(px1).min(px2).floor().max(0.0) as usize;
        let max_x = (px0.max(px1).max(px2).ceil() as isize).clamp(0, width as isize) as usize;
        let min_y = py0.min(py1).min(py2).floor().max(0.0) as usize;
        let max_y = (py0.max(py1).max(py2).ceil() as isize).clamp(0, height as isize) as usize;

        for y in min_y..max_y.min(height) {
            for x in min_x..max_x.min(width) {
                let p = Vec2::new((x as f32 + 0.5) / w, (y as f32 + 0.5) / h);
                let Some((u, v, bw)) = crate::math::vec2::barycentric(uv[0], uv[1], uv[2], p)
                else {
                    continue;
                };
                if u < -0.001 || v < -0.001 || bw < -0.001 || u > 1.0 || v > 1.0 || bw > 1.0 {
                    continue;
                }

                let position = pos[0] * u + pos[1] * v + pos[2] * bw;
                let face_normal = (normal[0] * u + normal[1] * v + normal[2] * bw).normalize();
                let tangent_interp = if has_tangents {
                    (tangent[0] * u + tangent[1] * v + tangent[2] * bw).normalize()
                } else {
                    Vec3::ZERO
                };
                let bitangent_interp = if has_bitangents {
                    (bitangent[0] * u + bitangent[1] * v + bitangent[2] * bw).normalize()
                } else {
                    Vec3::ZERO
                };

                let direction = match mode {
                    MappingMode::LowPolyNormals => face_normal,
                    MappingMode::Smooth => {
                        let sn = smooth_normal.unwrap();
                        (sn[0] * u + sn[1] * v + sn[2] * bw).normalize()
                    }
                    MappingMode::Hybrid { edge_distance } => {
                        let sn = smooth_normal.unwrap();
                        let smoothed = (sn[0] * u + sn[1] * v + sn[2] * bw).normalize();
                        let dist = triangle_edge_distance(p, uv[0], uv[1], uv[2]);
                        let t = if edge_distance <= 0.0 {
                            1.0
                        } else {
                            (dist / edge_distance).min(1.0)
                        };
                        smoothed.lerp(face_normal, t).normalize()
                    }
                };

                dense[y * width + x] = Some(Texel {
                    position,
                    direction,
                    normal: face_normal,
                    tangent: tangent_interp,
                    bitangent: bitangent_interp,
                });
            }
        }
    }

    let mut compressed = CompressedUvMap {
        width,
        height,
        indices: Vec::new(),
        positions: Vec::new(),
        directions: Vec::new(),
        normals: Vec::new(),
        tangents: Vec::new(),
        bitangents: Vec::new(),
    };
    for (cell, texel) in dense.into_iter().enumerate() {
        if let Some(t) = texel {
            compressed.indices.push(cell as u32);
            compressed.positions.push(t.position);
            compressed.directions.push(t.direction);
            compressed.normals.push(t.normal);
            compressed.tangents.push(t.tangent);
            compressed.bitangents.push(t.bitangent);
        }
    }

    Ok(compressed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{Triangle, Vertex};

    fn single_quad_mesh() -> Mesh {
        let positions = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ];
        let texcoords = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ];
        let normals = vec![Vec3::Z];
        let vertices = vec![
            Vertex::new(0, 0, 0),
            Vertex::new(1, 1, 0),
            Vertex::new(2, 2, 0),
            Vertex::new(3, 3, 0),
        ];
        let triangles = vec![Triangle::new(0, 1, 2), Triangle::new(0, 2, 3)];
        Mesh::new(positions, texcoords, normals, vec![], vec![], vertices, triangles)
    }

    #[test]
    fn fills_the_whole_grid_for_a_unit_quad() {
        let mesh = single_quad_mesh();
        let map = rasterize(&mesh, None, 8, 8, MappingMode::LowPolyNormals).unwrap();
        assert_eq!(map.len(), 64);
    }

    #[test]
    fn indices_are_strictly_increasing() {
        let mesh = single_quad_mesh();
        let map = rasterize(&mesh, None, 8, 8, MappingMode::LowPolyNormals).unwrap();
        for pair in map.indices.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn missing_normal_on_a_triangle_is_rejected() {
        let mesh = single_quad_mesh();
        // Rebuild the mesh with one vertex missing its normal index.
        let positions = mesh.positions().to_vec();
        let texcoords = mesh.texcoords().to_vec();
        let normals = mesh.normals().to_vec();
        let mut vertices = mesh.vertices().to_vec();
        vertices[2].normal = crate::mesh::INVALID;
        let triangles = mesh.triangles().to_vec();
        let broken = Mesh::new(positions, texcoords, normals, vec![], vec![], vertices, triangles);

        let result = rasterize(&broken, None, 8, 8, MappingMode::LowPolyNormals);
        assert!(result.is_err());
    }
}
