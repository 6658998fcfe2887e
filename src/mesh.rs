//! Indexed triangle mesh representation.
//!
//! [`Mesh`] is the data model every other stage in the pipeline consumes.
//! Producing one from a file is delegated to [`crate::loaders`]; this module
//! only owns the in-memory shape and the invariants around it.

use std::fmt;

use crate::prelude::{Vec2, Vec3};

/// Sentinel marking a missing index (texcoord/normal/tangent absent on a vertex).
pub const INVALID: u32 = u32::MAX;

/// A mesh vertex: indices into the mesh's parallel attribute arrays.
/// Any field may be [`INVALID`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Vertex {
    pub position: u32,
    pub texcoord: u32,
    pub normal: u32,
}

impl Vertex {
    pub const fn new(position: u32, texcoord: u32, normal: u32) -> Self {
        Self {
            position,
            texcoord,
            normal,
        }
    }
}

/// A triangle face, referencing three entries in the mesh's `vertices` array.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Triangle {
    pub a: u32,
    pub b: u32,
    pub c: u32,
}

impl Triangle {
    pub const fn new(a: u32, b: u32, c: u32) -> Self {
        Self { a, b, c }
    }

    pub fn indices(&self) -> [u32; 3] {
        [self.a, self.b, self.c]
    }
}

#[derive(Debug)]
pub enum LoadError {
    Tobj(tobj::LoadError),
    Io(std::io::Error),
    NoModels,
    NoVertices,
    InvalidFaces,
    /// Malformed PLY header/body (line number, message).
    PlyParse(usize, String),
    /// A bakeable triangle is missing a texcoord or normal on one of its
    /// vertices.
    InvalidTopology,
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Tobj(e) => write!(f, "failed to load OBJ: {e}"),
            LoadError::Io(e) => write!(f, "failed to read mesh file: {e}"),
            LoadError::NoModels => write!(f, "OBJ file contains no models"),
            LoadError::NoVertices => write!(f, "mesh has no vertices"),
            LoadError::InvalidFaces => write!(f, "face indices not divisible by 3"),
            LoadError::PlyParse(line, msg) => write!(f, "PLY parse error at line {line}: {msg}"),
            LoadError::InvalidTopology => {
                write!(f, "a bakeable triangle is missing a texcoord or normal")
            }
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::Tobj(e) => Some(e),
            LoadError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<tobj::LoadError> for LoadError {
    fn from(e: tobj::LoadError) -> Self {
        LoadError::Tobj(e)
    }
}

impl From<std::io::Error> for LoadError {
    fn from(e: std::io::Error) -> Self {
        LoadError::Io(e)
    }
}

/// An indexed triangle mesh with optional per-vertex UV/normal/tangent data.
///
/// Constructed once by a loader and treated as immutable by every downstream
/// stage, with one exception: [`Mesh::recompute_vertex_normals_aggressive`]
/// rewrites `normals` in place as an explicit mesh-preprocessing step,
/// not something solvers or the BVH ever do.
#[derive(Clone, Debug, Default)]
pub struct Mesh {
    positions: Vec<Vec3>,
    texcoords: Vec<Vec2>,
    normals: Vec<Vec3>,
    tangents: Vec<Vec3>,
    bitangents: Vec<Vec3>,
    vertices: Vec<Vertex>,
    triangles: Vec<Triangle>,
}

impl Mesh {
    pub fn new(
        positions: Vec<Vec3>,
        texcoords: Vec<Vec2>,
        normals: Vec<Vec3>,
        tangents: Vec<Vec3>,
        bitangents: Vec<Vec3>,
        vertices: Vec<Vertex>,
        triangles: Vec<Triangle>,
    ) -> Self {
        Self {
            positions,
            texcoords,
            normals,
            tangents,
            bitangents,
            vertices,
            triangles,
        }
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn texcoords(&self) -> &[Vec2] {
        &self.texcoords
    }

    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    pub fn tangents(&self) -> &[Vec3] {
        &self.tangents
    }

    pub fn bitangents(&self) -> &[Vec3] {
        &self.bitangents
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    pub fn vertex_position(&self, vertex: u32) -> Vec3 {
        self.positions[self.vertices[vertex as usize].position as usize]
    }

    pub fn vertex_texcoord(&self, vertex: u32) -> Option<Vec2> {
        let idx = self.vertices[vertex as usize].texcoord;
        (idx != INVALID).then(|| self.texcoords[idx as usize])
    }

    pub fn vertex_normal(&self, vertex: u32) -> Option<Vec3> {
        let idx = self.vertices[vertex as usize].normal;
        (idx != INVALID).then(|| self.normals[idx as usize])
    }

    /// A triangle is bakeable only if all three of its vertices carry a
    /// texcoord and a normal.
    pub fn is_bakeable(&self, tri: &Triangle) -> bool {
        tri.indices().iter().all(|&v| {
            let vtx = self.vertices[v as usize];
            vtx.texcoord != INVALID && vtx.normal != INVALID
        })
    }

    /// Geometric (unnormalized winding) face normal of a triangle's positions.
    pub fn face_normal(&self, tri: &Triangle) -> Vec3 {
        let [a, b, c] = tri.indices();
        let p0 = self.vertex_position(a);
        let p1 = self.vertex_position(b);
        let p2 = self.vertex_position(c);
        (p1 - p0).cross(p2 - p0)
    }

    /// Rewrites `normals` (and every vertex's normal index) so that vertices
    /// sharing the same *position value* share one face-area-weighted
    /// averaged normal. All other attributes are untouched.
    pub fn recompute_vertex_normals_aggressive(&mut self) {
        use std::collections::HashMap;

        // Position values aren't `Eq`/`Hash`; key by bit pattern, which is
        // exact for values that originated from the same loader pass.
        fn key(p: Vec3) -> (u32, u32, u32) {
            (p.x.to_bits(), p.y.to_bits(), p.z.to_bits())
        }

        let mut accum: HashMap<(u32, u32, u32), Vec3> = HashMap::new();
        for tri in &self.triangles {
            let face_normal = self.face_normal(tri);
            for &v in &tri.indices() {
                let pos = self.vertex_position(v);
                let entry = accum.entry(key(pos)).or_insert(Vec3::ZERO);
                *entry = *entry + face_normal;
            }
        }

        let mut new_normals = Vec::with_capacity(accum.len());
        let mut index_of: HashMap<(u32, u32, u32), u32> = HashMap::with_capacity(accum.len());
        for (k, normal) in accum {
            index_of.insert(k, new_normals.len() as u32);
            new_normals.push(normal.normalize());
        }

        for vertex in &mut self.vertices {
            let pos = self.positions[vertex.position as usize];
            vertex.normal = index_of[&key(pos)];
        }
        self.normals = new_normals;
    }

    /// Rewrites the mesh for flat shading: each triangle gets its own face
    /// normal, and its three vertex entries are duplicated so no normal is
    /// shared across triangles.
    pub fn recompute_face_normals(&mut self) {
        let mut new_vertices = Vec::with_capacity(self.triangles.len() * 3);
        let mut new_normals = Vec::with_capacity(self.triangles.len());
        let mut new_triangles = Vec::with_capacity(self.triangles.len());

        for tri in &self.triangles {
            let normal_idx = new_normals.len() as u32;
            new_normals.push(self.face_normal(tri).normalize());
            let base = new_vertices.len() as u32;
            for &v in &tri.indices() {
                let mut vertex = self.vertices[v as usize];
                vertex.normal = normal_idx;
                new_vertices.push(vertex);
            }
            new_triangles.push(Triangle::new(base, base + 1, base + 2));
        }

        self.vertices = new_vertices;
        self.normals = new_normals;
        self.triangles = new_triangles;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_triangle() -> Mesh {
        let positions = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ];
        let texcoords = vec![Vec2::ZERO, Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0)];
        let normals = vec![Vec3::Z];
        let vertices = vec![
            Vertex::new(0, 0, 0),
            Vertex::new(1, 1, 0),
            Vertex::new(2, 2, 0),
        ];
        let triangles = vec![Triangle::new(0, 1, 2)];
        Mesh::new(positions, texcoords, normals, vec![], vec![], vertices, triangles)
    }

    #[test]
    fn bakeable_triangle_has_texcoord_and_normal_on_every_vertex() {
        let mesh = unit_triangle();
        assert!(mesh.is_bakeable(&mesh.triangles()[0]));
    }

    #[test]
    fn missing_normal_marks_triangle_unbakeable() {
        let mut mesh = unit_triangle();
        mesh.vertices[0].normal = INVALID;
        assert!(!mesh.is_bakeable(&mesh.triangles()[0]));
    }

    #[test]
    fn aggressive_recompute_merges_duplicated_positions() {
        // Two triangles sharing an edge, but each duplicating its own copy of
        // the shared vertex positions (as an OBJ exporter commonly does).
        let positions = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 0.0, 0.0), // duplicate of vertex 0
            Vec3::new(1.0, 0.0, 0.0), // duplicate of vertex 1
            Vec3::new(1.0, 1.0, 0.0),
        ];
        let texcoords = vec![Vec2::ZERO; 6];
        let normals = vec![Vec3::Z; 2];
        let vertices = vec![
            Vertex::new(0, 0, 0),
            Vertex::new(1, 1, 0),
            Vertex::new(2, 2, 0),
            Vertex::new(3, 3, 1),
            Vertex::new(4, 4, 1),
            Vertex::new(5, 5, 1),
        ];
        let triangles = vec![Triangle::new(0, 1, 2), Triangle::new(3, 4, 5)];
        let mut mesh = Mesh::new(positions, texcoords, normals, vec![], vec![], vertices, triangles);

        mesh.recompute_vertex_normals_aggressive();

        let n0 = mesh.vertex_normal(0).unwrap();
        let n3 = mesh.vertex_normal(3).unwrap();
        assert_eq!(n0, n3, "vertices at the same position must share a normal index/value");
    }

    #[test]
    fn face_normals_are_not_shared_across_triangles() {
        // Two triangles sharing an edge with a sharp crease between them.
        let positions = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(1.0, 1.0, 1.0),
        ];
        let texcoords = vec![Vec2::ZERO; 4];
        let normals = vec![Vec3::Z];
        let vertices = vec![
            Vertex::new(0, 0, 0),
            Vertex::new(1, 0, 0),
            Vertex::new(2, 0, 0),
            Vertex::new(3, 0, 0),
        ];
        let triangles = vec![Triangle::new(0, 1, 2), Triangle::new(1, 3, 2)];
        let mut mesh = Mesh::new(positions, texcoords, normals, vec![], vec![], vertices, triangles);

        mesh.recompute_face_normals();

        assert_eq!(mesh.triangles().len(), 2);
        assert_eq!(mesh.normals().len(), 2);
        let n0 = mesh.vertex_normal(mesh.triangles()[0].a).unwrap();
        let n1 = mesh.vertex_normal(mesh.triangles()[1].a).unwrap();
        assert_ne!(n0, n1);
    }
}
