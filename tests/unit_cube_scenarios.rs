//! End-to-end pipeline scenarios against a unit cube.

use std::sync::Arc;

use rand::SeedableRng;
use texelbake::bvh::{self, FlatBvh};
use texelbake::mapping::Mapping;
use texelbake::math::vec2::Vec2;
use texelbake::math::vec3::Vec3;
use texelbake::mesh::{Mesh, Triangle, Vertex};
use texelbake::runner::Task;
use texelbake::sampling::SamplePool;
use texelbake::solvers::ao::AmbientOcclusion;
use texelbake::solvers::thickness::Thickness;
use texelbake::uvmap::{self, MappingMode};

const RESOLUTION: usize = 64;

const CELL_U: f32 = 1.0 / 3.0;
const CELL_V: f32 = 1.0 / 2.0;

const CUBE_CORNERS: [Vec3; 8] = [
    Vec3::new(0.0, 0.0, 0.0),
    Vec3::new(1.0, 0.0, 0.0),
    Vec3::new(1.0, 1.0, 0.0),
    Vec3::new(0.0, 1.0, 0.0),
    Vec3::new(0.0, 0.0, 1.0),
    Vec3::new(1.0, 0.0, 1.0),
    Vec3::new(1.0, 1.0, 1.0),
    Vec3::new(0.0, 1.0, 1.0),
];

// (quad corners in atlas-uv winding order, UV cell column/row in a 3x2 atlas).
const CUBE_FACES: [([usize; 4], usize, usize); 6] = [
    ([0, 3, 2, 1], 0, 0), // -Z
    ([4, 5, 6, 7], 1, 0), // +Z
    ([0, 1, 5, 4], 2, 0), // -Y
    ([3, 7, 6, 2], 0, 1), // +Y
    ([0, 4, 7, 3], 1, 1), // -X
    ([1, 2, 6, 5], 2, 1), // +X
];

/// A unit cube: 8 shared vertex positions, 12 triangles, one flat face
/// normal per face, laid out in a 3x2 UV atlas covering the 6 faces with no
/// overlap.
fn unit_cube_with_atlas() -> Mesh {
    let p = CUBE_CORNERS;

    let mut positions = Vec::new();
    let mut texcoords = Vec::new();
    let mut normals = Vec::new();
    let mut vertices = Vec::new();
    let mut triangles = Vec::new();

    let uv_corners = [
        Vec2::new(0.0, 0.0),
        Vec2::new(1.0, 0.0),
        Vec2::new(1.0, 1.0),
        Vec2::new(0.0, 1.0),
    ];

    for (quad, col, row) in CUBE_FACES {
        let a = p[quad[0]];
        let b = p[quad[1]];
        let c = p[quad[2]];
        let n = (b - a).cross(c - a).normalize();
        let normal_idx = normals.len() as u32;
        normals.push(n);

        let base = positions.len() as u32;
        for (corner_index, &vi) in quad.iter().enumerate() {
            positions.push(p[vi]);
            let local = uv_corners[corner_index];
            texcoords.push(Vec2::new(
                (col as f32 + local.x) * CELL_U,
                (row as f32 + local.y) * CELL_V,
            ));
            let vertex_index = positions.len() as u32 - 1;
            vertices.push(Vertex::new(vertex_index, vertex_index, normal_idx));
        }
        triangles.push(Triangle::new(base, base + 1, base + 2));
        triangles.push(Triangle::new(base, base + 2, base + 3));
    }

    Mesh::new(positions, texcoords, normals, Vec::new(), Vec::new(), vertices, triangles)
}

/// Ground truth for what a texel at atlas-space `uv` should bake to, computed
/// directly from the cube's corners and atlas layout rather than by
/// re-deriving it from barycentric interpolation like the solvers do.
fn expected_surface_point(uv: Vec2) -> (Vec3, Vec3) {
    let col = ((uv.x / CELL_U) as usize).min(2);
    let row = ((uv.y / CELL_V) as usize).min(1);
    let (quad, _, _) = CUBE_FACES
        .iter()
        .find(|(_, c, r)| *c == col && *r == row)
        .expect("uv falls outside the 3x2 atlas");

    let p0 = CUBE_CORNERS[quad[0]];
    let p1 = CUBE_CORNERS[quad[1]];
    let p2 = CUBE_CORNERS[quad[2]];
    let p3 = CUBE_CORNERS[quad[3]];
    let normal = (p1 - p0).cross(p2 - p0).normalize();

    let lu = (uv.x - col as f32 * CELL_U) / CELL_U;
    let lv = (uv.y - row as f32 * CELL_V) / CELL_V;
    let position = p0 * (1.0 - lu) * (1.0 - lv)
        + p1 * lu * (1.0 - lv)
        + p2 * lu * lv
        + p3 * (1.0 - lu) * lv;
    (position, normal)
}

/// Pixel-center atlas UV for the `i`-th populated texel of a `width x height`
/// compressed map, matching the rasterizer's own sampling convention.
fn texel_uv(flat_index: u32, width: usize, height: usize) -> Vec2 {
    let x = flat_index as usize % width;
    let y = flat_index as usize / width;
    Vec2::new((x as f32 + 0.5) / width as f32, (y as f32 + 0.5) / height as f32)
}

fn build_mapping() -> Arc<texelbake::mapping::MappingOutput> {
    let mesh = unit_cube_with_atlas();
    let map = Arc::new(
        uvmap::rasterize(&mesh, None, RESOLUTION, RESOLUTION, MappingMode::LowPolyNormals).unwrap(),
    );
    let tree = bvh::build(&mesh, 4, 32);
    let bvh = Arc::new(FlatBvh::from_tree(&tree, &mesh));

    let mut mapping = Mapping::new(map, bvh, false, 1 << 16);
    while !mapping.run_step() {}
    mapping.finish().unwrap();
    mapping.output()
}

#[test]
fn height_of_a_cube_onto_itself_is_everywhere_zero() {
    let mapping = build_mapping();
    let mut checked = 0;
    for i in 0..mapping.coords.len() {
        if mapping.tidx[i] == texelbake::bvh::flat::TRIANGLE_NONE {
            continue;
        }
        let t = mapping.coords[i].t;
        assert!(t.abs() < 1e-3, "t was {t}");
        checked += 1;
    }
    assert!(checked > 0);
}

#[test]
fn position_map_recovers_the_cube_surface() {
    use texelbake::solvers::hit_triangle_positions;

    let mapping = build_mapping();
    let mut checked = 0;
    for i in 0..mapping.coords.len() {
        let tidx = mapping.tidx[i];
        if tidx == texelbake::bvh::flat::TRIANGLE_NONE {
            continue;
        }
        let verts = hit_triangle_positions(&mapping, tidx);
        let c = mapping.coords[i];
        let world = verts[0] * c.w + verts[1] * c.u + verts[2] * c.v;

        let uv = texel_uv(mapping.uvmap.indices[i], mapping.uvmap.width, mapping.uvmap.height);
        let (expected, _) = expected_surface_point(uv);
        assert!(
            (world - expected).magnitude() < 1e-3,
            "reconstructed point {world:?} does not match expected {expected:?}"
        );
        checked += 1;
    }
    assert!(checked > 0);
}

#[test]
fn normal_map_matches_the_expected_face_normal_everywhere() {
    use texelbake::solvers::hit_triangle_normals;

    let mapping = build_mapping();
    let mut checked = 0;
    for i in 0..mapping.coords.len() {
        let tidx = mapping.tidx[i];
        if tidx == texelbake::bvh::flat::TRIANGLE_NONE {
            continue;
        }
        let verts = hit_triangle_normals(&mapping, tidx);
        let c = mapping.coords[i];
        let n = (verts[0] * c.w + verts[1] * c.u + verts[2] * c.v).normalize();

        let uv = texel_uv(mapping.uvmap.indices[i], mapping.uvmap.width, mapping.uvmap.height);
        let (_, expected_normal) = expected_surface_point(uv);
        assert!(
            (n - expected_normal).magnitude() < 1e-3,
            "normal {n:?} does not match expected face normal {expected_normal:?}"
        );
        checked += 1;
    }
    assert!(checked > 0);
}

#[test]
fn ao_on_a_closed_cube_is_zero_for_interior_facing_samples() {
    let mapping = build_mapping();
    let mut rng = rand::rngs::StdRng::seed_from_u64(7);
    let pool = Arc::new(SamplePool::generate(64, &mut rng));
    let mut ao = AmbientOcclusion::new(mapping, pool, String::new(), 0, 0.001, 0.1, false, 1 << 16);
    while !ao.run_step() {}

    // Rays cast outward from each face with max_distance=0.1 can't reach any
    // other face of a unit cube, so every texel should read unoccluded.
    for &v in ao.values() {
        assert!(v < 1e-6);
    }
}

#[test]
fn thickness_of_a_unit_cube_matches_its_side_length_within_tolerance() {
    let mapping = build_mapping();
    let mut rng = rand::rngs::StdRng::seed_from_u64(11);
    let pool = Arc::new(SamplePool::generate(64, &mut rng));
    let mut thickness = Thickness::new(mapping, pool, String::new(), 0, 0.001, 2.0, false, false, 1 << 16);
    while !thickness.run_step() {}

    let values = thickness.values();
    let mean: f32 = values.iter().sum::<f32>() / values.len() as f32;
    assert!((mean - 1.0).abs() < 0.3, "mean thickness was {mean}");
}

#[test]
fn bvh_partition_covers_every_triangle_exactly_once() {
    use std::collections::HashSet;

    let mut positions = Vec::new();
    let mut vertices = Vec::new();
    let mut triangles = Vec::new();
    let mut rng = rand::rngs::StdRng::seed_from_u64(99);
    use rand::Rng;

    for _ in 0..10_000 {
        let base = positions.len() as u32;
        let cx: f32 = rng.gen_range(-100.0..100.0);
        let cy: f32 = rng.gen_range(-100.0..100.0);
        let cz: f32 = rng.gen_range(-100.0..100.0);
        positions.push(Vec3::new(cx, cy, cz));
        positions.push(Vec3::new(cx + 1.0, cy, cz));
        positions.push(Vec3::new(cx, cy + 1.0, cz));
        vertices.push(Vertex::new(base, 0, 0));
        vertices.push(Vertex::new(base + 1, 0, 0));
        vertices.push(Vertex::new(base + 2, 0, 0));
        triangles.push(Triangle::new(base, base + 1, base + 2));
    }
    let mesh = Mesh::new(positions, vec![Vec2::ZERO], vec![Vec3::Y], Vec::new(), Vec::new(), vertices, triangles);

    let tree = bvh::build(&mesh, 4, 32);

    let mut seen = HashSet::new();
    let mut stack = vec![&tree];
    while let Some(node) = stack.pop() {
        if node.is_leaf() {
            for &t in &node.triangles {
                assert!(seen.insert(t), "triangle {t} present in more than one leaf");
            }
        } else {
            let (left, right) = node.children.as_deref().unwrap();
            stack.push(left);
            stack.push(right);
        }
    }
    assert_eq!(seen, (0u32..10_000).collect::<HashSet<_>>());
}
