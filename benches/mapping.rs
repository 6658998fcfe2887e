use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use texelbake::bvh::FlatBvh;
use texelbake::bvh;
use texelbake::mapping::Mapping;
use texelbake::math::vec2::Vec2;
use texelbake::math::vec3::Vec3;
use texelbake::mesh::{Mesh, Triangle, Vertex};
use texelbake::runner::Task;
use texelbake::uvmap::{self, MappingMode};

/// A single large quad, UV-mapped 1:1 onto itself, so a `width x width`
/// texture produces exactly `width * width` populated texels — enough to
/// exercise the mapping stage's slice scheduling at a realistic texel count.
fn quad_mesh() -> Mesh {
    let positions = vec![
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(1.0, 0.0, 0.0),
        Vec3::new(1.0, 0.0, 1.0),
        Vec3::new(0.0, 0.0, 1.0),
    ];
    let texcoords = vec![
        Vec2::new(0.0, 0.0),
        Vec2::new(1.0, 0.0),
        Vec2::new(1.0, 1.0),
        Vec2::new(0.0, 1.0),
    ];
    let normals = vec![Vec3::Y];
    let vertices = vec![
        Vertex::new(0, 0, 0),
        Vertex::new(1, 1, 0),
        Vertex::new(2, 2, 0),
        Vertex::new(3, 3, 0),
    ];
    let triangles = vec![Triangle::new(0, 1, 2), Triangle::new(0, 2, 3)];
    Mesh::new(positions, texcoords, normals, Vec::new(), Vec::new(), vertices, triangles)
}

fn benchmark_mapping(c: &mut Criterion) {
    let mesh = quad_mesh();
    let tree = bvh::build(&mesh, 4, 32);
    let bvh = Arc::new(FlatBvh::from_tree(&tree, &mesh));

    let mut group = c.benchmark_group("mapping");
    for width in [64usize, 256, 1024] {
        let map = Arc::new(
            uvmap::rasterize(&mesh, None, width, width, MappingMode::LowPolyNormals).unwrap(),
        );
        let texel_count = map.len();
        group.bench_with_input(
            BenchmarkId::new("texels", texel_count),
            &(map, bvh.clone()),
            |b, (map, bvh)| {
                b.iter(|| {
                    let mut mapping = Mapping::new(map.clone(), bvh.clone(), false, 1 << 16);
                    while !black_box(mapping.run_step()) {}
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, benchmark_mapping);
criterion_main!(benches);
