//! Linearizes the owned builder tree into the skip-indexed array the mapping
//! stage actually traverses.
//!
//! The builder already refuses to create a node with an empty child (see
//! `build::build_recursive`'s empty-side guard), so every internal node here
//! has exactly two non-empty children — there is no "chain" case to collapse
//! during emission.

use crate::aabb::Aabb;
use crate::bvh::node::Node;
use crate::mesh::Mesh;
use crate::prelude::Vec3;

/// Sentinel recorded by the mapping stage for a texel whose ray missed every
/// triangle.
pub const TRIANGLE_NONE: u32 = u32::MAX;

#[derive(Clone, Copy, Debug)]
pub struct FlatNode {
    pub aabb_min: Vec3,
    pub aabb_max: Vec3,
    pub tri_start: u32,
    pub tri_end: u32,
    pub skip_index: u32,
}

impl FlatNode {
    pub fn is_leaf(&self) -> bool {
        self.tri_end > self.tri_start
    }
}

/// The traversal-ready BVH: a DFS array of nodes plus the flattened
/// triangle-vertex data (3 entries per emitted triangle, position and
/// normal parallel to each other) that `tri_start..tri_end` indexes into.
pub struct FlatBvh {
    pub nodes: Vec<FlatNode>,
    pub vertex_positions: Vec<Vec3>,
    pub vertex_normals: Vec<Vec3>,
}

impl FlatBvh {
    /// Builds the flat BVH over `mesh`'s triangles from an owned builder tree.
    pub fn from_tree(tree: &Node, mesh: &Mesh) -> Self {
        let mut nodes = Vec::new();
        let mut vertex_positions = Vec::new();
        let mut vertex_normals = Vec::new();
        emit(tree, mesh, &mut nodes, &mut vertex_positions, &mut vertex_normals);
        if let Some(root) = nodes.first_mut() {
            root.skip_index = nodes.len() as u32;
        }
        Self {
            nodes,
            vertex_positions,
            vertex_normals,
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

fn emit(
    node: &Node,
    mesh: &Mesh,
    nodes: &mut Vec<FlatNode>,
    positions: &mut Vec<Vec3>,
    normals: &mut Vec<Vec3>,
) -> usize {
    let this_index = nodes.len();
    nodes.push(FlatNode {
        aabb_min: node.aabb.min(),
        aabb_max: node.aabb.max(),
        tri_start: 0,
        tri_end: 0,
        skip_index: 0,
    });

    match &node.children {
        None => {
            let tri_start = positions.len() as u32;
            for &tri_index in &node.triangles {
                let tri = mesh.triangles()[tri_index as usize];
                for v in tri.indices() {
                    positions.push(mesh.vertex_position(v));
                    normals.push(mesh.vertex_normal(v).unwrap_or(Vec3::ZERO));
                }
            }
            let tri_end = positions.len() as u32;
            nodes[this_index].tri_start = tri_start;
            nodes[this_index].tri_end = tri_end;
            nodes[this_index].skip_index = this_index as u32 + 1;
        }
        Some(children) => {
            emit(&children.0, mesh, nodes, positions, normals);
            let right_start = emit(&children.1, mesh, nodes, positions, normals);
            nodes[this_index].skip_index = right_start as u32;
        }
    }

    this_index
}
