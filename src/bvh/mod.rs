//! Bounding-volume hierarchy over a mesh's triangles.
//!
//! [`build`] produces the owned builder tree ([`node::Node`]); [`flat::FlatBvh`]
//! linearizes it once into the skip-indexed array the mapping stage traverses.

pub mod build;
pub mod flat;
pub mod node;

pub use build::build;
pub use flat::FlatBvh;
pub use node::Node;
