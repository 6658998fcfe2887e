//! Commonly needed types, re-exported for convenience within the crate.

pub use crate::math::vec2::Vec2;
pub use crate::math::vec3::Vec3;
