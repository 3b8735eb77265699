//! Math utilities module
//!
//! Provides convenient re-exports from glam and the decomposed transform used
//! for channel storage.

mod transform;

pub use transform::Transform;

// Re-export commonly used glam types
pub use glam::{EulerRot, Mat4, Quat, Vec3};
