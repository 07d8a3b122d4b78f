//! WGSL programs shipped with the crate.
//!
//! Both programs read the camera from `@group(0) @binding(0)`. The mesh
//! program takes `model_transform` from group 1 and its `diffuse` texture
//! from group 2; the particle program samples its sprite `atlas` from group 1.

use crate::program::ProgramSource;

pub const MESH_VERTEX: &str = include_str!("mesh_vertex.wgsl");
pub const MESH_FRAGMENT: &str = include_str!("mesh_fragment.wgsl");
pub const PARTICLE_VERTEX: &str = include_str!("particle_vertex.wgsl");
pub const PARTICLE_FRAGMENT: &str = include_str!("particle_fragment.wgsl");

/// Lit, textured static geometry: `position`, `normal`, `uv`.
pub fn mesh() -> ProgramSource {
    ProgramSource::new("mesh", MESH_VERTEX, MESH_FRAGMENT)
}

/// Additive sprites from a layered atlas: `position`, `uv`, `atlas_index`.
pub fn particles() -> ProgramSource {
    ProgramSource::new("particles", PARTICLE_VERTEX, PARTICLE_FRAGMENT)
}
