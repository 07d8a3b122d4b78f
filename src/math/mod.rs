//! Linear algebra used by the camera, the programs and the particle system.
//!
//! Key types:
//! - [`Vector3`] and [`Vector4`] are small `Copy` vectors
//! - [`Matrix4`] is a row-major transform with the usual projection builders
//!
//! Nothing in here touches the GPU. Conversions to and from `cgmath` exist for
//! interop with code that already uses it.

mod matrix;
mod vector;

pub use matrix::{Axis, Matrix4};
pub use vector::{Vector3, Vector4};
