//! snowglobe
//!
//! A small real-time 3D renderer on top of wgpu: a free-look camera, static
//! textured meshes and a camera-facing particle system, driven by the caller's
//! window loop. Shader programs are reflected once at load time so uniforms
//! and vertex attributes are bound by name and checked by type.
//!
//! High-level modules
//! - `math`: `Vector3`, `Vector4` and `Matrix4` with the transform builders
//! - `camera`: pitch/yaw camera updated from an input snapshot
//! - `input`: the per-frame input snapshot and winit event translation
//! - `program`: shader reflection and type-checked uniform/texture binding
//! - `geometry`: vertex buffers bound to a program and a model transform
//! - `particles`: particle physics, distance sorting and billboard streaming
//! - `scene`: owns everything above and renders a frame
//! - `context`: device, queue and depth buffer shared by all of it
//! - `pipelines`: render pipeline construction (opaque and additive)
//!

pub mod camera;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod geometry;
pub mod input;
pub mod logging;
pub mod math;
pub mod particles;
pub mod pipelines;
pub mod program;
pub mod scene;
pub mod shaders;
pub mod time;

// Re-exports commonly used types for convenience in downstream code.
pub use camera::Camera;
pub use config::SceneConfig;
pub use context::Context;
pub use scene::Scene;
pub use wgpu;
pub use winit::event::{DeviceEvent, WindowEvent};
