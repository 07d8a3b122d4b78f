//! Render pipeline construction.
//!
//! - `basic` builds a pipeline for a reflected program and holds the opaque preset
//! - `additive` holds the blending preset used by the particle system

pub mod additive;
pub mod basic;

pub use basic::{PipelineOptions, Stages, mk_render_pipeline};
