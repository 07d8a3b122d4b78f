//! Engine data structures shared by the renderers.
//!
//! - `texture` contains the GPU texture wrapper, pixel upload and target helpers

pub mod texture;
