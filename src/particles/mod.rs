//! Camera-facing sprite particles.
//!
//! Key types:
//! - [`ParticlePool`] owns particle state and does physics, respawn and sorting
//! - [`ParticleRenderer`] streams the regenerated sprite mesh to the GPU
//! - [`ParticleSystem`] ties both together for the scene
//!
//! Particles never die. Each one falls until it drops below the configured
//! respawn height and is then reset at the spawn center. Each frame the pool
//! is sorted by camera distance and the billboards are rebuilt to face the
//! camera before they are drawn with additive blending.

pub mod billboard;
mod pool;
mod renderer;

use anyhow::Result;

use crate::{camera::Camera, context::Context, program::ProgramBinding};

pub use pool::{Particle, ParticleConfig, ParticlePool};
pub use renderer::ParticleRenderer;

/// Attribute names the particle program is expected to consume.
pub const ATTRIBUTES: [&str; 3] = ["position", "uv", "atlas_index"];

#[derive(Debug)]
pub struct ParticleSystem {
    pool: ParticlePool,
    renderer: ParticleRenderer,
}

impl ParticleSystem {
    pub fn new(ctx: &Context, program: &ProgramBinding, config: ParticleConfig) -> Result<Self> {
        let pool = ParticlePool::new(config)?;
        let renderer = ParticleRenderer::new(ctx, program, pool.len())?;
        log::info!(
            "particle system with {} particles on program `{}`",
            pool.len(),
            program.label()
        );
        Ok(Self { pool, renderer })
    }

    pub fn update(&mut self, delta: f32) {
        self.pool.update(delta);
    }

    /// Sorts by distance to the camera and streams the rebuilt sprites.
    /// Runs before the render pass begins.
    pub fn prepare(&mut self, ctx: &Context, camera: &Camera) {
        self.pool.sort_by_distance(camera.position());
        self.renderer
            .upload(ctx, self.pool.particles(), camera.forward());
    }

    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>, program: &ProgramBinding) {
        self.renderer.draw(pass, program);
    }

    pub fn pool(&self) -> &ParticlePool {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut ParticlePool {
        &mut self.pool
    }
}
