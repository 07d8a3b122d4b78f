//! The scene: every program, texture and drawable of a frame plus the camera.
//!
//! Programs and textures live in arenas owned by the [`Scene`]; geometry and
//! particle systems refer to their program by [`ProgramId`]. Programs that
//! declare both `view_transform` and `projection` as `mat4x4<f32>` receive the
//! camera matrices on every render.

use std::iter;

use anyhow::{Context as _, Result};

use crate::{
    camera::Camera,
    config::SceneConfig,
    context::Context,
    data_structures::texture::{PixelBuffer, Texture, TextureOptions},
    geometry::{GeometryBinding, GeometryConfig},
    input::InputSnapshot,
    math::Matrix4,
    particles::{ParticleConfig, ParticleSystem},
    program::{CameraUse, ProgramBinding, ProgramSource, Uniform},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeometryId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParticlesId(usize);

/// Camera uniforms of one camera dependent program.
#[derive(Debug, Clone, Copy)]
struct CameraUniforms {
    program: ProgramId,
    view: Uniform<Matrix4>,
    projection: Uniform<Matrix4>,
}

#[derive(Debug)]
pub struct Scene {
    config: SceneConfig,
    camera: Camera,
    programs: Vec<ProgramBinding>,
    textures: Vec<Texture>,
    camera_uniforms: Vec<CameraUniforms>,
    geometries: Vec<(ProgramId, GeometryBinding)>,
    particles: Vec<(ProgramId, ParticleSystem)>,
}

impl Scene {
    pub fn new(config: SceneConfig) -> Self {
        let camera = Camera::new(
            config.camera_position,
            cgmath::Rad(config.camera_pitch),
            cgmath::Rad(config.camera_yaw),
            config.projection(config.aspect),
        );
        Self {
            config,
            camera,
            programs: Vec::new(),
            textures: Vec::new(),
            camera_uniforms: Vec::new(),
            geometries: Vec::new(),
            particles: Vec::new(),
        }
    }

    /// Compiles and reflects a program and registers it for camera updates.
    pub fn add_program(&mut self, ctx: &Context, source: &ProgramSource) -> Result<ProgramId> {
        let program = ProgramBinding::new(ctx, source)?;
        let id = ProgramId(self.programs.len());

        if let CameraUse::Follows { view, projection } = program.interface().camera_use() {
            log::debug!("program `{}` follows the camera", program.label());
            self.camera_uniforms.push(CameraUniforms {
                program: id,
                view,
                projection,
            });
        }

        self.programs.push(program);
        Ok(id)
    }

    pub fn add_texture(
        &mut self,
        ctx: &Context,
        pixels: &PixelBuffer,
        options: &TextureOptions,
        label: &str,
    ) -> Result<TextureId> {
        let texture = Texture::from_pixels(&ctx.device, &ctx.queue, pixels, options, label)?;
        self.textures.push(texture);
        Ok(TextureId(self.textures.len() - 1))
    }

    /// Adds a layered texture, e.g. a particle sprite atlas.
    pub fn add_texture_array(
        &mut self,
        ctx: &Context,
        layers: &[PixelBuffer],
        options: &TextureOptions,
        label: &str,
    ) -> Result<TextureId> {
        let texture = Texture::array_from_pixels(&ctx.device, &ctx.queue, layers, options, label)?;
        self.textures.push(texture);
        Ok(TextureId(self.textures.len() - 1))
    }

    /// Binds a scene texture to the texture uniform `name` of a program.
    pub fn bind_texture(&mut self, program: ProgramId, name: &str, texture: TextureId) -> Result<()> {
        let texture = self
            .textures
            .get(texture.0)
            .with_context(|| format!("unknown texture {texture:?}"))?;
        let program = self
            .programs
            .get_mut(program.0)
            .with_context(|| format!("unknown program {program:?}"))?;
        program.set_texture(name, texture)?;
        Ok(())
    }

    pub fn add_geometry(
        &mut self,
        ctx: &Context,
        program: ProgramId,
        config: GeometryConfig,
    ) -> Result<GeometryId> {
        let binding = self.program(program)?;
        let geometry = GeometryBinding::new(ctx, binding, config)
            .with_context(|| format!("invalid geometry for program `{}`", binding.label()))?;
        self.geometries.push((program, geometry));
        Ok(GeometryId(self.geometries.len() - 1))
    }

    pub fn add_particles(
        &mut self,
        ctx: &Context,
        program: ProgramId,
        config: ParticleConfig,
    ) -> Result<ParticlesId> {
        let binding = self.program(program)?;
        let system = ParticleSystem::new(ctx, binding, config)?;
        self.particles.push((program, system));
        Ok(ParticlesId(self.particles.len() - 1))
    }

    /// Advances the camera by the frame's input, then every particle system.
    pub fn update(&mut self, input: &InputSnapshot, delta: f32) {
        self.camera.update(input, delta);
        for (_, system) in &mut self.particles {
            system.update(delta);
        }
    }

    /// Adapts the projection and the depth buffer to a new target size.
    pub fn resize(&mut self, ctx: &mut Context, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        ctx.resize(width, height);
        self.camera
            .set_projection(self.config.projection(width as f32 / height as f32));
    }

    /// Draws one frame into `target`.
    ///
    /// Camera uniforms are pushed first, static geometry is drawn before the
    /// particle systems so translucent sprites blend over opaque surfaces.
    pub fn render(&mut self, ctx: &Context, target: &wgpu::TextureView) {
        let view = self.camera.transform();
        let projection = Matrix4::OPENGL_TO_WGPU * self.camera.projection();
        for registration in &self.camera_uniforms {
            let program = &mut self.programs[registration.program.0];
            program.set(registration.view, view);
            program.set(registration.projection, projection);
        }
        for program in &mut self.programs {
            program.flush(ctx);
        }
        for (program, geometry) in &mut self.geometries {
            geometry.prepare(ctx, &self.programs[program.0]);
        }
        for (_, system) in &mut self.particles {
            system.prepare(ctx, &self.camera);
        }

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Scene Encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.config.clear_colour),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: ctx.depth_view(),
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
                multiview_mask: None,
            });

            for (program, geometry) in &self.geometries {
                geometry.draw(&mut pass, &self.programs[program.0]);
            }
            for (program, system) in &self.particles {
                system.draw(&mut pass, &self.programs[program.0]);
            }
        }
        ctx.queue.submit(iter::once(encoder.finish()));
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn program(&self, id: ProgramId) -> Result<&ProgramBinding> {
        self.programs
            .get(id.0)
            .with_context(|| format!("unknown program {id:?}"))
    }

    pub fn program_mut(&mut self, id: ProgramId) -> Result<&mut ProgramBinding> {
        self.programs
            .get_mut(id.0)
            .with_context(|| format!("unknown program {id:?}"))
    }

    pub fn texture(&self, id: TextureId) -> Option<&Texture> {
        self.textures.get(id.0)
    }

    pub fn geometry_mut(&mut self, id: GeometryId) -> Option<&mut GeometryBinding> {
        self.geometries.get_mut(id.0).map(|(_, g)| g)
    }

    pub fn particles(&self, id: ParticlesId) -> Option<&ParticleSystem> {
        self.particles.get(id.0).map(|(_, p)| p)
    }

    pub fn particles_mut(&mut self, id: ParticlesId) -> Option<&mut ParticleSystem> {
        self.particles.get_mut(id.0).map(|(_, p)| p)
    }

    /// Whether the program receives the camera matrices.
    pub fn follows_camera(&self, id: ProgramId) -> bool {
        self.camera_uniforms.iter().any(|r| r.program == id)
    }
}
