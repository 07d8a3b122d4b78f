//! GPU context shared by every binding and renderer.
//!
//! The window and its surface belong to the caller. A [`Context`] is either
//! created headless (off-screen rendering, tests) or assembled from a device
//! and queue the caller already owns.

use anyhow::{Context as _, Result};

use crate::data_structures::texture::{self, Texture};

#[derive(Debug)]
pub struct Context {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    /// Format of the colour targets the scene renders into.
    pub format: wgpu::TextureFormat,
    pub(crate) depth_texture: Texture,
    size: (u32, u32),
}

impl Context {
    /// Requests an adapter and device without any surface.
    pub async fn headless(width: u32, height: u32) -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..wgpu::InstanceDescriptor::new_without_display_handle()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .context("failed to find a suitable GPU adapter")?;
        log::info!("using adapter {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("snowglobe device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create wgpu device/queue")?;

        Ok(Self::from_parts(
            device,
            queue,
            wgpu::TextureFormat::Rgba8UnormSrgb,
            width,
            height,
        ))
    }

    /// Wraps a caller owned device. `format` must match the views passed to render.
    pub fn from_parts(
        device: wgpu::Device,
        queue: wgpu::Queue,
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> Self {
        let depth_texture =
            Texture::create_depth_texture(&device, [width, height], "depth_texture");
        Self {
            device,
            queue,
            format,
            depth_texture,
            size: (width.max(1), height.max(1)),
        }
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    /// Recreates the depth buffer for the new target size.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            log::warn!("ignoring resize to {width}x{height}");
            return;
        }
        self.size = (width, height);
        self.depth_texture =
            Texture::create_depth_texture(&self.device, [width, height], "depth_texture");
    }

    pub fn depth_view(&self) -> &wgpu::TextureView {
        &self.depth_texture.view
    }

    /// An off-screen colour target matching the context's format and size.
    pub fn create_target(&self, label: &str) -> Texture {
        texture::create_render_target(&self.device, self.size, self.format, label)
    }
}
