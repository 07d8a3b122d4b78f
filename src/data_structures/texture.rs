//! GPU textures and texture creation utilities.
//!
//! This module provides [`Texture`], a wrapper around WGPU texture resources,
//! and helpers to create depth buffers, off-screen targets, solid fallbacks and
//! sampled textures from decoded pixel data ([`PixelBuffer`]). Decoding image
//! files is left to the caller.

use anyhow::*;
use image::{DynamicImage, ImageBuffer, RgbaImage};

use crate::program::TextureDim;

/// Decoded 8-bit pixels, row by row, `channels` bytes per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    /// 1 (grey), 2 (grey + alpha), 3 (RGB) or 4 (RGBA).
    pub channels: u8,
    pub bytes: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32, channels: u8, bytes: Vec<u8>) -> Self {
        Self {
            width,
            height,
            channels,
            bytes,
        }
    }

    /// Expands to RGBA8, the only layout the GPU side uploads.
    pub fn to_rgba8(&self) -> Result<RgbaImage> {
        ensure!(
            self.width > 0 && self.height > 0,
            "pixel buffer has zero size ({}x{})",
            self.width,
            self.height
        );
        let expected = self.width as usize * self.height as usize * self.channels as usize;
        ensure!(
            self.bytes.len() == expected,
            "pixel buffer holds {} bytes, {}x{}x{} needs {}",
            self.bytes.len(),
            self.width,
            self.height,
            self.channels,
            expected
        );
        let (w, h, bytes) = (self.width, self.height, self.bytes.clone());
        let image = match self.channels {
            1 => ImageBuffer::from_raw(w, h, bytes).map(DynamicImage::ImageLuma8),
            2 => ImageBuffer::from_raw(w, h, bytes).map(DynamicImage::ImageLumaA8),
            3 => ImageBuffer::from_raw(w, h, bytes).map(DynamicImage::ImageRgb8),
            4 => ImageBuffer::from_raw(w, h, bytes).map(DynamicImage::ImageRgba8),
            n => bail!("unsupported channel count {n}"),
        };
        image
            .map(|img| img.to_rgba8())
            .context("pixel buffer does not match its dimensions")
    }
}

/// Sampling setup for textures created from pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureOptions {
    pub address_mode: wgpu::AddressMode,
    pub filter: wgpu::FilterMode,
    /// Linear colour data (normal maps, masks) instead of sRGB.
    pub linear: bool,
}

impl Default for TextureOptions {
    fn default() -> Self {
        Self {
            address_mode: wgpu::AddressMode::Repeat,
            filter: wgpu::FilterMode::Linear,
            linear: false,
        }
    }
}

/// A GPU texture with a view and optional sampler.
///
/// Wraps WGPU texture objects along with associated views and samplers.
/// Textures are used for colour maps, sprite atlases and depth. Typically
/// created via [`from_pixels`](Self::from_pixels),
/// [`array_from_pixels`](Self::array_from_pixels) or
/// [`create_depth_texture`](Self::create_depth_texture).
#[derive(Clone, Debug)]
pub struct Texture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: Option<wgpu::Sampler>,
    pub dimension: TextureDim,
}

impl Texture {
    /// Standard depth buffer texture format (32-bit float).
    pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

    /// Create a depth texture for depth-testing during rendering.
    ///
    /// # Arguments
    ///
    /// * `size` is [width, height] of the texture in pixels
    /// * `label` is used as a debug label for the GPU resource
    pub fn create_depth_texture(device: &wgpu::Device, size: [u32; 2], label: &str) -> Self {
        let size = wgpu::Extent3d {
            width: size[0].max(1),
            height: size[1].max(1),
            depth_or_array_layers: 1,
        };
        let desc = wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[Self::DEPTH_FORMAT],
        };
        let texture = device.create_texture(&desc);
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            texture,
            view,
            sampler: None,
            dimension: TextureDim::D2,
        }
    }

    /// A 1x1 texture (or single-layer array) of one colour.
    ///
    /// Programs bind this wherever no texture has been set so that every
    /// program is drawable straight after it was built.
    pub fn solid(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        rgba: [u8; 4],
        dimension: TextureDim,
        label: &str,
    ) -> Self {
        let image = RgbaImage::from_pixel(1, 1, image::Rgba(rgba));
        upload(
            device,
            queue,
            &[image],
            dimension,
            &TextureOptions::default(),
            label,
        )
    }

    /// Upload decoded pixels as a 2D texture.
    ///
    /// # Arguments
    ///
    /// * `pixels` is any 8-bit layout [`PixelBuffer`] accepts
    /// * `options` picks wrapping, filtering and sRGB vs linear
    /// * `label` is used as a debug name for the GPU resource
    pub fn from_pixels(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        pixels: &PixelBuffer,
        options: &TextureOptions,
        label: &str,
    ) -> Result<Self> {
        let rgba = pixels.to_rgba8()?;
        Ok(upload(device, queue, &[rgba], TextureDim::D2, options, label))
    }

    /// Upload equally sized images as the layers of a 2D array texture.
    ///
    /// Sprite atlases for the particle system are built this way; the atlas
    /// index of a particle selects the layer.
    pub fn array_from_pixels(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layers: &[PixelBuffer],
        options: &TextureOptions,
        label: &str,
    ) -> Result<Self> {
        let first = layers.first().context("texture array needs at least one layer")?;
        let images = layers
            .iter()
            .enumerate()
            .map(|(i, layer)| {
                ensure!(
                    (layer.width, layer.height) == (first.width, first.height),
                    "layer {i} is {}x{}, expected {}x{}",
                    layer.width,
                    layer.height,
                    first.width,
                    first.height
                );
                layer.to_rgba8()
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(upload(
            device,
            queue,
            &images,
            TextureDim::D2Array,
            options,
            label,
        ))
    }
}

fn upload(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    layers: &[RgbaImage],
    dimension: TextureDim,
    options: &TextureOptions,
    label: &str,
) -> Texture {
    let (width, height) = layers[0].dimensions();
    let size = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: layers.len() as u32,
    };
    let format = if options.linear {
        wgpu::TextureFormat::Rgba8Unorm
    } else {
        wgpu::TextureFormat::Rgba8UnormSrgb
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    for (layer, rgba) in layers.iter().enumerate() {
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: 0,
                    y: 0,
                    z: layer as u32,
                },
            },
            rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
    }

    let view = texture.create_view(&wgpu::TextureViewDescriptor {
        label: Some(label),
        dimension: Some(dimension.view_dimension()),
        ..Default::default()
    });
    let sampler = Some(create_sampler(device, options));
    Texture {
        texture,
        view,
        sampler,
        dimension,
    }
}

pub fn create_sampler(device: &wgpu::Device, options: &TextureOptions) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        address_mode_u: options.address_mode,
        address_mode_v: options.address_mode,
        address_mode_w: options.address_mode,
        mag_filter: options.filter,
        min_filter: options.filter,
        ..Default::default()
    })
}

/// A colour attachment that can also be copied out, used for off-screen frames.
pub fn create_render_target(
    device: &wgpu::Device,
    (width, height): (u32, u32),
    format: wgpu::TextureFormat,
    label: &str,
) -> Texture {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    Texture {
        texture,
        view,
        sampler: None,
        dimension: TextureDim::D2,
    }
}
