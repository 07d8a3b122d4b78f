use std::time::Duration;

use anyhow::{Context as _, Result};
use snowglobe::{
    Context,
    data_structures::texture::Texture,
    logging::{LoggingConfig, init_logging},
};

/// Width and height of every test frame. 64 RGBA pixels fill one 256 byte row.
pub const SIZE: u32 = 64;

pub fn headless() -> Result<Context> {
    init_logging(LoggingConfig {
        is_test: true,
        ..LoggingConfig::default()
    });
    futures::executor::block_on(Context::headless(SIZE, SIZE))
}

/// Copies a render target back to the CPU.
pub fn read_target(ctx: &Context, target: &Texture) -> Result<image::RgbaImage> {
    let (width, height) = ctx.size();
    let bytes_per_row = 4 * width;
    let output = ctx.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("readback"),
        size: (bytes_per_row * height) as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });
    let mut encoder = ctx
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("readback encoder"),
        });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            aspect: wgpu::TextureAspect::All,
            texture: &target.texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &output,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    ctx.queue.submit(std::iter::once(encoder.finish()));

    let slice = output.slice(..);
    let (tx, rx) = futures_intrusive::channel::shared::oneshot_channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        tx.send(result).ok();
    });
    ctx.device.poll(wgpu::PollType::Wait {
        submission_index: None,
        timeout: Some(Duration::from_secs(3)),
    })?;
    futures::executor::block_on(rx.receive())
        .context("readback channel closed")??;
    let data = slice.get_mapped_range().to_vec();
    output.unmap();
    image::RgbaImage::from_raw(width, height, data).context("readback has the wrong size")
}

/// The byte an sRGB target stores for a linear colour channel.
pub fn srgb_byte(linear: f64) -> u8 {
    let c = linear.clamp(0.0, 1.0);
    let encoded = if c <= 0.0031308 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    };
    (encoded * 255.0).round() as u8
}

pub fn close(a: u8, b: u8) -> bool {
    a.abs_diff(b) <= 2
}
