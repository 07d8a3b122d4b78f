use std::ops::Range;

use wgpu::util::DeviceExt;

use crate::{
    context::Context,
    geometry::{self, BufferLayout, GeometryError},
    math::Vector3,
    pipelines::PipelineOptions,
    program::ProgramBinding,
};

use super::{
    billboard::{self, QUAD_CORNERS, QUAD_UVS},
    pool::Particle,
};

/// Separates consecutive sprite strips in the index buffer.
const PRIMITIVE_RESTART: u32 = u32::MAX;

const CORNERS: u32 = QUAD_CORNERS.len() as u32;

/// GPU side of a particle system.
///
/// Positions and atlas indices are streamed every frame, texture coordinates
/// are uploaded once. Every sprite is its own 4-vertex triangle strip; the
/// strips are issued in a single indexed draw split by primitive restart.
#[derive(Debug)]
pub struct ParticleRenderer {
    capacity: u32,
    positions: wgpu::Buffer,
    uvs: wgpu::Buffer,
    atlas: wgpu::Buffer,
    indices: wgpu::Buffer,
    /// Vertex range of each sprite's strip, fixed at construction.
    ranges: Vec<Range<u32>>,
    pipeline: wgpu::RenderPipeline,
    scratch_positions: Vec<f32>,
    scratch_atlas: Vec<f32>,
    live: u32,
}

impl ParticleRenderer {
    pub fn new(
        ctx: &Context,
        program: &ProgramBinding,
        capacity: usize,
    ) -> Result<Self, GeometryError> {
        let position = [("position".to_owned(), 3)];
        let uv = [("uv".to_owned(), 2)];
        let atlas_index = [("atlas_index".to_owned(), 1)];
        let layouts =
            geometry::resolve_layouts(program.interface(), &[&position, &uv, &atlas_index])?;

        let capacity = capacity as u32;
        let vertices = (capacity * CORNERS) as u64;
        let float = size_of::<f32>() as u64;
        let stream = |label: &str, components: u64| {
            ctx.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: vertices * components * float,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };
        let positions = stream("particle positions", 3);
        let atlas = stream("particle atlas indices", 1);

        let uv_data: Vec<f32> = (0..capacity)
            .flat_map(|_| QUAD_UVS.iter().flatten().copied())
            .collect();
        let uvs = ctx
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("particle uvs"),
                contents: bytemuck::cast_slice(&uv_data),
                usage: wgpu::BufferUsages::VERTEX,
            });

        let ranges = strip_ranges(capacity);
        let index_data = strip_indices(&ranges);
        let indices = ctx
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("particle strips"),
                contents: bytemuck::cast_slice(&index_data),
                usage: wgpu::BufferUsages::INDEX,
            });

        let wgpu_layouts: Vec<wgpu::VertexBufferLayout> =
            layouts.iter().map(BufferLayout::as_wgpu).collect();
        let pipeline = program.create_pipeline(
            ctx,
            &wgpu_layouts,
            &PipelineOptions::additive(wgpu::PrimitiveTopology::TriangleStrip),
        );

        Ok(Self {
            capacity,
            positions,
            uvs,
            atlas,
            indices,
            ranges,
            pipeline,
            scratch_positions: Vec::with_capacity(vertices as usize * 3),
            scratch_atlas: Vec::with_capacity(vertices as usize),
            live: 0,
        })
    }

    /// Regenerates the sprites for the current camera direction and streams them.
    pub fn upload(&mut self, ctx: &Context, particles: &[Particle], camera_forward: Vector3) {
        let particles = if particles.len() > self.capacity as usize {
            log::warn!(
                "{} particles exceed renderer capacity {}, drawing the nearest",
                particles.len(),
                self.capacity
            );
            &particles[..self.capacity as usize]
        } else {
            particles
        };
        billboard::write_mesh(
            particles,
            camera_forward,
            &mut self.scratch_positions,
            &mut self.scratch_atlas,
        );
        ctx.queue
            .write_buffer(&self.positions, 0, bytemuck::cast_slice(&self.scratch_positions));
        ctx.queue
            .write_buffer(&self.atlas, 0, bytemuck::cast_slice(&self.scratch_atlas));
        self.live = particles.len() as u32;
    }

    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>, program: &ProgramBinding) {
        if self.live == 0 {
            return;
        }
        pass.set_pipeline(&self.pipeline);
        program.bind(pass);
        pass.set_vertex_buffer(0, self.positions.slice(..));
        pass.set_vertex_buffer(1, self.uvs.slice(..));
        pass.set_vertex_buffer(2, self.atlas.slice(..));
        pass.set_index_buffer(self.indices.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..index_count(self.live), 0, 0..1);
    }

    /// Strip ranges of all sprites the renderer can hold.
    pub fn ranges(&self) -> &[Range<u32>] {
        &self.ranges
    }
}

fn strip_ranges(count: u32) -> Vec<Range<u32>> {
    (0..count).map(|i| i * CORNERS..(i + 1) * CORNERS).collect()
}

fn strip_indices(ranges: &[Range<u32>]) -> Vec<u32> {
    let mut indices = Vec::with_capacity(ranges.len() * (CORNERS as usize + 1));
    for (i, range) in ranges.iter().enumerate() {
        if i > 0 {
            indices.push(PRIMITIVE_RESTART);
        }
        indices.extend(range.clone());
    }
    indices
}

/// Indices covering the first `sprites` strips, restart markers included.
fn index_count(sprites: u32) -> u32 {
    sprites * (CORNERS + 1) - 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_are_four_vertices_apart() {
        let ranges = strip_ranges(3);
        assert_eq!(ranges, vec![0..4, 4..8, 8..12]);
    }

    #[test]
    fn strips_are_split_by_restart_markers() {
        let indices = strip_indices(&strip_ranges(2));
        assert_eq!(indices, vec![0, 1, 2, 3, PRIMITIVE_RESTART, 4, 5, 6, 7]);
        assert_eq!(index_count(2) as usize, indices.len());
        assert_eq!(index_count(1), 4);
    }
}
