//! Static vertex data bound to a reflected program.
//!
//! Key types:
//! - [`GeometryConfig`] describes vertex buffers as flat `f32` data plus the
//!   ordered `(attribute, components)` list interleaved in each of them
//! - [`GeometryBinding`] owns the uploaded buffers, the pipeline and the
//!   object's `model_transform`
//!
//! Everything is checked against the program when the binding is built;
//! drawing cannot fail.

use thiserror::Error;
use wgpu::util::DeviceExt;

use crate::{
    context::Context,
    math::Matrix4,
    pipelines::PipelineOptions,
    program::{
        BindingError, MODEL_TRANSFORM, ObjectBlock, ProgramBinding, ProgramInterface, Uniform,
    },
};

#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("geometry has no vertex buffers")]
    NoBuffers,
    #[error("vertex buffer {buffer} declares no attributes")]
    NoAttributes { buffer: usize },
    #[error("vertex buffer {buffer} holds {len} floats, not a multiple of its stride {stride}")]
    Misaligned { buffer: usize, len: usize, stride: u32 },
    #[error("vertex buffer {buffer} holds {found} vertices, buffer 0 holds {expected}")]
    VertexCountMismatch {
        buffer: usize,
        expected: u32,
        found: u32,
    },
    #[error("attribute `{name}` has {expected} components in the shader, {found} provided")]
    ComponentMismatch {
        name: String,
        expected: u32,
        found: u32,
    },
    #[error("attribute `{name}` is not a float attribute")]
    NotFloat { name: String },
    #[error("shader attribute `{name}` is not fed by any vertex buffer")]
    MissingAttribute { name: String },
    #[error(transparent)]
    Binding(#[from] BindingError),
}

/// One vertex buffer: interleaved floats and the attributes they hold.
#[derive(Debug, Clone, Default)]
pub struct VertexData {
    pub data: Vec<f32>,
    /// `(attribute name, component count)` in interleave order.
    pub attributes: Vec<(String, u32)>,
}

impl VertexData {
    pub fn new(data: Vec<f32>) -> Self {
        Self {
            data,
            attributes: Vec::new(),
        }
    }

    pub fn attribute(mut self, name: impl Into<String>, components: u32) -> Self {
        self.attributes.push((name.into(), components));
        self
    }

    /// Floats per vertex.
    pub fn stride(&self) -> u32 {
        self.attributes.iter().map(|(_, n)| n).sum()
    }
}

#[derive(Debug, Clone)]
pub struct GeometryConfig {
    pub buffers: Vec<VertexData>,
    pub topology: wgpu::PrimitiveTopology,
    pub transform: Matrix4,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            buffers: Vec::new(),
            topology: wgpu::PrimitiveTopology::TriangleList,
            transform: Matrix4::identity(),
        }
    }
}

/// Resolved layout of one vertex buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferLayout {
    /// Floats per vertex.
    pub stride: u32,
    pub attributes: Vec<wgpu::VertexAttribute>,
    pub step_mode: wgpu::VertexStepMode,
}

impl BufferLayout {
    pub fn as_wgpu(&self) -> wgpu::VertexBufferLayout<'_> {
        wgpu::VertexBufferLayout {
            array_stride: (self.stride as usize * size_of::<f32>()) as wgpu::BufferAddress,
            step_mode: self.step_mode,
            attributes: &self.attributes,
        }
    }
}

/// Matches buffer descriptions against the program's attributes.
///
/// Attributes the program does not use still take up their space in the
/// interleave but are not bound. Returns one layout per buffer.
pub fn resolve_layouts(
    program: &ProgramInterface,
    buffers: &[&[(String, u32)]],
) -> Result<Vec<BufferLayout>, GeometryError> {
    if buffers.is_empty() {
        return Err(GeometryError::NoBuffers);
    }
    let mut fed = Vec::new();
    let mut layouts = Vec::with_capacity(buffers.len());
    for (index, attributes) in buffers.iter().enumerate() {
        if attributes.is_empty() {
            return Err(GeometryError::NoAttributes { buffer: index });
        }
        let mut offset = 0u32;
        let mut resolved = Vec::new();
        for (name, components) in attributes.iter() {
            match program.attribute(name) {
                Some(descriptor) => {
                    let expected = descriptor.ty.components();
                    if expected != *components {
                        return Err(GeometryError::ComponentMismatch {
                            name: name.clone(),
                            expected,
                            found: *components,
                        });
                    }
                    let format = match descriptor.ty.vertex_format() {
                        Some(f @ (wgpu::VertexFormat::Float32
                        | wgpu::VertexFormat::Float32x2
                        | wgpu::VertexFormat::Float32x3
                        | wgpu::VertexFormat::Float32x4)) => f,
                        _ => return Err(GeometryError::NotFloat { name: name.clone() }),
                    };
                    resolved.push(wgpu::VertexAttribute {
                        format,
                        offset: (offset as usize * size_of::<f32>()) as wgpu::BufferAddress,
                        shader_location: descriptor.location,
                    });
                    fed.push(name.as_str());
                }
                None => log::warn!(
                    "program `{}` has no attribute `{name}`, skipping it",
                    program.label()
                ),
            }
            offset += components;
        }
        layouts.push(BufferLayout {
            stride: offset,
            attributes: resolved,
            step_mode: wgpu::VertexStepMode::Vertex,
        });
    }

    if let Some((name, _)) = program.attributes().find(|(name, _)| !fed.contains(name)) {
        return Err(GeometryError::MissingAttribute {
            name: name.to_owned(),
        });
    }
    Ok(layouts)
}

/// Checks buffer lengths against their strides and returns the vertex count.
pub fn vertex_count(buffers: &[VertexData]) -> Result<u32, GeometryError> {
    let mut count = None;
    for (index, buffer) in buffers.iter().enumerate() {
        let stride = buffer.stride();
        if stride == 0 {
            return Err(GeometryError::NoAttributes { buffer: index });
        }
        if buffer.data.len() % stride as usize != 0 {
            return Err(GeometryError::Misaligned {
                buffer: index,
                len: buffer.data.len(),
                stride,
            });
        }
        let vertices = (buffer.data.len() / stride as usize) as u32;
        match count {
            None => count = Some(vertices),
            Some(expected) if expected != vertices => {
                return Err(GeometryError::VertexCountMismatch {
                    buffer: index,
                    expected,
                    found: vertices,
                });
            }
            Some(_) => {}
        }
    }
    count.ok_or(GeometryError::NoBuffers)
}

/// Uploaded vertex buffers and the draw call that consumes them.
///
/// Buffers are created once and released when the binding is dropped.
#[derive(Debug)]
pub struct GeometryBinding {
    buffers: Vec<wgpu::Buffer>,
    pipeline: wgpu::RenderPipeline,
    vertex_count: u32,
    transform: Matrix4,
    model: Option<(Uniform<Matrix4>, ObjectBlock)>,
}

impl GeometryBinding {
    pub fn new(
        ctx: &Context,
        program: &ProgramBinding,
        config: GeometryConfig,
    ) -> Result<Self, GeometryError> {
        let attribute_lists: Vec<&[(String, u32)]> = config
            .buffers
            .iter()
            .map(|b| b.attributes.as_slice())
            .collect();
        let layouts = resolve_layouts(program.interface(), &attribute_lists)?;
        let vertex_count = vertex_count(&config.buffers)?;

        let model = match program.uniform_handle::<Matrix4>(MODEL_TRANSFORM)? {
            Some(handle) => {
                let mut block = program.object_block(ctx, handle)?;
                block.set(handle, config.transform);
                Some((handle, block))
            }
            None => {
                log::warn!(
                    "program `{}` has no `{MODEL_TRANSFORM}`, geometry is drawn untransformed",
                    program.label()
                );
                None
            }
        };

        let buffers = config
            .buffers
            .iter()
            .enumerate()
            .map(|(i, b)| {
                ctx.device
                    .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some(&format!("{} vertex buffer {i}", program.label())),
                        contents: bytemuck::cast_slice(&b.data),
                        usage: wgpu::BufferUsages::VERTEX,
                    })
            })
            .collect();

        let wgpu_layouts: Vec<wgpu::VertexBufferLayout> =
            layouts.iter().map(BufferLayout::as_wgpu).collect();
        let pipeline = program.create_pipeline(
            ctx,
            &wgpu_layouts,
            &PipelineOptions::opaque(config.topology),
        );

        Ok(Self {
            buffers,
            pipeline,
            vertex_count,
            transform: config.transform,
            model,
        })
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn transform(&self) -> Matrix4 {
        self.transform
    }

    pub fn set_transform(&mut self, transform: Matrix4) {
        self.transform = transform;
        if let Some((handle, block)) = &mut self.model {
            block.set(*handle, transform);
        }
    }

    /// Uploads a changed model transform along with the program's values that
    /// share its group. Call after the program is flushed, before the render
    /// pass starts.
    pub fn prepare(&mut self, ctx: &Context, program: &ProgramBinding) {
        if let Some((_, block)) = &mut self.model {
            block.follow(program.interface());
            block.flush(&ctx.queue);
        }
    }

    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>, program: &ProgramBinding) {
        pass.set_pipeline(&self.pipeline);
        program.bind(pass);
        if let Some((_, block)) = &self.model {
            block.bind(pass);
        }
        for (slot, buffer) in self.buffers.iter().enumerate() {
            pass.set_vertex_buffer(slot as u32, buffer.slice(..));
        }
        pass.draw(0..self.vertex_count, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::ProgramSource;

    const VERTEX: &str = r#"
@group(0) @binding(0) var<uniform> model_transform: mat4x4<f32>;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) uv: vec2<f32>,
}

@vertex
fn vs_main(in: VertexInput) -> @builtin(position) vec4<f32> {
    return model_transform * vec4<f32>(in.position, in.uv.x);
}
"#;

    const FRAGMENT: &str = r#"
@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(1.0);
}
"#;

    fn program() -> ProgramInterface {
        ProgramInterface::build(&ProgramSource::new("mesh", VERTEX, FRAGMENT)).unwrap()
    }

    fn attrs(list: &[(&str, u32)]) -> Vec<(String, u32)> {
        list.iter().map(|(n, c)| (n.to_string(), *c)).collect()
    }

    #[test]
    fn interleaved_attributes_get_running_offsets() {
        let program = program();
        let list = attrs(&[("position", 3), ("normal", 3), ("uv", 2)]);
        let layouts = resolve_layouts(&program, &[&list]).unwrap();
        assert_eq!(layouts[0].stride, 8);
        assert_eq!(layouts[0].attributes.len(), 2);
        assert_eq!(layouts[0].attributes[1].offset, 24);
        assert_eq!(layouts[0].attributes[1].shader_location, 1);
        assert_eq!(layouts[0].as_wgpu().array_stride, 32);
    }

    #[test]
    fn separate_buffers_each_start_at_zero() {
        let program = program();
        let positions = attrs(&[("position", 3)]);
        let uvs = attrs(&[("uv", 2)]);
        let layouts = resolve_layouts(&program, &[&positions, &uvs]).unwrap();
        assert_eq!(layouts[1].attributes[0].offset, 0);
        assert_eq!(layouts[1].stride, 2);
    }

    #[test]
    fn empty_configs_fail_fast() {
        let program = program();
        assert!(matches!(
            resolve_layouts(&program, &[]),
            Err(GeometryError::NoBuffers)
        ));
        let empty: Vec<(String, u32)> = Vec::new();
        assert!(matches!(
            resolve_layouts(&program, &[&empty]),
            Err(GeometryError::NoAttributes { buffer: 0 })
        ));
    }

    #[test]
    fn wrong_component_count_is_rejected() {
        let program = program();
        let list = attrs(&[("position", 4), ("uv", 2)]);
        assert!(matches!(
            resolve_layouts(&program, &[&list]),
            Err(GeometryError::ComponentMismatch { expected: 3, found: 4, .. })
        ));
    }

    #[test]
    fn unfed_shader_attribute_is_rejected() {
        let program = program();
        let list = attrs(&[("position", 3)]);
        match resolve_layouts(&program, &[&list]) {
            Err(GeometryError::MissingAttribute { name }) => assert_eq!(name, "uv"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn vertex_count_uses_first_buffer_stride() {
        let buffers = vec![
            VertexData::new(vec![0.0; 9]).attribute("position", 3),
            VertexData::new(vec![0.0; 6]).attribute("uv", 2),
        ];
        assert_eq!(vertex_count(&buffers).unwrap(), 3);
    }

    #[test]
    fn ragged_buffers_are_rejected() {
        let misaligned = vec![VertexData::new(vec![0.0; 7]).attribute("position", 3)];
        assert!(matches!(
            vertex_count(&misaligned),
            Err(GeometryError::Misaligned { .. })
        ));
        let uneven = vec![
            VertexData::new(vec![0.0; 9]).attribute("position", 3),
            VertexData::new(vec![0.0; 4]).attribute("uv", 2),
        ];
        assert!(matches!(
            vertex_count(&uneven),
            Err(GeometryError::VertexCountMismatch { buffer: 1, .. })
        ));
    }
}
