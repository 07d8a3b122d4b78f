//! Shader programs with reflected, type-checked bindings.
//!
//! Key types:
//! - [`ProgramSource`] holds the WGSL of the vertex and fragment stage
//! - [`ProgramInterface`] is the device independent result of compiling,
//!   linking and reflecting those stages, plus staged uniform values
//! - [`ProgramBinding`] owns the GPU side: shader modules, bind group layouts,
//!   uniform buffers and bind groups
//! - [`Uniform<T>`] is a handle resolved once by name, checked against `T`
//! - [`ObjectBlock`] is a private copy of a uniform-only bind group, used for
//!   per-object values such as `model_transform`
//!
//! Uniform names are resolved once; a name the program does not use is
//! ignored, a value of the wrong type is an error.

mod error;
mod interface;
mod object;
mod reflect;
mod uniform;

use std::collections::HashMap;

use wgpu::util::DeviceExt;

use crate::{
    context::Context,
    data_structures::texture::{self, Texture, TextureOptions},
    pipelines::{self, PipelineOptions, Stages},
};

pub use error::{BindingError, Stage};
pub use interface::{CameraUse, ProgramInterface, ProgramSource};
pub use object::ObjectBlock;
pub use reflect::{
    AttributeDescriptor, ResourceSlot, ShaderType, SlotKind, TextureDim, UniformDescriptor,
    UniformLocation,
};
pub use uniform::{Uniform, UniformBlock, UniformData};

/// Name of the per-object transform uniform.
pub const MODEL_TRANSFORM: &str = "model_transform";
/// Name of the camera view matrix uniform.
pub const VIEW_TRANSFORM: &str = "view_transform";
/// Name of the camera projection uniform.
pub const PROJECTION: &str = "projection";

/// A compiled program together with everything needed to draw with it.
#[derive(Debug)]
pub struct ProgramBinding {
    interface: ProgramInterface,
    vertex: wgpu::ShaderModule,
    fragment: wgpu::ShaderModule,
    layouts: Vec<wgpu::BindGroupLayout>,
    pipeline_layout: wgpu::PipelineLayout,
    buffers: HashMap<(u32, u32), wgpu::Buffer>,
    views: HashMap<(u32, u32), wgpu::TextureView>,
    samplers: HashMap<(u32, u32), wgpu::Sampler>,
    bind_groups: Vec<wgpu::BindGroup>,
    stale_groups: Vec<bool>,
}

impl ProgramBinding {
    /// Compiles, links and reflects `source` and creates its device resources.
    ///
    /// Texture slots start out bound to a 1x1 white texture and a default
    /// sampler so the program can draw before any texture was set.
    pub fn new(ctx: &Context, source: &ProgramSource) -> Result<Self, BindingError> {
        let interface = ProgramInterface::build(source)?;
        let device = &ctx.device;
        let label = interface.label().to_owned();

        let vertex = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&format!("{label} vertex")),
            source: wgpu::ShaderSource::Wgsl(source.vertex.as_str().into()),
        });
        let fragment = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&format!("{label} fragment")),
            source: wgpu::ShaderSource::Wgsl(source.fragment.as_str().into()),
        });

        let layouts: Vec<wgpu::BindGroupLayout> = (0..interface.group_count())
            .map(|group| {
                let entries: Vec<wgpu::BindGroupLayoutEntry> = interface
                    .slots()
                    .iter()
                    .filter(|slot| slot.group == group)
                    .map(layout_entry)
                    .collect();
                device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some(&format!("{label} group {group} layout")),
                    entries: &entries,
                })
            })
            .collect();

        let layout_refs: Vec<Option<&wgpu::BindGroupLayout>> = layouts.iter().map(Some).collect();
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&format!("{label} pipeline layout")),
            bind_group_layouts: &layout_refs,
            immediate_size: 0,
        });

        let mut buffers = HashMap::new();
        let mut views = HashMap::new();
        let mut samplers = HashMap::new();
        for slot in interface.slots() {
            let key = (slot.group, slot.binding);
            match slot.kind {
                SlotKind::Uniform { size } => {
                    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
                        label: Some(&format!("{label} uniforms {key:?}")),
                        size: size as u64,
                        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                        mapped_at_creation: false,
                    });
                    buffers.insert(key, buffer);
                }
                SlotKind::Texture(dim) => {
                    let white = Texture::solid(device, &ctx.queue, [255; 4], dim, "white");
                    views.insert(key, white.view);
                }
                SlotKind::Sampler => {
                    samplers.insert(
                        key,
                        texture::create_sampler(device, &TextureOptions::default()),
                    );
                }
            }
        }

        let group_count = layouts.len();
        let mut binding = Self {
            interface,
            vertex,
            fragment,
            layouts,
            pipeline_layout,
            buffers,
            views,
            samplers,
            bind_groups: Vec::with_capacity(group_count),
            stale_groups: vec![false; group_count],
        };
        binding.bind_groups = (0..group_count as u32)
            .map(|group| binding.create_bind_group(device, group))
            .collect();
        Ok(binding)
    }

    pub fn interface(&self) -> &ProgramInterface {
        &self.interface
    }

    pub fn label(&self) -> &str {
        self.interface.label()
    }

    pub fn uniform(&self, name: &str) -> Option<&UniformDescriptor> {
        self.interface.uniform(name)
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.interface.attribute(name)
    }

    /// See [`ProgramInterface::set_uniform`].
    pub fn set_uniform<T: UniformData>(&mut self, name: &str, value: T) -> Result<(), BindingError> {
        self.interface.set_uniform(name, value)
    }

    /// See [`ProgramInterface::set_uniform_array`].
    pub fn set_uniform_array<T: UniformData>(
        &mut self,
        name: &str,
        values: &[T],
    ) -> Result<(), BindingError> {
        self.interface.set_uniform_array(name, values)
    }

    /// See [`ProgramInterface::uniform_handle`].
    pub fn uniform_handle<T: UniformData>(
        &self,
        name: &str,
    ) -> Result<Option<Uniform<T>>, BindingError> {
        self.interface.uniform_handle(name)
    }

    pub fn set<T: UniformData>(&mut self, handle: Uniform<T>, value: T) {
        self.interface.set(handle, value);
    }

    /// Binds `texture` to the texture uniform `name`.
    ///
    /// When the program also declares a sampler called `<name>_sampler` and the
    /// texture carries a sampler, that sampler is bound alongside.
    pub fn set_texture(&mut self, name: &str, texture: &Texture) -> Result<(), BindingError> {
        let Some(descriptor) = self.interface.uniform(name).copied() else {
            log::debug!("program `{}` has no texture `{name}`", self.label());
            return Ok(());
        };
        let provided = ShaderType::Texture(texture.dimension);
        if descriptor.ty != provided {
            return Err(BindingError::TypeMismatch {
                name: name.to_owned(),
                declared: descriptor.ty,
                provided,
            });
        }
        let loc = descriptor.location;
        self.views.insert((loc.group, loc.binding), texture.view.clone());
        self.stale_groups[loc.group as usize] = true;

        let sampler_name = format!("{name}_sampler");
        if let (Some(sampler), Some(slot)) = (
            texture.sampler.as_ref(),
            self.interface.uniform(&sampler_name).copied(),
        ) {
            if slot.ty == ShaderType::Sampler {
                let sl = slot.location;
                self.samplers.insert((sl.group, sl.binding), sampler.clone());
                self.stale_groups[sl.group as usize] = true;
            } else {
                log::warn!(
                    "`{sampler_name}` in program `{}` is {}, not a sampler",
                    self.label(),
                    slot.ty
                );
            }
        }
        Ok(())
    }

    /// Uploads staged uniforms and rebuilds bind groups whose textures changed.
    pub fn flush(&mut self, ctx: &Context) {
        for block in self.interface.blocks_mut() {
            if !block.dirty {
                continue;
            }
            if let Some(buffer) = self.buffers.get(&(block.group, block.binding)) {
                ctx.queue.write_buffer(buffer, 0, &block.data);
            }
            block.dirty = false;
        }
        for group in 0..self.stale_groups.len() {
            if self.stale_groups[group] {
                self.bind_groups[group] = self.create_bind_group(&ctx.device, group as u32);
                self.stale_groups[group] = false;
            }
        }
    }

    /// Sets every bind group of the program on `pass`.
    pub fn bind(&self, pass: &mut wgpu::RenderPass<'_>) {
        for (group, bind_group) in self.bind_groups.iter().enumerate() {
            pass.set_bind_group(group as u32, bind_group, &[]);
        }
    }

    /// Builds a pipeline for this program with the given vertex layouts.
    pub fn create_pipeline(
        &self,
        ctx: &Context,
        vertex_layouts: &[wgpu::VertexBufferLayout],
        options: &PipelineOptions,
    ) -> wgpu::RenderPipeline {
        pipelines::mk_render_pipeline(
            &ctx.device,
            self.label(),
            &self.pipeline_layout,
            ctx.format,
            options,
            vertex_layouts,
            Stages {
                vertex: &self.vertex,
                vertex_entry: self.interface.vertex_entry(),
                fragment: &self.fragment,
                fragment_entry: self.interface.fragment_entry(),
            },
        )
    }

    /// A private copy of the bind group that holds `handle`'s uniform.
    ///
    /// The group may only contain uniform buffers. The copy starts out with the
    /// program's currently staged values and keeps following them through
    /// [`ObjectBlock::follow`] for every byte the object does not set itself.
    pub fn object_block<T: UniformData>(
        &self,
        ctx: &Context,
        handle: Uniform<T>,
    ) -> Result<ObjectBlock, BindingError> {
        let group = handle.group;
        let slots: Vec<&ResourceSlot> = self
            .interface
            .slots()
            .iter()
            .filter(|s| s.group == group)
            .collect();
        if slots
            .iter()
            .any(|s| !matches!(s.kind, SlotKind::Uniform { .. }))
        {
            return Err(BindingError::SharedGroup {
                program: self.label().to_owned(),
                group,
            });
        }
        let blocks: Vec<UniformBlock> = self
            .interface
            .blocks()
            .iter()
            .filter(|b| b.group == group)
            .cloned()
            .collect();
        let buffers: Vec<wgpu::Buffer> = blocks
            .iter()
            .map(|block| {
                ctx.device
                    .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some(&format!("{} object uniforms", self.label())),
                        contents: &block.data,
                        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    })
            })
            .collect();
        let entries: Vec<wgpu::BindGroupEntry> = blocks
            .iter()
            .zip(&buffers)
            .map(|(block, buffer)| wgpu::BindGroupEntry {
                binding: block.binding,
                resource: buffer.as_entire_binding(),
            })
            .collect();
        let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{} object group {group}", self.label())),
            layout: &self.layouts[group as usize],
            entries: &entries,
        });
        Ok(ObjectBlock::new(group, blocks, buffers, bind_group))
    }

    fn create_bind_group(&self, device: &wgpu::Device, group: u32) -> wgpu::BindGroup {
        let entries: Vec<wgpu::BindGroupEntry> = self
            .interface
            .slots()
            .iter()
            .filter(|slot| slot.group == group)
            .filter_map(|slot| {
                let key = (slot.group, slot.binding);
                let resource = match slot.kind {
                    SlotKind::Uniform { .. } => self.buffers.get(&key)?.as_entire_binding(),
                    SlotKind::Texture(_) => {
                        wgpu::BindingResource::TextureView(self.views.get(&key)?)
                    }
                    SlotKind::Sampler => wgpu::BindingResource::Sampler(self.samplers.get(&key)?),
                };
                Some(wgpu::BindGroupEntry {
                    binding: slot.binding,
                    resource,
                })
            })
            .collect();
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{} group {group}", self.label())),
            layout: &self.layouts[group as usize],
            entries: &entries,
        })
    }
}

fn layout_entry(slot: &ResourceSlot) -> wgpu::BindGroupLayoutEntry {
    let ty = match slot.kind {
        SlotKind::Uniform { .. } => wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        SlotKind::Texture(dim) => wgpu::BindingType::Texture {
            multisampled: false,
            view_dimension: dim.view_dimension(),
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
        },
        SlotKind::Sampler => wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
    };
    wgpu::BindGroupLayoutEntry {
        binding: slot.binding,
        visibility: slot.visibility,
        ty,
        count: None,
    }
}
