//! Compiles WGSL stages with naga and walks them for their interface.
//!
//! Only resources the entry point actually touches are reflected. Members of a
//! `var<uniform>` struct are exposed one by one under their member name; a
//! uniform that is not a struct is exposed under the variable name.

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
};

use naga::{
    AddressSpace, ArraySize, Binding, ImageClass, ImageDimension, Module, Scalar, ScalarKind,
    ShaderStage, TypeInner, VectorSize,
    valid::{Capabilities, ModuleInfo, ValidationFlags, Validator},
};

use super::error::{BindingError, Stage};

/// Type tag of a reflected uniform or attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderType {
    Float,
    Int,
    UInt,
    Vec2,
    Vec3,
    Vec4,
    Mat4,
    Texture(TextureDim),
    Sampler,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureDim {
    D2,
    D2Array,
}

impl TextureDim {
    pub fn view_dimension(self) -> wgpu::TextureViewDimension {
        match self {
            TextureDim::D2 => wgpu::TextureViewDimension::D2,
            TextureDim::D2Array => wgpu::TextureViewDimension::D2Array,
        }
    }
}

impl ShaderType {
    /// Number of `f32`/`i32`/`u32` components, `0` for opaque handles.
    pub fn components(self) -> u32 {
        match self {
            ShaderType::Float | ShaderType::Int | ShaderType::UInt => 1,
            ShaderType::Vec2 => 2,
            ShaderType::Vec3 => 3,
            ShaderType::Vec4 => 4,
            ShaderType::Mat4 => 16,
            ShaderType::Texture(_) | ShaderType::Sampler => 0,
        }
    }

    /// Vertex format for attribute inputs. `None` for types that cannot be one.
    pub fn vertex_format(self) -> Option<wgpu::VertexFormat> {
        Some(match self {
            ShaderType::Float => wgpu::VertexFormat::Float32,
            ShaderType::Vec2 => wgpu::VertexFormat::Float32x2,
            ShaderType::Vec3 => wgpu::VertexFormat::Float32x3,
            ShaderType::Vec4 => wgpu::VertexFormat::Float32x4,
            ShaderType::Int => wgpu::VertexFormat::Sint32,
            ShaderType::UInt => wgpu::VertexFormat::Uint32,
            _ => return None,
        })
    }

    fn from_inner(inner: &TypeInner) -> Option<Self> {
        Some(match *inner {
            TypeInner::Scalar(s) if s == Scalar::F32 => ShaderType::Float,
            TypeInner::Scalar(s) if s == Scalar::I32 => ShaderType::Int,
            TypeInner::Scalar(s) if s == Scalar::U32 => ShaderType::UInt,
            TypeInner::Vector { size, scalar } if scalar == Scalar::F32 => match size {
                VectorSize::Bi => ShaderType::Vec2,
                VectorSize::Tri => ShaderType::Vec3,
                VectorSize::Quad => ShaderType::Vec4,
            },
            TypeInner::Matrix {
                columns: VectorSize::Quad,
                rows: VectorSize::Quad,
                scalar,
            } if scalar == Scalar::F32 => ShaderType::Mat4,
            TypeInner::Image {
                dim: ImageDimension::D2,
                arrayed,
                class:
                    ImageClass::Sampled {
                        kind: ScalarKind::Float,
                        multi: false,
                    },
            } => ShaderType::Texture(if arrayed {
                TextureDim::D2Array
            } else {
                TextureDim::D2
            }),
            TypeInner::Sampler { comparison: false } => ShaderType::Sampler,
            _ => return None,
        })
    }
}

impl fmt::Display for ShaderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShaderType::Float => "f32",
            ShaderType::Int => "i32",
            ShaderType::UInt => "u32",
            ShaderType::Vec2 => "vec2<f32>",
            ShaderType::Vec3 => "vec3<f32>",
            ShaderType::Vec4 => "vec4<f32>",
            ShaderType::Mat4 => "mat4x4<f32>",
            ShaderType::Texture(TextureDim::D2) => "texture_2d<f32>",
            ShaderType::Texture(TextureDim::D2Array) => "texture_2d_array<f32>",
            ShaderType::Sampler => "sampler",
        };
        f.write_str(name)
    }
}

/// Where a uniform lives: bind group, binding and byte offset inside the block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation {
    pub group: u32,
    pub binding: u32,
    pub offset: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformDescriptor {
    pub location: UniformLocation,
    pub ty: ShaderType,
    /// Array length, `1` for plain values.
    pub size: u32,
    /// Byte distance between array elements.
    pub stride: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeDescriptor {
    /// The `@location` index.
    pub location: u32,
    pub ty: ShaderType,
    pub size: u32,
}

/// What sits behind a `(group, binding)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    Uniform { size: u32 },
    Texture(TextureDim),
    Sampler,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSlot {
    pub group: u32,
    pub binding: u32,
    pub kind: SlotKind,
    pub visibility: wgpu::ShaderStages,
}

/// Interface of one compiled stage.
#[derive(Debug, Default)]
pub(crate) struct StageReflection {
    pub entry_point: String,
    pub uniforms: HashMap<String, UniformDescriptor>,
    pub slots: BTreeMap<(u32, u32), SlotKind>,
    /// Vertex inputs for the vertex stage, fragment inputs for the fragment stage.
    pub inputs: HashMap<String, AttributeDescriptor>,
    /// Location-bound outputs, only filled for the vertex stage.
    pub outputs: BTreeMap<u32, TypeInner>,
    /// Location-bound inputs by location, only filled for the fragment stage.
    pub varyings: BTreeMap<u32, TypeInner>,
}

/// Parses and validates one WGSL stage.
pub(crate) fn compile_stage(
    program: &str,
    stage: Stage,
    source: &str,
) -> Result<(Module, ModuleInfo), BindingError> {
    let compile_err = |log: String| BindingError::Compile {
        program: program.to_owned(),
        stage,
        log,
    };
    let module = naga::front::wgsl::parse_str(source)
        .map_err(|e| compile_err(e.emit_to_string(source)))?;
    let info = Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(&module)
        .map_err(|e| compile_err(e.emit_to_string(source)))?;
    Ok((module, info))
}

/// Walks the first entry point of `stage` in a compiled module.
pub(crate) fn reflect_stage(
    program: &str,
    stage: Stage,
    module: &Module,
    info: &ModuleInfo,
) -> Result<StageReflection, BindingError> {
    let wanted = match stage {
        Stage::Vertex => ShaderStage::Vertex,
        Stage::Fragment => ShaderStage::Fragment,
    };
    let (index, entry) = module
        .entry_points
        .iter()
        .enumerate()
        .find(|(_, ep)| ep.stage == wanted)
        .ok_or_else(|| BindingError::Link {
            program: program.to_owned(),
            reason: format!("{stage} shader has no @{stage} entry point"),
        })?;
    let usage = info.get_entry_point(index);

    let unsupported = |name: &str, detail: String| BindingError::Unsupported {
        program: program.to_owned(),
        name: name.to_owned(),
        detail,
    };

    let mut out = StageReflection {
        entry_point: entry.name.clone(),
        ..Default::default()
    };

    for (handle, var) in module.global_variables.iter() {
        if usage[handle].is_empty() {
            continue;
        }
        let name = var.name.clone().unwrap_or_default();
        let Some(rb) = var.binding.as_ref() else {
            continue;
        };
        let inner = &module.types[var.ty].inner;
        match var.space {
            AddressSpace::Uniform => {
                let size = inner.size(module.to_ctx());
                out.slots
                    .insert((rb.group, rb.binding), SlotKind::Uniform { size });
                let fields: Vec<(String, naga::Handle<naga::Type>, u32)> = match inner {
                    TypeInner::Struct { members, .. } => members
                        .iter()
                        .map(|m| (m.name.clone().unwrap_or_default(), m.ty, m.offset))
                        .collect(),
                    _ => vec![(name.clone(), var.ty, 0)],
                };
                for (field, ty, offset) in fields {
                    let (ty, size, stride) = value_layout(module, ty)
                        .ok_or_else(|| unsupported(&field, type_label(module, ty)))?;
                    let descriptor = UniformDescriptor {
                        location: UniformLocation {
                            group: rb.group,
                            binding: rb.binding,
                            offset,
                        },
                        ty,
                        size,
                        stride,
                    };
                    if out.uniforms.insert(field.clone(), descriptor).is_some() {
                        return Err(BindingError::Link {
                            program: program.to_owned(),
                            reason: format!("uniform name `{field}` is declared twice"),
                        });
                    }
                }
            }
            AddressSpace::Handle => {
                let ty = ShaderType::from_inner(inner)
                    .ok_or_else(|| unsupported(&name, type_label(module, var.ty)))?;
                let kind = match ty {
                    ShaderType::Texture(dim) => SlotKind::Texture(dim),
                    _ => SlotKind::Sampler,
                };
                out.slots.insert((rb.group, rb.binding), kind);
                let descriptor = UniformDescriptor {
                    location: UniformLocation {
                        group: rb.group,
                        binding: rb.binding,
                        offset: 0,
                    },
                    ty,
                    size: 1,
                    stride: 0,
                };
                if out.uniforms.insert(name.clone(), descriptor).is_some() {
                    return Err(BindingError::Link {
                        program: program.to_owned(),
                        reason: format!("uniform name `{name}` is declared twice"),
                    });
                }
            }
            AddressSpace::Storage { .. } => {
                return Err(unsupported(&name, "storage buffers are not bindable".into()));
            }
            _ => {}
        }
    }

    for arg in &entry.function.arguments {
        let arg_name = arg.name.clone().unwrap_or_default();
        match (&arg.binding, &module.types[arg.ty].inner) {
            (Some(binding), _) => {
                record_input(program, stage, module, &mut out, &arg_name, binding, arg.ty)?
            }
            (None, TypeInner::Struct { members, .. }) => {
                for m in members {
                    if let Some(binding) = &m.binding {
                        let member = m.name.clone().unwrap_or_default();
                        record_input(program, stage, module, &mut out, &member, binding, m.ty)?;
                    }
                }
            }
            _ => {}
        }
    }

    if stage == Stage::Vertex {
        if let Some(result) = &entry.function.result {
            match (&result.binding, &module.types[result.ty].inner) {
                (Some(Binding::Location { location, .. }), inner) => {
                    out.outputs.insert(*location, inner.clone());
                }
                (None, TypeInner::Struct { members, .. }) => {
                    for m in members {
                        if let Some(Binding::Location { location, .. }) = &m.binding {
                            out.outputs
                                .insert(*location, module.types[m.ty].inner.clone());
                        }
                    }
                }
                _ => {}
            }
        }
    }

    Ok(out)
}

fn record_input(
    program: &str,
    stage: Stage,
    module: &Module,
    out: &mut StageReflection,
    name: &str,
    binding: &Binding,
    ty: naga::Handle<naga::Type>,
) -> Result<(), BindingError> {
    let Binding::Location { location, .. } = binding else {
        return Ok(());
    };
    let inner = &module.types[ty].inner;
    match stage {
        Stage::Vertex => {
            let ty = ShaderType::from_inner(inner)
                .filter(|t| t.vertex_format().is_some())
                .ok_or_else(|| BindingError::Unsupported {
                    program: program.to_owned(),
                    name: name.to_owned(),
                    detail: type_label(module, ty),
                })?;
            out.inputs.insert(
                name.to_owned(),
                AttributeDescriptor {
                    location: *location,
                    ty,
                    size: 1,
                },
            );
        }
        Stage::Fragment => {
            out.varyings.insert(*location, inner.clone());
        }
    }
    Ok(())
}

fn value_layout(module: &Module, ty: naga::Handle<naga::Type>) -> Option<(ShaderType, u32, u32)> {
    let inner = &module.types[ty].inner;
    match *inner {
        TypeInner::Array {
            base,
            size: ArraySize::Constant(len),
            stride,
        } => {
            let element = ShaderType::from_inner(&module.types[base].inner)?;
            Some((element, len.get(), stride))
        }
        _ => {
            let ty = ShaderType::from_inner(inner)?;
            Some((ty, 1, inner.size(module.to_ctx())))
        }
    }
}

fn type_label(module: &Module, ty: naga::Handle<naga::Type>) -> String {
    let t = &module.types[ty];
    t.name.clone().unwrap_or_else(|| format!("{:?}", t.inner))
}

pub(crate) type LinkedInterface = (HashMap<String, UniformDescriptor>, Vec<ResourceSlot>);

/// Checks that the two stages fit together and merges their resources.
pub(crate) fn link(
    program: &str,
    vertex: &StageReflection,
    fragment: &StageReflection,
) -> Result<LinkedInterface, BindingError> {
    let link_err = |reason: String| BindingError::Link {
        program: program.to_owned(),
        reason,
    };

    for (location, input) in &fragment.varyings {
        match vertex.outputs.get(location) {
            None => {
                return Err(link_err(format!(
                    "fragment input @location({location}) is not written by the vertex stage"
                )));
            }
            Some(output) if output != input => {
                return Err(link_err(format!(
                    "@location({location}) has type {output:?} in the vertex stage but {input:?} in the fragment stage"
                )));
            }
            Some(_) => {}
        }
    }

    let mut slots: BTreeMap<(u32, u32), ResourceSlot> = BTreeMap::new();
    for (stage_bits, reflection) in [
        (wgpu::ShaderStages::VERTEX, vertex),
        (wgpu::ShaderStages::FRAGMENT, fragment),
    ] {
        for (&(group, binding), &kind) in &reflection.slots {
            let slot = slots.entry((group, binding)).or_insert(ResourceSlot {
                group,
                binding,
                kind,
                visibility: wgpu::ShaderStages::NONE,
            });
            if slot.kind != kind {
                return Err(link_err(format!(
                    "@group({group}) @binding({binding}) is {:?} in one stage and {kind:?} in the other",
                    slot.kind
                )));
            }
            slot.visibility |= stage_bits;
        }
    }

    let mut uniforms = vertex.uniforms.clone();
    for (name, descriptor) in &fragment.uniforms {
        match uniforms.get(name) {
            Some(existing) if existing != descriptor => {
                return Err(link_err(format!(
                    "uniform `{name}` is declared differently in the two stages"
                )));
            }
            Some(_) => {}
            None => {
                uniforms.insert(name.clone(), *descriptor);
            }
        }
    }

    Ok((uniforms, slots.into_values().collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERTEX: &str = r#"
struct Camera {
    view_transform: mat4x4<f32>,
    projection: mat4x4<f32>,
}
@group(0) @binding(0) var<uniform> camera: Camera;
@group(0) @binding(1) var<uniform> unused: vec4<f32>;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) uv: vec2<f32>,
}
struct VertexOutput {
    @builtin(position) clip: vec4<f32>,
    @location(0) uv: vec2<f32>,
}
@vertex
fn vs_main(in: VertexInput, @location(2) shade: f32) -> VertexOutput {
    var out: VertexOutput;
    out.clip = camera.projection * camera.view_transform * vec4<f32>(in.position * shade, 1.0);
    out.uv = in.uv;
    return out;
}
"#;

    const FRAGMENT: &str = r#"
@group(1) @binding(0) var tint: texture_2d<f32>;
@group(1) @binding(1) var tint_sampler: sampler;

@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    return textureSample(tint, tint_sampler, uv);
}
"#;

    fn reflect(stage: Stage, src: &str) -> Result<StageReflection, BindingError> {
        let (module, info) = compile_stage("test", stage, src)?;
        reflect_stage("test", stage, &module, &info)
    }

    #[test]
    fn struct_members_become_named_uniforms() {
        let vs = reflect(Stage::Vertex, VERTEX).unwrap();
        let view = vs.uniforms["view_transform"];
        let proj = vs.uniforms["projection"];
        assert_eq!(view.ty, ShaderType::Mat4);
        assert_eq!(view.location.offset, 0);
        assert_eq!(proj.location.offset, 64);
        assert_eq!(vs.slots[&(0, 0)], SlotKind::Uniform { size: 128 });
    }

    #[test]
    fn unused_globals_are_not_reflected() {
        let vs = reflect(Stage::Vertex, VERTEX).unwrap();
        assert!(!vs.uniforms.contains_key("unused"));
        assert!(!vs.slots.contains_key(&(0, 1)));
    }

    #[test]
    fn attributes_come_from_arguments_and_struct_members() {
        let vs = reflect(Stage::Vertex, VERTEX).unwrap();
        assert_eq!(vs.inputs["position"].ty, ShaderType::Vec3);
        assert_eq!(vs.inputs["uv"].location, 1);
        assert_eq!(vs.inputs["shade"].ty, ShaderType::Float);
        assert_eq!(vs.inputs.len(), 3);
    }

    #[test]
    fn linking_merges_slots_across_stages() {
        let vs = reflect(Stage::Vertex, VERTEX).unwrap();
        let fs = reflect(Stage::Fragment, FRAGMENT).unwrap();
        let (uniforms, slots) = link("test", &vs, &fs).unwrap();
        assert_eq!(uniforms["tint"].ty, ShaderType::Texture(TextureDim::D2));
        assert_eq!(uniforms["tint_sampler"].ty, ShaderType::Sampler);
        assert_eq!(slots.len(), 3);
        assert_eq!(slots[0].visibility, wgpu::ShaderStages::VERTEX);
        assert_eq!(slots[1].visibility, wgpu::ShaderStages::FRAGMENT);
    }

    #[test]
    fn compile_error_carries_compiler_output() {
        let err = reflect(Stage::Vertex, "fn vs_main( {").unwrap_err();
        match err {
            BindingError::Compile { stage, log, .. } => {
                assert_eq!(stage, Stage::Vertex);
                assert!(!log.is_empty());
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn missing_entry_point_fails_to_link() {
        let err = reflect(Stage::Fragment, VERTEX).unwrap_err();
        assert!(matches!(err, BindingError::Link { .. }));
    }

    #[test]
    fn unmatched_fragment_input_fails_to_link() {
        let fragment = r#"
@fragment
fn fs_main(@location(3) extra: vec4<f32>) -> @location(0) vec4<f32> {
    return extra;
}
"#;
        let vs = reflect(Stage::Vertex, VERTEX).unwrap();
        let fs = reflect(Stage::Fragment, fragment).unwrap();
        assert!(matches!(link("test", &vs, &fs), Err(BindingError::Link { .. })));
    }

    #[test]
    fn mismatched_varying_type_fails_to_link() {
        let fragment = r#"
@fragment
fn fs_main(@location(0) uv: vec3<f32>) -> @location(0) vec4<f32> {
    return vec4<f32>(uv, 1.0);
}
"#;
        let vs = reflect(Stage::Vertex, VERTEX).unwrap();
        let fs = reflect(Stage::Fragment, fragment).unwrap();
        assert!(matches!(link("test", &vs, &fs), Err(BindingError::Link { .. })));
    }

    #[test]
    fn texture_named_like_a_uniform_member_fails_to_link() {
        let src = r#"
struct Material {
    tint: vec4<f32>,
}
@group(0) @binding(0) var<uniform> material: Material;
@group(0) @binding(1) var tint: texture_2d<f32>;
@group(0) @binding(2) var tint_sampler: sampler;

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return material.tint * textureSample(tint, tint_sampler, vec2<f32>(0.5));
}
"#;
        match reflect(Stage::Fragment, src) {
            Err(BindingError::Link { reason, .. }) => assert!(reason.contains("`tint`")),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn storage_buffers_are_rejected() {
        let src = r#"
@group(0) @binding(0) var<storage, read> data: array<f32>;
@vertex
fn vs_main(@builtin(vertex_index) i: u32) -> @builtin(position) vec4<f32> {
    return vec4<f32>(data[i], 0.0, 0.0, 1.0);
}
"#;
        assert!(matches!(
            reflect(Stage::Vertex, src),
            Err(BindingError::Unsupported { .. })
        ));
    }
}
