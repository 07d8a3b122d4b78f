use std::collections::HashMap;

use crate::math::Matrix4;

use super::{
    PROJECTION, VIEW_TRANSFORM,
    error::{BindingError, Stage},
    reflect::{self, AttributeDescriptor, ResourceSlot, SlotKind, UniformDescriptor},
    uniform::{Uniform, UniformBlock, UniformData},
};

/// WGSL sources of a two stage program.
#[derive(Debug, Clone)]
pub struct ProgramSource {
    pub label: String,
    pub vertex: String,
    pub fragment: String,
}

impl ProgramSource {
    pub fn new(label: impl Into<String>, vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            vertex: vertex.into(),
            fragment: fragment.into(),
        }
    }
}

/// How a program takes part in the per-frame camera update.
#[derive(Debug, Clone, Copy)]
pub enum CameraUse {
    /// Both matrices are declared as `mat4x4<f32>`.
    Follows {
        view: Uniform<Matrix4>,
        projection: Uniform<Matrix4>,
    },
    /// Neither matrix is declared.
    Independent,
    /// Only one usable matrix, or one of the wrong type. Nothing is pushed.
    Skipped,
}

/// The reflected, linked interface of a program plus its staged uniform values.
///
/// This is everything a [`ProgramBinding`](super::ProgramBinding) knows
/// without a device. Uniform writes are staged here and uploaded on flush.
#[derive(Debug)]
pub struct ProgramInterface {
    label: String,
    vertex_entry: String,
    fragment_entry: String,
    uniforms: HashMap<String, UniformDescriptor>,
    attributes: HashMap<String, AttributeDescriptor>,
    slots: Vec<ResourceSlot>,
    blocks: Vec<UniformBlock>,
}

impl ProgramInterface {
    /// Compiles both stages, links them and reflects the active interface.
    pub fn build(source: &ProgramSource) -> Result<Self, BindingError> {
        let label = source.label.as_str();
        let (vs_module, vs_info) = reflect::compile_stage(label, Stage::Vertex, &source.vertex)?;
        let (fs_module, fs_info) =
            reflect::compile_stage(label, Stage::Fragment, &source.fragment)?;
        let vertex = reflect::reflect_stage(label, Stage::Vertex, &vs_module, &vs_info)?;
        let fragment = reflect::reflect_stage(label, Stage::Fragment, &fs_module, &fs_info)?;
        let (uniforms, slots) = reflect::link(label, &vertex, &fragment)?;

        let blocks = slots
            .iter()
            .filter_map(|slot| match slot.kind {
                SlotKind::Uniform { size } => {
                    Some(UniformBlock::new(slot.group, slot.binding, size as usize))
                }
                _ => None,
            })
            .collect();

        log::debug!(
            "program `{label}`: {} uniforms, {} attributes, {} bindings",
            uniforms.len(),
            vertex.inputs.len(),
            slots.len()
        );

        Ok(Self {
            label: source.label.clone(),
            vertex_entry: vertex.entry_point,
            fragment_entry: fragment.entry_point,
            uniforms,
            attributes: vertex.inputs,
            slots,
            blocks,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn vertex_entry(&self) -> &str {
        &self.vertex_entry
    }

    pub fn fragment_entry(&self) -> &str {
        &self.fragment_entry
    }

    pub fn uniform(&self, name: &str) -> Option<&UniformDescriptor> {
        self.uniforms.get(name)
    }

    pub fn uniforms(&self) -> impl Iterator<Item = (&str, &UniformDescriptor)> {
        self.uniforms.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes.get(name)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &AttributeDescriptor)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Every bound resource, ordered by group then binding.
    pub fn slots(&self) -> &[ResourceSlot] {
        &self.slots
    }

    /// Highest bind group index in use plus one.
    pub fn group_count(&self) -> u32 {
        self.slots.iter().map(|s| s.group + 1).max().unwrap_or(0)
    }

    pub fn blocks(&self) -> &[UniformBlock] {
        &self.blocks
    }

    pub(crate) fn blocks_mut(&mut self) -> &mut [UniformBlock] {
        &mut self.blocks
    }

    fn block_index(&self, group: u32, binding: u32) -> Option<usize> {
        self.blocks
            .iter()
            .position(|b| b.group == group && b.binding == binding)
    }

    /// Looks `name` up once and checks it against `T`.
    ///
    /// `Ok(None)` when the program has no active uniform of that name.
    pub fn uniform_handle<T: UniformData>(
        &self,
        name: &str,
    ) -> Result<Option<Uniform<T>>, BindingError> {
        let Some(descriptor) = self.uniforms.get(name) else {
            return Ok(None);
        };
        check_type::<T>(name, descriptor)?;
        let loc = descriptor.location;
        let Some(block) = self.block_index(loc.group, loc.binding) else {
            return Ok(None);
        };
        Ok(Some(Uniform::new(
            loc.group,
            loc.binding,
            block,
            loc.offset as usize,
        )))
    }

    /// Stages `value` for the uniform called `name`.
    ///
    /// A name the program does not use is ignored. A value of the wrong type
    /// is rejected with [`BindingError::TypeMismatch`].
    pub fn set_uniform<T: UniformData>(&mut self, name: &str, value: T) -> Result<(), BindingError> {
        match self.uniform_handle::<T>(name)? {
            Some(handle) => self.set(handle, value),
            None => log::debug!("program `{}` has no uniform `{name}`", self.label),
        }
        Ok(())
    }

    /// Stages consecutive elements of an array uniform, starting at element 0.
    /// Values past the declared length are dropped.
    pub fn set_uniform_array<T: UniformData>(
        &mut self,
        name: &str,
        values: &[T],
    ) -> Result<(), BindingError> {
        let Some(descriptor) = self.uniforms.get(name).copied() else {
            log::debug!("program `{}` has no uniform `{name}`", self.label);
            return Ok(());
        };
        check_type::<T>(name, &descriptor)?;
        if values.len() > descriptor.size as usize {
            log::warn!(
                "uniform `{name}` holds {} elements, {} given",
                descriptor.size,
                values.len()
            );
        }
        let loc = descriptor.location;
        if let Some(index) = self.block_index(loc.group, loc.binding) {
            let block = &mut self.blocks[index];
            for (i, value) in values.iter().take(descriptor.size as usize).enumerate() {
                block.write(
                    loc.offset as usize + i * descriptor.stride as usize,
                    value,
                );
            }
        }
        Ok(())
    }

    /// Stages a value through a handle obtained from this program.
    pub fn set<T: UniformData>(&mut self, handle: Uniform<T>, value: T) {
        self.blocks[handle.block].write(handle.offset, &value);
    }

    /// Classifies the camera matrices this program declares, warning about
    /// a half-present pair or a matrix of the wrong type.
    pub fn camera_use(&self) -> CameraUse {
        let declared = |name: &str| self.uniforms.contains_key(name);
        match (self.camera_handle(VIEW_TRANSFORM), self.camera_handle(PROJECTION)) {
            (Some(view), Some(projection)) => CameraUse::Follows { view, projection },
            _ if !declared(VIEW_TRANSFORM) && !declared(PROJECTION) => CameraUse::Independent,
            _ => {
                log::warn!(
                    "program `{}` lacks a usable `{VIEW_TRANSFORM}`/`{PROJECTION}` pair, \
                     camera updates are skipped for it",
                    self.label
                );
                CameraUse::Skipped
            }
        }
    }

    fn camera_handle(&self, name: &str) -> Option<Uniform<Matrix4>> {
        match self.uniform_handle::<Matrix4>(name) {
            Ok(handle) => handle,
            Err(BindingError::TypeMismatch { declared, .. }) => {
                log::warn!(
                    "`{name}` in program `{}` is {declared}, expected a mat4",
                    self.label
                );
                None
            }
            Err(e) => {
                log::warn!("{e}");
                None
            }
        }
    }
}

pub(crate) fn check_type<T: UniformData>(
    name: &str,
    descriptor: &UniformDescriptor,
) -> Result<(), BindingError> {
    if descriptor.ty != T::TYPE {
        return Err(BindingError::TypeMismatch {
            name: name.to_owned(),
            declared: descriptor.ty,
            provided: T::TYPE,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{Matrix4, Vector4};
    use crate::program::ShaderType;

    const VERTEX: &str = r#"
struct Camera {
    view_transform: mat4x4<f32>,
    projection: mat4x4<f32>,
}
@group(0) @binding(0) var<uniform> camera: Camera;

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return camera.projection * camera.view_transform * vec4<f32>(position, 1.0);
}
"#;

    const FRAGMENT: &str = r#"
struct Material {
    color: vec4<f32>,
    weights: array<vec4<f32>, 3>,
}
@group(1) @binding(0) var<uniform> material: Material;

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return material.color * material.weights[1].x;
}
"#;

    const SINGLE_STRUCT: &str = r#"
struct Uniforms {
    view_transform: mat4x4<f32>,
    projection: mat4x4<f32>,
    model_transform: mat4x4<f32>,
}
@group(0) @binding(0) var<uniform> uniforms: Uniforms;

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return uniforms.projection * uniforms.view_transform * uniforms.model_transform
        * vec4<f32>(position, 1.0);
}
"#;

    const PLAIN_FRAGMENT: &str = r#"
@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(1.0);
}
"#;

    fn plain_vertex(uniforms: &str, clip: &str) -> String {
        format!(
            "{uniforms}\n@vertex\nfn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {{\n    return {clip};\n}}\n"
        )
    }

    fn camera_use_of(vertex: &str) -> CameraUse {
        ProgramInterface::build(&ProgramSource::new("camera", vertex, PLAIN_FRAGMENT))
            .unwrap()
            .camera_use()
    }

    fn interface() -> ProgramInterface {
        ProgramInterface::build(&ProgramSource::new("test", VERTEX, FRAGMENT)).unwrap()
    }

    #[test]
    fn vec4_uniform_rejects_matrix_and_accepts_vector() {
        let mut program = interface();
        let err = program
            .set_uniform("color", Matrix4::identity())
            .unwrap_err();
        assert!(matches!(
            err,
            BindingError::TypeMismatch {
                declared: ShaderType::Vec4,
                provided: ShaderType::Mat4,
                ..
            }
        ));
        program
            .set_uniform("color", Vector4::new(1.0, 0.5, 0.25, 1.0))
            .unwrap();
        let block = &program.blocks()[program.block_index(1, 0).unwrap()];
        let floats: Vec<f32> = bytemuck::pod_collect_to_vec(&block.bytes()[..16]);
        assert_eq!(floats, vec![1.0, 0.5, 0.25, 1.0]);
    }

    #[test]
    fn unknown_uniform_is_a_no_op() {
        let mut program = interface();
        for block in program.blocks_mut() {
            block.dirty = false;
        }
        program.set_uniform("model_transform", Matrix4::identity()).unwrap();
        assert!(program.blocks().iter().all(|b| !b.is_dirty()));
    }

    #[test]
    fn handles_are_typed_once() {
        let program = interface();
        assert!(program.uniform_handle::<Matrix4>("view_transform").unwrap().is_some());
        assert!(program.uniform_handle::<Matrix4>("missing").unwrap().is_none());
        assert!(program.uniform_handle::<f32>("projection").is_err());
    }

    #[test]
    fn handle_writes_at_member_offset() {
        let mut program = interface();
        let projection = program
            .uniform_handle::<Matrix4>("projection")
            .unwrap()
            .unwrap();
        program.set(projection, Matrix4::scale(2.0));
        let floats: Vec<f32> = bytemuck::pod_collect_to_vec(program.blocks()[0].bytes());
        assert_eq!(floats[0], 0.0);
        assert_eq!(floats[16], 2.0);
    }

    #[test]
    fn array_uniforms_use_stride() {
        let mut program = interface();
        let weights = program.uniform("weights").copied().unwrap();
        assert_eq!(weights.size, 3);
        assert_eq!(weights.stride, 16);
        program
            .set_uniform_array("weights", &[Vector4::all(1.0), Vector4::all(2.0)])
            .unwrap();
        let block = &program.blocks()[program.block_index(1, 0).unwrap()];
        let floats: Vec<f32> = bytemuck::pod_collect_to_vec(block.bytes());
        assert_eq!(floats[4], 1.0);
        assert_eq!(floats[8], 2.0);
        assert_eq!(floats[12], 0.0);
    }

    #[test]
    fn group_count_covers_both_stages() {
        let program = interface();
        assert_eq!(program.group_count(), 2);
        assert_eq!(program.attribute("position").unwrap().ty, ShaderType::Vec3);
        assert_eq!(program.vertex_entry(), "vs_main");
    }

    #[test]
    fn object_copy_of_one_struct_follows_camera_members() {
        let mut program =
            ProgramInterface::build(&ProgramSource::new("single", SINGLE_STRUCT, PLAIN_FRAGMENT))
                .unwrap();
        let view = program.uniform_handle::<Matrix4>("view_transform").unwrap().unwrap();
        let model = program.uniform_handle::<Matrix4>("model_transform").unwrap().unwrap();
        assert_eq!(view.group(), model.group());
        assert_eq!(view.block, model.block);

        // an object block starts from a clone of the shared block
        let mut copy = program.blocks()[model.block].clone();
        copy.write(model.offset, &Matrix4::translation(1.0, 2.0, 3.0));

        program.set(view, Matrix4::scale(2.0));
        copy.follow(&program.blocks()[view.block], &[model.byte_range()]);

        let floats: Vec<f32> = bytemuck::pod_collect_to_vec(copy.bytes());
        assert_eq!(floats[0], 2.0);
        assert_eq!(&floats[44..47], &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn camera_pair_of_mat4s_follows_the_camera() {
        assert!(matches!(camera_use_of(VERTEX), CameraUse::Follows { .. }));
        assert!(matches!(camera_use_of(SINGLE_STRUCT), CameraUse::Follows { .. }));
    }

    #[test]
    fn program_without_camera_uniforms_is_independent() {
        let vertex = plain_vertex("", "vec4<f32>(position, 1.0)");
        assert!(matches!(camera_use_of(&vertex), CameraUse::Independent));
    }

    #[test]
    fn half_camera_pair_is_skipped() {
        let vertex = plain_vertex(
            "@group(0) @binding(0) var<uniform> view_transform: mat4x4<f32>;",
            "view_transform * vec4<f32>(position, 1.0)",
        );
        assert!(matches!(camera_use_of(&vertex), CameraUse::Skipped));
    }

    #[test]
    fn camera_matrix_of_the_wrong_type_is_skipped() {
        let vertex = plain_vertex(
            "struct Camera {\n    view_transform: mat4x4<f32>,\n    projection: vec4<f32>,\n}\n\
             @group(0) @binding(0) var<uniform> camera: Camera;",
            "camera.view_transform * vec4<f32>(position, 1.0) * camera.projection",
        );
        assert!(matches!(camera_use_of(&vertex), CameraUse::Skipped));
    }
}
