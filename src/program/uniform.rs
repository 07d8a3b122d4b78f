//! CPU side uniform values and typed handles.

use std::{marker::PhantomData, ops::Range};

use crate::math::{Matrix4, Vector3, Vector4};

use super::reflect::ShaderType;

/// A Rust value that can be written into a uniform of type [`TYPE`](Self::TYPE).
pub trait UniformData: Copy {
    const TYPE: ShaderType;

    /// Writes the value in the layout WGSL expects. `out` is at least as long
    /// as the value's byte size.
    fn write(&self, out: &mut [u8]);
}

fn put(out: &mut [u8], bytes: &[u8]) {
    out[..bytes.len()].copy_from_slice(bytes);
}

impl UniformData for f32 {
    const TYPE: ShaderType = ShaderType::Float;
    fn write(&self, out: &mut [u8]) {
        put(out, bytemuck::bytes_of(self));
    }
}

impl UniformData for i32 {
    const TYPE: ShaderType = ShaderType::Int;
    fn write(&self, out: &mut [u8]) {
        put(out, bytemuck::bytes_of(self));
    }
}

impl UniformData for u32 {
    const TYPE: ShaderType = ShaderType::UInt;
    fn write(&self, out: &mut [u8]) {
        put(out, bytemuck::bytes_of(self));
    }
}

impl UniformData for [f32; 2] {
    const TYPE: ShaderType = ShaderType::Vec2;
    fn write(&self, out: &mut [u8]) {
        put(out, bytemuck::cast_slice(self));
    }
}

impl UniformData for [f32; 3] {
    const TYPE: ShaderType = ShaderType::Vec3;
    fn write(&self, out: &mut [u8]) {
        put(out, bytemuck::cast_slice(self));
    }
}

impl UniformData for [f32; 4] {
    const TYPE: ShaderType = ShaderType::Vec4;
    fn write(&self, out: &mut [u8]) {
        put(out, bytemuck::cast_slice(self));
    }
}

impl UniformData for Vector3 {
    const TYPE: ShaderType = ShaderType::Vec3;
    fn write(&self, out: &mut [u8]) {
        put(out, bytemuck::bytes_of(self));
    }
}

impl UniformData for Vector4 {
    const TYPE: ShaderType = ShaderType::Vec4;
    fn write(&self, out: &mut [u8]) {
        put(out, bytemuck::bytes_of(self));
    }
}

impl UniformData for Matrix4 {
    const TYPE: ShaderType = ShaderType::Mat4;
    fn write(&self, out: &mut [u8]) {
        let cols = self.to_cols_array_2d();
        put(out, bytemuck::cast_slice(&cols));
    }
}

impl UniformData for cgmath::Matrix4<f32> {
    const TYPE: ShaderType = ShaderType::Mat4;
    fn write(&self, out: &mut [u8]) {
        let cols: [[f32; 4]; 4] = (*self).into();
        put(out, bytemuck::cast_slice(&cols));
    }
}

/// A uniform resolved once by name and type-checked against `T`.
///
/// Setting through a handle skips the name lookup and cannot fail. Handles
/// are only meaningful for the program (or object block) they came from.
pub struct Uniform<T> {
    pub(crate) group: u32,
    pub(crate) binding: u32,
    pub(crate) block: usize,
    pub(crate) offset: usize,
    _marker: PhantomData<fn(T)>,
}

impl<T> Uniform<T> {
    pub(crate) fn new(group: u32, binding: u32, block: usize, offset: usize) -> Self {
        Self {
            group,
            binding,
            block,
            offset,
            _marker: PhantomData,
        }
    }

    pub fn group(&self) -> u32 {
        self.group
    }
}

impl<T: UniformData> Uniform<T> {
    /// Bytes of the block this handle writes.
    pub(crate) fn byte_range(&self) -> Range<usize> {
        self.offset..self.offset + T::TYPE.components() as usize * 4
    }
}

impl<T> Clone for Uniform<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Uniform<T> {}

impl<T> std::fmt::Debug for Uniform<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Uniform")
            .field("group", &self.group)
            .field("binding", &self.binding)
            .field("offset", &self.offset)
            .finish()
    }
}

/// Staged bytes of one uniform buffer binding.
#[derive(Debug, Clone)]
pub struct UniformBlock {
    pub group: u32,
    pub binding: u32,
    pub(crate) data: Vec<u8>,
    pub(crate) dirty: bool,
}

impl UniformBlock {
    pub(crate) fn new(group: u32, binding: u32, size: usize) -> Self {
        Self {
            group,
            binding,
            data: vec![0; size],
            // zero fill still has to reach the buffer once
            dirty: true,
        }
    }

    pub(crate) fn write<T: UniformData>(&mut self, offset: usize, value: &T) {
        value.write(&mut self.data[offset..]);
        self.dirty = true;
    }

    /// Copies every byte of `shared` outside the `own` ranges.
    ///
    /// Marks the block dirty only when something changed.
    pub(crate) fn follow(&mut self, shared: &UniformBlock, own: &[Range<usize>]) {
        for (i, (dst, src)) in self.data.iter_mut().zip(&shared.data).enumerate() {
            if *dst != *src && !own.iter().any(|r| r.contains(&i)) {
                *dst = *src;
                self.dirty = true;
            }
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}
