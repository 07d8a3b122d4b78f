use std::ops::Range;

use super::{
    interface::ProgramInterface,
    uniform::{Uniform, UniformBlock, UniformData},
};

/// Per-object copy of one uniform-only bind group of a program.
///
/// Several objects can share a program and still carry their own values for
/// the uniforms in that group. Bind it after [`ProgramBinding::bind`](super::ProgramBinding::bind)
/// so it replaces the program's shared group. Bytes the object never set
/// follow the program, see [`follow`](Self::follow).
#[derive(Debug)]
pub struct ObjectBlock {
    group: u32,
    blocks: Vec<UniformBlock>,
    /// Byte ranges per block written through [`set`](Self::set).
    owned: Vec<Vec<Range<usize>>>,
    buffers: Vec<wgpu::Buffer>,
    bind_group: wgpu::BindGroup,
}

impl ObjectBlock {
    pub(crate) fn new(
        group: u32,
        blocks: Vec<UniformBlock>,
        buffers: Vec<wgpu::Buffer>,
        bind_group: wgpu::BindGroup,
    ) -> Self {
        let mut blocks = blocks;
        // buffers were created with the current contents
        blocks.iter_mut().for_each(|b| b.dirty = false);
        Self {
            group,
            owned: vec![Vec::new(); blocks.len()],
            blocks,
            buffers,
            bind_group,
        }
    }

    pub fn group(&self) -> u32 {
        self.group
    }

    /// Stages `value` for a handle of the owning program.
    pub fn set<T: UniformData>(&mut self, handle: Uniform<T>, value: T) {
        match self
            .blocks
            .iter()
            .position(|b| b.group == handle.group && b.binding == handle.binding)
        {
            Some(i) => {
                self.blocks[i].write(handle.offset, &value);
                let range = handle.byte_range();
                if !self.owned[i].contains(&range) {
                    self.owned[i].push(range);
                }
            }
            None => log::warn!(
                "uniform handle for group {} ignored by object block of group {}",
                handle.group,
                self.group
            ),
        }
    }

    /// Takes over the program's staged values for everything this object did
    /// not set itself, e.g. camera matrices sharing the group.
    pub fn follow(&mut self, program: &ProgramInterface) {
        for (block, own) in self.blocks.iter_mut().zip(&self.owned) {
            if let Some(shared) = program
                .blocks()
                .iter()
                .find(|b| b.group == block.group && b.binding == block.binding)
            {
                block.follow(shared, own);
            }
        }
    }

    pub fn flush(&mut self, queue: &wgpu::Queue) {
        for (block, buffer) in self.blocks.iter_mut().zip(&self.buffers) {
            if block.dirty {
                queue.write_buffer(buffer, 0, &block.data);
                block.dirty = false;
            }
        }
    }

    pub fn bind(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_bind_group(self.group, &self.bind_group, &[]);
    }
}
