use super::basic::PipelineOptions;

/// Additive blending for glowing, order independent sprites.
pub const ADDITIVE_BLENDING: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::SrcAlpha,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::SrcAlpha,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
};

impl PipelineOptions {
    /**
     * Options for translucent particles.
     *
     * Sprites are still depth tested against the opaque scene but never write
     * depth, so particles behind each other all contribute to the colour.
     */
    pub fn additive(topology: wgpu::PrimitiveTopology) -> Self {
        Self {
            topology,
            blend: Some(ADDITIVE_BLENDING),
            depth_write: false,
        }
    }
}
