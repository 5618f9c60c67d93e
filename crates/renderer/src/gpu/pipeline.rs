//! Wall pipelines: the shared uniform layout, the instanced vertex layout
//! riding the packed wall buffer, and the per-strategy pipeline builders.

use bytemuck::{Pod, Zeroable};
use glasswall::{Mat3, COLOR_STRIDE, POSITION_STRIDE};

use super::targets::DEPTH_FORMAT;

/// Uniform block shared by every wall pipeline; layout must match
/// `shaders/wall.wgsl` (mat3x3 columns are padded to vec4 stride).
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub(crate) struct WallUniforms {
    transform: [[f32; 4]; 3],
    depth: f32,
    opacity: f32,
    _padding: [f32; 2],
}

impl WallUniforms {
    pub fn new(transform: Mat3, depth: f32, opacity: f32) -> Self {
        Self {
            transform: transform.padded_columns(),
            depth,
            opacity,
            _padding: [0.0; 2],
        }
    }
}

/// (ONE, ONE, ADD): weighted color accumulation and plain additive blending.
pub(crate) const ADDITIVE_BLEND: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
};

/// (DST, ZERO, ADD): multiplies the target by the fragment, so a buffer
/// cleared to 1 accumulates the product of the (1 − w) revealage terms.
pub(crate) const REVEALAGE_BLEND: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::Dst,
        dst_factor: wgpu::BlendFactor::Zero,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::Dst,
        dst_factor: wgpu::BlendFactor::Zero,
        operation: wgpu::BlendOperation::Add,
    },
};

/// Straight alpha (SRC_ALPHA, ONE_MINUS_SRC_ALPHA, ADD): only correct when
/// draws arrive far-to-near.
pub(crate) const BACK_TO_FRONT_BLEND: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::SrcAlpha,
        dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::SrcAlpha,
        dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
        operation: wgpu::BlendOperation::Add,
    },
};

const CORNER_ATTRIBUTES: [wgpu::VertexAttribute; 3] =
    wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2, 2 => Float32x2];
const COLOR_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![3 => Unorm16x4];

/// The two vertex-buffer slots of every wall draw: one instance per
/// triangle, slot 0 bound at the position block, slot 1 bound at the fill-
/// or edge-color block of the same packed buffer.
fn wall_vertex_layouts() -> [wgpu::VertexBufferLayout<'static>; 2] {
    [
        wgpu::VertexBufferLayout {
            array_stride: POSITION_STRIDE,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &CORNER_ATTRIBUTES,
        },
        wgpu::VertexBufferLayout {
            array_stride: COLOR_STRIDE,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &COLOR_ATTRIBUTES,
        },
    ]
}

pub(crate) fn wall_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("wall uniform layout"),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    })
}

pub(crate) fn wall_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    uniforms: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("wall uniform bind group"),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: uniforms.as_entire_binding(),
        }],
    })
}

/// What a strategy's wall pipelines render into.
pub(crate) struct WallPassConfig {
    /// Color format of the opaque pass target.
    pub opaque_format: wgpu::TextureFormat,
    /// Fragment entry point of the transparent pass.
    pub transparent_entry: &'static str,
    /// Color targets (with blend states) of the transparent pass.
    pub transparent_targets: Vec<Option<wgpu::ColorTargetState>>,
    pub sample_count: u32,
}

/// The pipelines one strategy needs to draw walls, plus the uniform layout
/// they share. Built in `gen_resources`, dropped in `delete_resources`.
pub(crate) struct WallPipelines {
    pub layout: wgpu::BindGroupLayout,
    /// Wireframe pass over every visible wall's triangles.
    pub edges: wgpu::RenderPipeline,
    /// Filled faces of non-transparent walls, same target as `edges`.
    pub faces: wgpu::RenderPipeline,
    /// Filled faces of transparent walls with the strategy's blend state.
    pub transparent: wgpu::RenderPipeline,
}

impl WallPipelines {
    pub fn new(device: &wgpu::Device, config: &WallPassConfig) -> Self {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("wall shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/wall.wgsl").into()),
        });
        let layout = wall_bind_group_layout(device);
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("wall pipeline layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let opaque_targets = [Some(wgpu::ColorTargetState {
            format: config.opaque_format,
            blend: None,
            write_mask: wgpu::ColorWrites::ALL,
        })];

        let edges = build_wall_pipeline(
            device,
            &pipeline_layout,
            &module,
            "wall edges",
            "fs_opaque",
            &opaque_targets,
            wgpu::PolygonMode::Line,
            true,
            config.sample_count,
        );
        let faces = build_wall_pipeline(
            device,
            &pipeline_layout,
            &module,
            "wall faces",
            "fs_opaque",
            &opaque_targets,
            wgpu::PolygonMode::Fill,
            true,
            config.sample_count,
        );
        let transparent = build_wall_pipeline(
            device,
            &pipeline_layout,
            &module,
            "transparent wall faces",
            config.transparent_entry,
            &config.transparent_targets,
            wgpu::PolygonMode::Fill,
            false,
            config.sample_count,
        );

        Self {
            layout,
            edges,
            faces,
            transparent,
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn build_wall_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    module: &wgpu::ShaderModule,
    label: &'static str,
    fragment_entry: &str,
    targets: &[Option<wgpu::ColorTargetState>],
    polygon_mode: wgpu::PolygonMode,
    depth_write_enabled: bool,
    sample_count: u32,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: Some("vs_wall"),
            buffers: &wall_vertex_layouts(),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled,
            depth_compare: wgpu::CompareFunction::LessEqual,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState {
            count: sample_count,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: Some(fragment_entry),
            targets,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        multiview: None,
        cache: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{align_of, size_of};

    #[test]
    fn wall_uniforms_match_the_wgsl_layout() {
        let uniforms = WallUniforms::new(Mat3::IDENTITY, 0.25, 0.5);
        let base = &uniforms as *const _ as usize;

        assert_eq!(size_of::<WallUniforms>(), 64);
        assert_eq!(align_of::<WallUniforms>(), 4);
        assert_eq!((&uniforms.transform as *const _ as usize) - base, 0);
        assert_eq!((&uniforms.depth as *const _ as usize) - base, 48);
        assert_eq!((&uniforms.opacity as *const _ as usize) - base, 52);
    }

    #[test]
    fn vertex_layouts_ride_the_packed_blocks() {
        let [corners, colors] = wall_vertex_layouts();
        assert_eq!(corners.array_stride, POSITION_STRIDE);
        assert_eq!(corners.step_mode, wgpu::VertexStepMode::Instance);
        assert_eq!(
            corners.attributes.iter().map(|a| a.offset).collect::<Vec<_>>(),
            vec![0, 8, 16]
        );
        assert_eq!(colors.array_stride, COLOR_STRIDE);
        assert_eq!(colors.attributes[0].format, wgpu::VertexFormat::Unorm16x4);
    }
}
