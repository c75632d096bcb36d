use super::{FULLSCREEN_PRIMITIVE_STATE, FULLSCREEN_VERT};
use crate::OutputAttachments;

const SHADER_MODULE_SRC: &str = "
struct FragOutput {
    @location(0) color: vec4<f32>,
    @location(1) attrs: vec4<f32>,
}

@fragment
fn fs_main() -> FragOutput {
    var output: FragOutput;
    output.color = vec4<f32>(0.0);
    output.attrs = vec4<f32>(0.0);
    return output;
}";

/// Draws a full-screen quad that only zeroes stencil bit 7.
pub(crate) fn create_pipeline(device: &wgpu::Device) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("3D renderer shadow bit clear pipeline layout"),
        bind_group_layouts: &[],
        push_constant_ranges: &[],
    });

    let shader_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("3D renderer shadow bit clear shader module"),
        source: wgpu::ShaderSource::Wgsl(format!("{FULLSCREEN_VERT}\n{SHADER_MODULE_SRC}").into()),
    });

    let face = wgpu::StencilFaceState {
        compare: wgpu::CompareFunction::Always,
        fail_op: wgpu::StencilOperation::Keep,
        depth_fail_op: wgpu::StencilOperation::Keep,
        pass_op: wgpu::StencilOperation::Zero,
    };

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("3D renderer shadow bit clear pipeline"),
        layout: Some(&layout),

        vertex: wgpu::VertexState {
            module: &shader_module,
            entry_point: Some("vs_fullscreen"),
            compilation_options: Default::default(),
            buffers: &[],
        },

        primitive: FULLSCREEN_PRIMITIVE_STATE,

        depth_stencil: Some(wgpu::DepthStencilState {
            format: OutputAttachments::DEPTH_FORMAT,
            depth_write_enabled: false,
            depth_compare: wgpu::CompareFunction::Always,
            stencil: wgpu::StencilState {
                front: face,
                back: face,
                read_mask: 0,
                write_mask: 0x80,
            },
            bias: wgpu::DepthBiasState::default(),
        }),

        multisample: wgpu::MultisampleState::default(),

        fragment: Some(wgpu::FragmentState {
            module: &shader_module,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &[
                Some(wgpu::ColorTargetState {
                    format: OutputAttachments::COLOR_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::empty(),
                }),
                Some(wgpu::ColorTargetState {
                    format: OutputAttachments::ATTRS_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::empty(),
                }),
            ],
        }),

        multiview: None,
        cache: None,
    })
}
