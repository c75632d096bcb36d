use super::{FULLSCREEN_PRIMITIVE_STATE, FULLSCREEN_VERT};
use crate::{capture::Capture, BgLayouts};

const SHADER_MODULE_SRC: &str = "
@group(0) @binding(0) var color_texture: texture_2d<f32>;

@fragment
fn fs_main(
    @builtin(position) position: vec4<f32>,
) -> @location(0) vec4<f32> {
    let src_size = vec2<f32>(textureDimensions(color_texture));
    let coords = floor(position.xy) * src_size / vec2<f32>(256.0, 192.0);
    return textureLoad(color_texture, vec2<u32>(coords), 0);
}";

/// Nearest-neighbor copy of the scene color into the capture-sized texture.
pub(crate) fn create_pipeline(device: &wgpu::Device, bg_layouts: &BgLayouts) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("3D renderer downscale pipeline layout"),
        bind_group_layouts: &[&bg_layouts.color],
        push_constant_ranges: &[],
    });

    let shader_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("3D renderer downscale shader module"),
        source: wgpu::ShaderSource::Wgsl(format!("{FULLSCREEN_VERT}\n{SHADER_MODULE_SRC}").into()),
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("3D renderer downscale pipeline"),
        layout: Some(&layout),

        vertex: wgpu::VertexState {
            module: &shader_module,
            entry_point: Some("vs_fullscreen"),
            compilation_options: Default::default(),
            buffers: &[],
        },

        primitive: FULLSCREEN_PRIMITIVE_STATE,

        depth_stencil: None,

        multisample: wgpu::MultisampleState::default(),

        fragment: Some(wgpu::FragmentState {
            module: &shader_module,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: Capture::FORMAT,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),

        multiview: None,
        cache: None,
    })
}
