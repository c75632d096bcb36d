use super::{FULLSCREEN_PRIMITIVE_STATE, FULLSCREEN_VERT};
use crate::{BgLayouts, OutputAttachments};

/// Edge colors and the clear plane's identity, used for pixels past the screen borders.
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct EdgeUniform {
    pub colors: [[f32; 4]; 8],
    pub clear_id: f32,
    pub clear_depth: f32,
    pub _pad: [f32; 2],
}

fn shader_module_src(antialiasing_enabled: bool) -> String {
    let edge_alpha = if antialiasing_enabled { "0.5" } else { "1.0" };
    format!(
        "
struct EdgeUniform {{
    colors: array<vec4<f32>, 8>,
    clear_id: f32,
    clear_depth: f32,
    _pad: vec2<f32>,
}}

@group(0) @binding(0) var<uniform> edge: EdgeUniform;
@group(1) @binding(0) var depth_texture: texture_depth_2d;
@group(1) @binding(1) var attrs_texture: texture_2d<f32>;

{FULLSCREEN_VERT}

fn in_bounds(coords: vec2<i32>) -> bool {{
    return all(coords >= vec2<i32>(0i)) && all(coords < vec2<i32>(textureDimensions(attrs_texture)));
}}

fn unpack_id(value: f32) -> u32 {{
    return u32(round(value * 63.0));
}}

fn is_edge(id: u32, depth: f32, coords: vec2<i32>) -> bool {{
    var other_id = edge.clear_id;
    var other_depth = edge.clear_depth;
    if in_bounds(coords) {{
        other_id = textureLoad(attrs_texture, coords, 0).r;
        other_depth = textureLoad(depth_texture, coords, 0);
    }}
    return unpack_id(other_id) != id && depth < other_depth;
}}

@fragment
fn fs_main(
    @builtin(position) position: vec4<f32>,
) -> @location(0) vec4<f32> {{
    let coords = vec2<i32>(position.xy);
    let attrs = textureLoad(attrs_texture, coords, 0);
    if attrs.g < 0.5 {{
        discard;
    }}
    let id = unpack_id(attrs.r);
    let depth = textureLoad(depth_texture, coords, 0);
    if !(
        is_edge(id, depth, coords + vec2<i32>(0i, -1i)) ||
        is_edge(id, depth, coords + vec2<i32>(0i, 1i)) ||
        is_edge(id, depth, coords + vec2<i32>(-1i, 0i)) ||
        is_edge(id, depth, coords + vec2<i32>(1i, 0i))
    ) {{
        discard;
    }}
    return vec4<f32>(edge.colors[id >> 3u].rgb, {edge_alpha});
}}"
    )
}

pub(crate) fn create_pipeline(
    antialiasing_enabled: bool,
    device: &wgpu::Device,
    bg_layouts: &BgLayouts,
) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("3D renderer edge marking pipeline layout"),
        bind_group_layouts: &[&bg_layouts.edge, &bg_layouts.depth_attrs],
        push_constant_ranges: &[],
    });

    let shader_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("3D renderer edge marking shader module"),
        source: wgpu::ShaderSource::Wgsl(shader_module_src(antialiasing_enabled).into()),
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("3D renderer edge marking pipeline"),
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
                format: OutputAttachments::COLOR_FORMAT,
                blend: Some(wgpu::BlendState {
                    color: wgpu::BlendComponent {
                        src_factor: wgpu::BlendFactor::SrcAlpha,
                        dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                        operation: wgpu::BlendOperation::Add,
                    },
                    alpha: wgpu::BlendComponent {
                        src_factor: wgpu::BlendFactor::Zero,
                        dst_factor: wgpu::BlendFactor::One,
                        operation: wgpu::BlendOperation::Add,
                    },
                }),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),

        multiview: None,
        cache: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_matches_wgsl_layout() {
        assert_eq!(core::mem::size_of::<EdgeUniform>(), 144);
    }

    #[test]
    fn antialiasing_halves_edge_alpha() {
        assert!(shader_module_src(true).contains(".rgb, 0.5)"));
        assert!(shader_module_src(false).contains(".rgb, 1.0)"));
    }
}
