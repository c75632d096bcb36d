use super::{FULLSCREEN_PRIMITIVE_STATE, FULLSCREEN_VERT};
use crate::{BgLayouts, OutputAttachments};

/// The density table (only `x` is used, for uniform array alignment) and the fog depth
/// parameters. The fog color is passed as the blend constant.
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FogUniform {
    pub densities: [[f32; 4]; 34],
    pub offset: u32,
    pub shift: u32,
    pub _pad: [u32; 2],
}

impl FogUniform {
    /// Scales the 34-entry density table to 0..1.
    pub fn new(densities: &[u8; 34], offset: u32, shift: u8) -> Self {
        let mut result = FogUniform {
            densities: [[0.0; 4]; 34],
            offset,
            shift: shift as u32,
            _pad: [0; 2],
        };
        for (dst, &density) in result.densities.iter_mut().zip(densities) {
            dst[0] = density as f32 / 127.0;
        }
        result
    }
}

const SHADER_MODULE_SRC: &str = "
struct FogUniform {
    densities: array<vec4<f32>, 34>,
    offset: u32,
    shift: u32,
    _pad: vec2<u32>,
}

@group(0) @binding(0) var<uniform> fog: FogUniform;
@group(1) @binding(0) var depth_texture: texture_depth_2d;
@group(1) @binding(1) var attrs_texture: texture_2d<f32>;

@fragment
fn fs_main(
    @builtin(position) position: vec4<f32>,
) -> @location(0) vec4<f32> {
    let coords = vec2<i32>(position.xy);
    if textureLoad(attrs_texture, coords, 0).b < 0.5 {
        discard;
    }
    let z = u32(textureLoad(depth_texture, coords, 0) * 16777216.0);

    var index = 0u;
    var frac = 0u;
    if z >= fog.offset {
        let scaled = (z - fog.offset) >> 2u;
        if scaled >= ((32u << 17u) >> min(fog.shift, 22u)) {
            index = 32u;
        } else {
            let offset = scaled << fog.shift;
            index = offset >> 17u;
            frac = offset & 0x1FFFFu;
        }
    }
    let density = mix(
        fog.densities[index].x,
        fog.densities[index + 1u].x,
        f32(frac) * (1.0 / 131072.0),
    );
    return vec4<f32>(density);
}";

pub(crate) fn create_pipeline(
    only_alpha: bool,
    device: &wgpu::Device,
    bg_layouts: &BgLayouts,
) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("3D renderer fog pipeline layout"),
        bind_group_layouts: &[&bg_layouts.fog, &bg_layouts.depth_attrs],
        push_constant_ranges: &[],
    });

    let shader_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("3D renderer fog shader module"),
        source: wgpu::ShaderSource::Wgsl(format!("{FULLSCREEN_VERT}\n{SHADER_MODULE_SRC}").into()),
    });

    let fog_blend = wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::Constant,
        dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
        operation: wgpu::BlendOperation::Add,
    };

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("3D renderer fog pipeline"),
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
                    color: if only_alpha {
                        wgpu::BlendComponent {
                            src_factor: wgpu::BlendFactor::Zero,
                            dst_factor: wgpu::BlendFactor::One,
                            operation: wgpu::BlendOperation::Add,
                        }
                    } else {
                        fog_blend
                    },
                    alpha: fog_blend,
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
        assert_eq!(core::mem::size_of::<FogUniform>(), 560);
    }

    #[test]
    fn densities_are_scaled_to_unit_range() {
        let mut densities = [0; 34];
        densities[0] = 127;
        densities[33] = 64;
        let uniform = FogUniform::new(&densities, 0x1000, 3);
        assert_eq!(uniform.densities[0][0], 1.0);
        assert_eq!(uniform.densities[1][0], 0.0);
        assert_eq!(uniform.densities[33][0], 64.0 / 127.0);
        assert_eq!(uniform.offset, 0x1000);
        assert_eq!(uniform.shift, 3);
    }
}
