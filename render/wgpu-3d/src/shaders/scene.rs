use super::{CommonCode, ReplacementCode, TextureCode, WBufferCode, COMMON_VERT_ATTRIBS};
use crate::{
    prepare::Vertex,
    state::{PipelineKey, Program},
    BgLayouts,
};
use core::mem;

const SHADE: &str = "
    let attrs = input.attrs;
    let mode = (attrs >> 4u) & 3u;
    let highlight = (frame.disp_cnt & 2u) != 0u;

    var vcol = input.color;
    var toon = vec3<f32>(0.0);
    if mode == 2u {
        let toon_color = frame.toon_colors[min(u32(vcol.r * 31.0), 31u)].rgb;
        if highlight {
            vcol = vec4<f32>(vcol.rrr, vcol.a);
            toon = toon_color;
        } else {
            vcol = vec4<f32>(toon_color, vcol.a);
        }
    }

    var col = vcol;
    if (frame.disp_cnt & 1u) != 0u && ((input.tex_params >> 26u) & 7u) != 0u {
        var tcol: vec4<f32>;
        if replacement.enabled != 0u {
            tcol = sample_replacement(input.tex_params, input.uv);
        } else {
            tcol = rgb5_to_vec4(
                sample_vram(input.tex_params, input.tex_palette_base, vec2<i32>(floor(input.uv))),
            );
        }
        if (mode & 1u) != 0u {
            col = vec4<f32>(tcol.rgb * tcol.a + vcol.rgb * (1.0 - tcol.a), vcol.a);
        } else {
            col = vcol * tcol;
        }
    }

    if mode == 2u && highlight {
        col = vec4<f32>(min(col.rgb + toon, vec3<f32>(1.0)), col.a);
    }

    if (frame.disp_cnt & 4u) != 0u && u32(round(col.a * 31.0)) <= frame.alpha_test_ref {
        discard;
    }";

fn fragment_body(program: Program) -> String {
    match program {
        Program::Opaque | Program::Translucent => {
            let alpha_discard = if program == Program::Opaque {
                "if col.a < 30.5 / 31.0 {
        discard;
    }"
            } else {
                "if col.a < 0.5 / 31.0 || col.a >= 30.5 / 31.0 {
        discard;
    }"
            };
            format!(
                "{SHADE}
    {alpha_discard}

    output.color = col;
    output.attrs = vec4<f32>(
        f32((attrs >> 24u) & 0x3Fu) * (1.0 / 63.0),
        0.0,
        f32((attrs >> 15u) & 1u),
        1.0,
    );"
            )
        }
        // Only depth and stencil are written
        Program::ShadowMask => "
    output.color = input.color;
    output.attrs = vec4<f32>(0.0);"
            .to_string(),
        Program::EdgeFlag => "
    output.color = input.color;
    output.attrs = vec4<f32>(0.0, 1.0, 0.0, 0.0);"
            .to_string(),
    }
}

fn shader_module_src(key: PipelineKey) -> String {
    let CommonCode {
        common_uniforms,
        common_vert_inputs,
        common_vert_outputs,
        common_set_vert_outputs,
        common_frag_outputs,
    } = CommonCode::new();

    let WBufferCode {
        w_buffer_vert_outputs,
        w_buffer_set_vert_outputs,
        w_buffer_frag_outputs,
        w_buffer_set_frag_outputs,
    } = ifdef!(key.w_buffering, WBufferCode::new());

    let TextureCode {
        texture_uniforms,
        texture_functions,
    } = TextureCode::new();

    let ReplacementCode {
        replacement_uniforms,
        replacement_functions,
    } = ReplacementCode::new();

    let body = fragment_body(key.state.program);

    format!(
        "{common_uniforms}
{texture_uniforms}
{replacement_uniforms}

struct VertOutput {{
    {common_vert_outputs}
    {w_buffer_vert_outputs}
}}

@vertex
fn vs_main({common_vert_inputs}
) -> VertOutput {{
    var output: VertOutput;
    {common_set_vert_outputs}
    {w_buffer_set_vert_outputs}
    return output;
}}

{texture_functions}
{replacement_functions}

struct FragOutput {{
    {common_frag_outputs}
    {w_buffer_frag_outputs}
}}

@fragment
fn fs_main(input: VertOutput) -> FragOutput {{
    var output: FragOutput;
    {body}
    {w_buffer_set_frag_outputs}
    return output;
}}"
    )
}

pub(crate) fn create_pipeline(
    key: PipelineKey,
    device: &wgpu::Device,
    bg_layouts: &BgLayouts,
) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("3D renderer scene pipeline layout"),
        bind_group_layouts: &[&bg_layouts.frame, &bg_layouts.replacement],
        push_constant_ranges: &[],
    });

    let shader_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("3D renderer scene shader module"),
        source: wgpu::ShaderSource::Wgsl(shader_module_src(key).into()),
    });

    let targets = key.state.color_targets();

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("3D renderer scene pipeline"),
        layout: Some(&layout),

        vertex: wgpu::VertexState {
            module: &shader_module,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: mem::size_of::<Vertex>() as wgpu::BufferAddress,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &COMMON_VERT_ATTRIBS,
            }],
        },

        primitive: wgpu::PrimitiveState {
            topology: key.prim.to_wgpu(),
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            unclipped_depth: false,
            polygon_mode: wgpu::PolygonMode::Fill,
            conservative: false,
        },

        depth_stencil: Some(key.state.depth_stencil_state()),

        multisample: wgpu::MultisampleState::default(),

        fragment: Some(wgpu::FragmentState {
            module: &shader_module,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &targets,
        }),

        multiview: None,
        cache: None,
    })
}
