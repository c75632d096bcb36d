pub struct CommonCode {
    pub common_uniforms: &'static str,

    pub common_vert_inputs: &'static str,
    pub common_vert_outputs: &'static str,
    pub common_set_vert_outputs: &'static str,

    pub common_frag_outputs: &'static str,
}

impl CommonCode {
    pub const fn new() -> Self {
        CommonCode {
            common_uniforms: "
struct FrameUniforms {
    screen_size: vec2<f32>,
    disp_cnt: u32,
    alpha_test_ref: u32,
    toon_colors: array<vec4<f32>, 32>,
}

@group(0) @binding(0) var<uniform> frame: FrameUniforms;",

            common_vert_inputs: "
    @location(0) position: vec2<u32>,
    @location(1) depth_w: vec2<u32>,
    @location(2) color: vec4<u32>,
    @location(3) uv: vec2<i32>,
    @location(4) attrs: u32,
    @location(5) tex_params: u32,
    @location(6) tex_palette_base: u32,",

            common_vert_outputs: "
    @builtin(position) position: vec4<f32>,
    @location(0) color: vec4<f32>,
    @location(1) uv: vec2<f32>,
    @location(2) @interpolate(flat) attrs: u32,
    @location(3) @interpolate(flat) tex_params: u32,
    @location(4) @interpolate(flat) tex_palette_base: u32,",

            common_set_vert_outputs: "
    let depth_shift = (attrs >> 16u) & 0x1Fu;
    let depth_f32 = f32(depth_w.x << depth_shift) * (1.0 / 16777216.0);
    let w = f32(max(depth_w.y, 1u)) * (1.0 / 65536.0);
    let ndc = vec2<f32>(position) * vec2<f32>(2.0, -2.0) / frame.screen_size
        + vec2<f32>(-1.0, 1.0);
    output.position = vec4<f32>(ndc, depth_f32, 1.0) * w;

    var alpha = f32(color.a) * (1.0 / 31.0);
    if color.a == 0u {
        alpha = 1.0;
    }
    output.color = vec4<f32>(vec3<f32>(color.rgb) * (1.0 / 255.0), alpha);
    output.uv = vec2<f32>(uv);
    output.attrs = attrs;
    output.tex_params = tex_params;
    output.tex_palette_base = tex_palette_base;",

            common_frag_outputs: "
    @location(0) color: vec4<f32>,
    @location(1) attrs: vec4<f32>,",
        }
    }
}

pub const COMMON_VERT_ATTRIBS: [wgpu::VertexAttribute; 7] = wgpu::vertex_attr_array![
    0 => Uint16x2,
    1 => Uint16x2,
    2 => Uint8x4,
    3 => Sint16x2,
    4 => Uint32,
    5 => Uint32,
    6 => Uint32
];
