macro_rules! ifdef {
    ($flag: expr, $str: expr) => {
        if $flag {
            $str
        } else {
            Default::default()
        }
    };
}

mod common;
pub use common::*;
mod w_buffer;
pub use w_buffer::*;
mod texture;
pub use texture::*;
mod replacement;
pub use replacement::*;

pub mod clear_shadow;
pub mod downscale;
pub mod edge_marking;
pub mod fog;
pub mod scene;

/// Vertex stage shared by all full-screen passes; draw 4 vertices as a triangle strip.
const FULLSCREEN_VERT: &str = "
struct FullscreenOutput {
    @builtin(position) pos: vec4<f32>,
}

@vertex
fn vs_fullscreen(
    @builtin(vertex_index) vertex_index: u32,
) -> FullscreenOutput {
    var vert_positions: array<vec2<f32>, 4> = array<vec2<f32>, 4>(
        vec2(-1.0, 1.0),
        vec2(1.0, 1.0),
        vec2(-1.0, -1.0),
        vec2(1.0, -1.0),
    );

    var output: FullscreenOutput;
    output.pos = vec4<f32>(vert_positions[vertex_index], 0.0, 1.0);
    return output;
}";

const FULLSCREEN_PRIMITIVE_STATE: wgpu::PrimitiveState = wgpu::PrimitiveState {
    topology: wgpu::PrimitiveTopology::TriangleStrip,
    strip_index_format: None,
    front_face: wgpu::FrontFace::Ccw,
    cull_mode: None,
    unclipped_depth: false,
    polygon_mode: wgpu::PolygonMode::Fill,
    conservative: false,
};
