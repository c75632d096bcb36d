#[derive(Default)]
pub struct WBufferCode {
    pub w_buffer_vert_outputs: &'static str,
    pub w_buffer_set_vert_outputs: &'static str,

    pub w_buffer_frag_outputs: &'static str,
    pub w_buffer_set_frag_outputs: &'static str,
}

impl WBufferCode {
    pub const fn new() -> Self {
        WBufferCode {
            w_buffer_vert_outputs: "@location(5) w_depth: f32,",
            w_buffer_set_vert_outputs: "output.w_depth = depth_f32;",
            w_buffer_frag_outputs: "@builtin(frag_depth) frag_depth: f32,",
            w_buffer_set_frag_outputs: "output.frag_depth = input.w_depth;",
        }
    }
}
