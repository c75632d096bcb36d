/// Samples a bound replacement image in place of the hardware texture.
///
/// The hardware tiling rules are applied in original-texel space, then the result is normalized,
/// so the image only needs to keep the aspect of the texture it replaces.
pub struct ReplacementCode {
    pub replacement_uniforms: &'static str,
    pub replacement_functions: &'static str,
}

impl ReplacementCode {
    pub const fn new() -> Self {
        ReplacementCode {
            replacement_uniforms: "
struct ReplacementUniform {
    enabled: u32,
    _pad: vec3<u32>,
}

@group(1) @binding(0) var<uniform> replacement: ReplacementUniform;
@group(1) @binding(1) var replacement_texture: texture_2d<f32>;
@group(1) @binding(2) var replacement_sampler: sampler;",

            replacement_functions: "
fn wrap_replacement_coord(coord: f32, size: f32, repeat: bool, flip: bool) -> f32 {
    if !repeat {
        return clamp(coord, 0.0, size);
    }
    let period = floor(coord / size);
    let wrapped = coord - period * size;
    if flip && (i32(period) & 1i) != 0i {
        return size - wrapped;
    }
    return wrapped;
}

fn sample_replacement(params: u32, uv: vec2<f32>) -> vec4<f32> {
    let size = vec2<f32>(
        f32(8u << ((params >> 20u) & 7u)),
        f32(8u << ((params >> 23u) & 7u)),
    );
    let coords = uv * (1.0 / 16.0);
    let st = vec2<f32>(
        wrap_replacement_coord(
            coords.x,
            size.x,
            (params & (1u << 16u)) != 0u,
            (params & (1u << 18u)) != 0u,
        ),
        wrap_replacement_coord(
            coords.y,
            size.y,
            (params & (1u << 17u)) != 0u,
            (params & (1u << 19u)) != 0u,
        ),
    );
    return textureSampleLevel(replacement_texture, replacement_sampler, st / size, 0.0);
}",
        }
    }
}

/// Size of the per-draw replacement uniform.
pub const REPLACEMENT_UNIFORM_SIZE: u64 = 16;
