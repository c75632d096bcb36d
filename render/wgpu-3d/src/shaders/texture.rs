/// Samples hardware textures straight from the mirrored texture and palette VRAM.
pub struct TextureCode {
    pub texture_uniforms: &'static str,
    pub texture_functions: &'static str,
}

impl TextureCode {
    pub const fn new() -> Self {
        TextureCode {
            texture_uniforms: "
@group(0) @binding(1) var tex_mem: texture_2d<u32>;
@group(0) @binding(2) var pal_mem: texture_2d<u32>;",

            texture_functions: "
fn tex_u8(addr: u32) -> u32 {
    let a = addr & 0x7FFFFu;
    return textureLoad(tex_mem, vec2<u32>(a & 0x3FFu, a >> 10u), 0).r;
}

fn tex_u16(addr: u32) -> u32 {
    return tex_u8(addr) | (tex_u8(addr + 1u) << 8u);
}

fn pal_u16(addr: u32) -> u32 {
    let a = (addr >> 1u) & 0xFFFFu;
    return textureLoad(pal_mem, vec2<u32>(a & 0x3FFu, a >> 10u), 0).r & 0x7FFFu;
}

fn apply_tiling(coord: i32, size_shift: u32, repeat: bool, flip: bool) -> u32 {
    let size = 8i << size_shift;
    let mask = size - 1i;
    if repeat {
        if flip && (coord & size) != 0i {
            return u32(mask - (coord & mask));
        }
        return u32(coord & mask);
    }
    return u32(clamp(coord, 0i, mask));
}

fn blend_rgb5(c0: u32, c1: u32, w0: u32, w1: u32, shift: u32) -> u32 {
    var result = 0u;
    for (var ch = 0u; ch < 15u; ch += 5u) {
        let mixed = (((c0 >> ch) & 0x1Fu) * w0 + ((c1 >> ch) & 0x1Fu) * w1) >> shift;
        result |= mixed << ch;
    }
    return result;
}

// Color in x, 5-bit alpha in y.
fn indexed_texel(index: u32, pal_base: u32, color_0_transparent: bool) -> vec2<u32> {
    if index == 0u && color_0_transparent {
        return vec2<u32>(0u, 0u);
    }
    return vec2<u32>(pal_u16(pal_base + (index << 1u)), 31u);
}

fn compressed_texel(tex_base: u32, pal_base: u32, s: u32, t: u32, width_shift: u32) -> vec2<u32> {
    let block_addr = tex_base + ((t & ~3u) << (width_shift + 1u)) + (s & ~3u);
    let texel_addr = (block_addr + (t & 3u)) & 0x7FFFFu;

    var pal_info_addr = 0x20000u + ((texel_addr & 0x1FFFCu) >> 1u);
    if texel_addr >= 0x40000u {
        pal_info_addr += 0x10000u;
    }

    var value = 0u;
    if texel_addr < 0x20000u || texel_addr >= 0x40000u {
        value = (tex_u8(texel_addr) >> ((s & 3u) << 1u)) & 3u;
    }

    let pal_info = tex_u16(pal_info_addr);
    let base = pal_base + ((pal_info & 0x3FFFu) << 2u);
    let mode = pal_info >> 14u;

    if value < 2u {
        return vec2<u32>(pal_u16(base + (value << 1u)), 31u);
    }
    let c0 = pal_u16(base);
    let c1 = pal_u16(base + 2u);
    var result = vec2<u32>(0u, 0u);
    if value == 2u {
        switch mode {
            case 1u: {
                result = vec2<u32>(blend_rgb5(c0, c1, 1u, 1u, 1u), 31u);
            }
            case 3u: {
                result = vec2<u32>(blend_rgb5(c0, c1, 5u, 3u, 3u), 31u);
            }
            default: {
                result = vec2<u32>(pal_u16(base + 4u), 31u);
            }
        }
    } else if mode == 2u {
        result = vec2<u32>(pal_u16(base + 6u), 31u);
    } else if mode == 3u {
        result = vec2<u32>(blend_rgb5(c0, c1, 3u, 5u, 3u), 31u);
    }
    return result;
}

fn sample_vram(params: u32, palette_base: u32, uv: vec2<i32>) -> vec2<u32> {
    let format = (params >> 26u) & 7u;
    let width_shift = (params >> 20u) & 7u;
    let height_shift = (params >> 23u) & 7u;
    let s = apply_tiling(
        uv.x >> 4u,
        width_shift,
        (params & (1u << 16u)) != 0u,
        (params & (1u << 18u)) != 0u,
    );
    let t = apply_tiling(
        uv.y >> 4u,
        height_shift,
        (params & (1u << 17u)) != 0u,
        (params & (1u << 19u)) != 0u,
    );

    let tex_base = (params & 0xFFFFu) << 3u;
    var pal_base = palette_base << 4u;
    if format == 2u {
        pal_base = palette_base << 3u;
    }
    let i = (t << (width_shift + 3u)) | s;
    let color_0_transparent = (params & (1u << 29u)) != 0u;

    var result: vec2<u32>;
    switch format {
        case 1u: {
            let pixel = tex_u8(tex_base + i);
            let alpha = ((pixel >> 3u) & 0x1Cu) + (pixel >> 6u);
            result = vec2<u32>(pal_u16(pal_base + ((pixel & 0x1Fu) << 1u)), alpha);
        }
        case 2u: {
            let index = (tex_u8(tex_base + (i >> 2u)) >> ((i & 3u) << 1u)) & 3u;
            result = indexed_texel(index, pal_base, color_0_transparent);
        }
        case 3u: {
            let index = (tex_u8(tex_base + (i >> 1u)) >> ((i & 1u) << 2u)) & 0xFu;
            result = indexed_texel(index, pal_base, color_0_transparent);
        }
        case 4u: {
            result = indexed_texel(tex_u8(tex_base + i), pal_base, color_0_transparent);
        }
        case 5u: {
            result = compressed_texel(tex_base, pal_base, s, t, width_shift);
        }
        case 6u: {
            let pixel = tex_u8(tex_base + i);
            result = vec2<u32>(pal_u16(pal_base + ((pixel & 7u) << 1u)), pixel >> 3u);
        }
        default: {
            let color = tex_u16(tex_base + (i << 1u));
            result = vec2<u32>(color & 0x7FFFu, select(0u, 31u, (color & 0x8000u) != 0u));
        }
    }
    return result;
}

fn rgb5_to_vec4(texel: vec2<u32>) -> vec4<f32> {
    let color = texel.x;
    return vec4<f32>(
        f32(color & 0x1Fu),
        f32((color >> 5u) & 0x1Fu),
        f32((color >> 10u) & 0x1Fu),
        f32(texel.y),
    ) * (1.0 / 31.0);
}",
        }
    }
}
