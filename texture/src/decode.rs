//! Single-texel lookups for the seven hardware texture formats.

use hires_core::gpu::{engine_3d::TextureParams, vram::TextureMemory};

pub const FORMAT_NONE: u8 = 0;
pub const FORMAT_A3I5: u8 = 1;
pub const FORMAT_PAL4: u8 = 2;
pub const FORMAT_PAL16: u8 = 3;
pub const FORMAT_PAL256: u8 = 4;
pub const FORMAT_COMPRESSED: u8 = 5;
pub const FORMAT_A5I3: u8 = 6;
pub const FORMAT_DIRECT: u8 = 7;

/// A decoded texel: an RGB555 color and a 5-bit alpha.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Texel {
    pub color: u16,
    pub alpha: u8,
}

impl Texel {
    pub const TRANSPARENT: Self = Texel { color: 0, alpha: 0 };

    #[inline]
    const fn opaque(color: u16) -> Self {
        Texel {
            color: color & 0x7FFF,
            alpha: 0x1F,
        }
    }
}

/// Wraps, mirrors or clamps an integer texel coordinate along one axis.
#[inline]
pub fn apply_tiling(coord: i32, size_shift: u8, repeat: bool, flip: bool) -> u32 {
    let size = 8_i32 << size_shift;
    let mask = size - 1;
    (if repeat {
        if flip && coord & size != 0 {
            mask - (coord & mask)
        } else {
            coord & mask
        }
    } else {
        coord.clamp(0, mask)
    }) as u32
}

/// Per-channel weighted blend of two RGB555 colors; the weights must sum to `1 << shift`.
#[inline]
fn blend_rgb5(color_0: u16, color_1: u16, weight_0: u16, weight_1: u16, shift: u8) -> u16 {
    let mut result = 0;
    for channel_shift in [0, 5, 10] {
        let c0 = color_0 >> channel_shift & 0x1F;
        let c1 = color_1 >> channel_shift & 0x1F;
        result |= ((c0 * weight_0 + c1 * weight_1) >> shift) << channel_shift;
    }
    result
}

/// Samples one texel.
///
/// `uv` holds texel coordinates with 4 fractional bits; `palette_base` is the raw palette base
/// register value.
pub fn sample(
    mem: &impl TextureMemory,
    params: TextureParams,
    palette_base: u16,
    uv: [i16; 2],
) -> Texel {
    let format = params.format();
    if format == FORMAT_NONE {
        return Texel::TRANSPARENT;
    }

    let width_shift = params.size_shift_s();
    let s = apply_tiling(
        uv[0] as i32 >> 4,
        width_shift,
        params.repeat_s(),
        params.flip_s(),
    );
    let t = apply_tiling(
        uv[1] as i32 >> 4,
        params.size_shift_t(),
        params.repeat_t(),
        params.flip_t(),
    );

    let tex_base = params.vram_addr();
    let pal_base = if format == FORMAT_PAL4 {
        (palette_base as u32) << 3
    } else {
        (palette_base as u32) << 4
    };
    let i = t << (width_shift + 3) | s;

    macro_rules! palette_color {
        ($index: expr) => {
            mem.read_palette_u16(pal_base + (($index as u32) << 1))
        };
    }

    macro_rules! indexed {
        ($index: expr) => {{
            let index = $index;
            if index == 0 && params.use_color_0_as_transparent() {
                Texel::TRANSPARENT
            } else {
                Texel::opaque(palette_color!(index))
            }
        }};
    }

    match format {
        FORMAT_A3I5 => {
            let pixel = mem.read_texture_u8(tex_base + i);
            Texel {
                color: palette_color!(pixel & 0x1F) & 0x7FFF,
                alpha: (pixel >> 3 & 0x1C) + (pixel >> 6),
            }
        }

        FORMAT_PAL4 => indexed!(mem.read_texture_u8(tex_base + (i >> 2)) >> ((i & 3) << 1) & 3),

        FORMAT_PAL16 => indexed!(mem.read_texture_u8(tex_base + (i >> 1)) >> ((i & 1) << 2) & 0xF),

        FORMAT_PAL256 => indexed!(mem.read_texture_u8(tex_base + i)),

        FORMAT_COMPRESSED => {
            let block_addr = tex_base + ((t & !3) << (width_shift + 1)) + (s & !3);
            let texel_addr = (block_addr + (t & 3)) & 0x7_FFFF;

            let mut pal_info_addr = 0x2_0000 + ((texel_addr & 0x1_FFFC) >> 1);
            if texel_addr >= 0x4_0000 {
                pal_info_addr += 0x1_0000;
            }

            // Slot 1 only holds palette info words, so blocks can't be stored there
            let value = if (0x2_0000..0x4_0000).contains(&texel_addr) {
                0
            } else {
                mem.read_texture_u8(texel_addr) >> ((s & 3) << 1) & 3
            };

            let pal_info = mem.read_texture_u16(pal_info_addr);
            let pal_base = pal_base + ((pal_info as u32 & 0x3FFF) << 2);
            let mode = pal_info >> 14;

            let color = |index: u32| mem.read_palette_u16(pal_base + (index << 1)) & 0x7FFF;

            match (value, mode) {
                (0 | 1, _) => Texel::opaque(color(value as u32)),
                (2, 1) => Texel::opaque(blend_rgb5(color(0), color(1), 1, 1, 1)),
                (2, 3) => Texel::opaque(blend_rgb5(color(0), color(1), 5, 3, 3)),
                (2, _) => Texel::opaque(color(2)),
                (_, 2) => Texel::opaque(color(3)),
                (_, 3) => Texel::opaque(blend_rgb5(color(0), color(1), 3, 5, 3)),
                _ => Texel::TRANSPARENT,
            }
        }

        FORMAT_A5I3 => {
            let pixel = mem.read_texture_u8(tex_base + i);
            Texel {
                color: palette_color!(pixel & 7) & 0x7FFF,
                alpha: pixel >> 3,
            }
        }

        _ => {
            let color = mem.read_texture_u16(tex_base + (i << 1));
            Texel {
                color: color & 0x7FFF,
                alpha: if color & 0x8000 != 0 { 0x1F } else { 0 },
            }
        }
    }
}
