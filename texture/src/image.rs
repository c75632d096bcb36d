//! Whole-texture decoding into RGBA8 images.

use crate::decode::{self, FORMAT_NONE};
use core::fmt;
use hires_core::gpu::{engine_3d::TextureParams, vram::TextureMemory};

pub const MIN_SIZE: u16 = 8;
pub const MAX_SIZE: u16 = 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodeError {
    NoTexture,
    InvalidSize { width: u16, height: u16 },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DecodeError::NoTexture => write!(f, "polygon has no texture"),
            DecodeError::InvalidSize { width, height } => {
                write!(f, "invalid texture size: {width}x{height}")
            }
        }
    }
}

impl std::error::Error for DecodeError {}

#[inline]
pub fn expand_5_to_8(value: u8) -> u8 {
    value << 3 | value >> 2
}

#[inline]
pub fn expand_alpha(alpha: u8) -> u8 {
    (alpha as u16 * 255 / 31) as u8
}

/// Decodes the texture described by `params` and `palette_base` into `rgba`, replacing its
/// contents, and returns the texture's width and height.
pub fn decode_rgba_into(
    mem: &impl TextureMemory,
    params: TextureParams,
    palette_base: u16,
    rgba: &mut Vec<u8>,
) -> Result<(u16, u16), DecodeError> {
    if params.format() == FORMAT_NONE {
        return Err(DecodeError::NoTexture);
    }
    let (width, height) = (params.width(), params.height());
    if !(MIN_SIZE..=MAX_SIZE).contains(&width) || !(MIN_SIZE..=MAX_SIZE).contains(&height) {
        return Err(DecodeError::InvalidSize { width, height });
    }

    rgba.clear();
    rgba.reserve(width as usize * height as usize * 4);
    for t in 0..height {
        for s in 0..width {
            let texel = decode::sample(
                mem,
                params,
                palette_base,
                [(s << 4) as i16, (t << 4) as i16],
            );
            rgba.extend_from_slice(&[
                expand_5_to_8((texel.color & 0x1F) as u8),
                expand_5_to_8((texel.color >> 5 & 0x1F) as u8),
                expand_5_to_8((texel.color >> 10 & 0x1F) as u8),
                expand_alpha(texel.alpha),
            ]);
        }
    }
    Ok((width, height))
}

/// A decoded hardware texture.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedTexture {
    pub format: u8,
    pub width: u16,
    pub height: u16,
    pub rgba: Vec<u8>,
}

impl DecodedTexture {
    pub fn decode(
        mem: &impl TextureMemory,
        params: TextureParams,
        palette_base: u16,
    ) -> Result<Self, DecodeError> {
        let mut rgba = Vec::new();
        let (width, height) = decode_rgba_into(mem, params, palette_base, &mut rgba)?;
        Ok(DecodedTexture {
            format: params.format(),
            width,
            height,
            rgba,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::tests::vram_with;
    use hires_core::gpu::vram::VramSource;

    #[test]
    fn channel_expansion() {
        assert_eq!(expand_5_to_8(0), 0);
        assert_eq!(expand_5_to_8(0x1F), 0xFF);
        assert_eq!(expand_5_to_8(0x10), 0x84);
        assert_eq!(expand_alpha(0), 0);
        assert_eq!(expand_alpha(31), 255);
        assert_eq!(expand_alpha(16), 131);
    }

    #[test]
    fn rejects_untextured_polygons() {
        let vram = vram_with(&[], &[]);
        assert_eq!(
            DecodedTexture::decode(vram.flat(), TextureParams(0), 0),
            Err(DecodeError::NoTexture)
        );
    }

    #[test]
    fn decodes_every_texel_in_row_order() {
        // 8x8 direct color texture with a gradient in the first row
        let mut texels = Vec::new();
        for i in 0..64_u16 {
            let color = if i < 8 { i | 0x8000 } else { 0x7FFF };
            texels.extend_from_slice(&color.to_le_bytes());
        }
        let vram = vram_with(&[(0x800, &texels)], &[]);
        let params = TextureParams(0).with_format(7).with_vram_off(0x100);
        let texture = DecodedTexture::decode(vram.flat(), params, 0).unwrap();
        assert_eq!((texture.width, texture.height), (8, 8));
        assert_eq!(texture.rgba.len(), 8 * 8 * 4);
        assert_eq!(&texture.rgba[12..16], &[expand_5_to_8(3), 0, 0, 255]);
        assert_eq!(&texture.rgba[8 * 4..8 * 4 + 4], &[255, 255, 0xFF, 0]);
    }

    #[test]
    fn decoding_is_deterministic() {
        let vram = vram_with(&[(0, &[0x12, 0x34, 0x56, 0x78])], &[(0, &[0xAB, 0x4C])]);
        let params = TextureParams(0)
            .with_format(3)
            .with_size_shift_s(1)
            .with_size_shift_t(2);
        let a = DecodedTexture::decode(vram.flat(), params, 0).unwrap();
        let b = DecodedTexture::decode(vram.flat(), params, 0).unwrap();
        assert_eq!((a.width, a.height), (16, 32));
        assert_eq!(a, b);
    }
}
