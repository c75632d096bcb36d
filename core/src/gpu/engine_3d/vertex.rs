#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub type TexCoords = [i16; 2];

/// An RGBA color with 5-bit components.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    #[inline]
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Color { r, g, b, a }
    }

    #[inline]
    pub const fn from_rgb5(raw: u16, alpha: u8) -> Self {
        Color {
            r: (raw & 0x1F) as u8,
            g: (raw >> 5 & 0x1F) as u8,
            b: (raw >> 10 & 0x1F) as u8,
            a: alpha & 0x1F,
        }
    }

    #[inline]
    pub fn to_f32(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a].map(|c| c as f32 * (1.0 / 31.0))
    }
}

/// A vertex after transformation and viewport mapping.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct ScreenVertex {
    /// Final position in screen pixels.
    pub coords: [u16; 2],
    /// Position with 4 fractional bits, used when rendering above native resolution.
    pub hi_res_coords: [u16; 2],
    pub uv: TexCoords,
    /// 9-bit color components.
    pub color: [u16; 3],
}
