mod vertex;
pub use vertex::{Color, ScreenVertex, TexCoords};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

proc_bitfield::bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
    pub struct PolygonAttrs(pub u32): Debug {
        pub lights_mask: u8 @ 0..=3,
        pub mode: u8 @ 4..=5,
        pub show_back: bool @ 6,
        pub show_front: bool @ 7,
        pub update_depth_for_translucent: bool @ 11,
        pub clip_far_plane: bool @ 12,
        pub always_render_1_dot: bool @ 13,
        pub depth_test_equal: bool @ 14,
        pub fog_enabled: bool @ 15,
        pub alpha: u8 @ 16..=20,
        pub id: u8 @ 24..=29,
    }
}

impl PolygonAttrs {
    pub const MODE_MODULATION: u8 = 0;
    pub const MODE_DECAL: u8 = 1;
    pub const MODE_TOON: u8 = 2;
    pub const MODE_SHADOW: u8 = 3;
}

proc_bitfield::bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
    pub struct TextureParams(pub u32): Debug {
        pub vram_off: u16 @ 0..=15,
        pub repeat_s: bool @ 16,
        pub repeat_t: bool @ 17,
        pub flip_s: bool @ 18,
        pub flip_t: bool @ 19,
        pub size_shift_s: u8 @ 20..=22,
        pub size_shift_t: u8 @ 23..=25,
        pub format: u8 @ 26..=28,
        pub use_color_0_as_transparent: bool @ 29,
        pub coord_transform_mode: u8 @ 30..=31,
    }
}

impl TextureParams {
    /// Byte address of the texel data in texture VRAM.
    #[inline]
    pub fn vram_addr(self) -> u32 {
        (self.vram_off() as u32) << 3
    }

    #[inline]
    pub fn width(self) -> u16 {
        8 << self.size_shift_s()
    }

    #[inline]
    pub fn height(self) -> u16 {
        8 << self.size_shift_t()
    }
}

pub type VertexAddr = u16;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Polygon {
    pub vertices: [VertexAddr; 10],
    /// Per-vertex depth: 24-bit Z, or the W value when W-buffering.
    pub depth_values: [u32; 10],
    pub w_values: [u16; 10],
    pub vertices_len: u8,
    pub attrs: PolygonAttrs,
    pub is_front_facing: bool,
    pub is_translucent: bool,
    pub is_line: bool,
    pub is_degenerate: bool,
    pub tex_params: TextureParams,
    pub tex_palette_base: u16,
}

impl Polygon {
    #[inline]
    pub fn is_shadow_mask(&self) -> bool {
        self.attrs.mode() == PolygonAttrs::MODE_SHADOW && self.attrs.id() == 0
    }

    #[inline]
    pub fn is_shadow(&self) -> bool {
        self.attrs.mode() == PolygonAttrs::MODE_SHADOW && self.attrs.id() != 0
    }

    #[inline]
    pub fn vertices(&self) -> &[VertexAddr] {
        &self.vertices[..self.vertices_len as usize]
    }
}

proc_bitfield::bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq, Default)]
    #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
    pub struct RenderingControl(pub u16): Debug {
        pub texture_mapping_enabled: bool @ 0,
        pub highlight_shading_enabled: bool @ 1,
        pub alpha_test_enabled: bool @ 2,
        pub alpha_blending_enabled: bool @ 3,
        pub antialiasing_enabled: bool @ 4,
        pub edge_marking_enabled: bool @ 5,
        pub fog_only_alpha: bool @ 6,
        pub fog_enabled: bool @ 7,
        pub fog_depth_shift: u8 @ 8..=11,
        pub rear_plane_bitmap_enabled: bool @ 14,
    }
}

proc_bitfield::bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq, Default)]
    #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
    pub struct ClearAttrs(pub u32): Debug {
        pub color: u16 @ 0..=14,
        pub fog_enabled: bool @ 15,
        pub alpha: u8 @ 16..=20,
        pub poly_id: u8 @ 24..=29,
    }
}

pub const FOG_DENSITIES_LEN: usize = 34;

/// Global 3D registers latched for one frame.
#[derive(Clone, Debug)]
pub struct RenderingState {
    pub control: RenderingControl,
    pub w_buffering: bool,
    pub alpha_test_ref: u8,

    pub clear_attrs: ClearAttrs,
    pub clear_depth: u16,

    pub toon_colors: [Color; 0x20],
    pub edge_colors: [Color; 8],

    pub fog_color: Color,
    pub fog_densities: [u8; FOG_DENSITIES_LEN],
    pub fog_offset: u16,
}

impl Default for RenderingState {
    fn default() -> Self {
        RenderingState {
            control: RenderingControl(0),
            w_buffering: false,
            alpha_test_ref: 0,
            clear_attrs: ClearAttrs(0),
            clear_depth: 0x7FFF,
            toon_colors: [Color::default(); 0x20],
            edge_colors: [Color::default(); 8],
            fog_color: Color::default(),
            fog_densities: [0; FOG_DENSITIES_LEN],
            fog_offset: 0,
        }
    }
}

impl RenderingState {
    /// Loads the 32 hardware fog density registers, padding the table on both ends so it can be
    /// interpolated without bounds checks.
    pub fn set_fog_densities(&mut self, densities: &[u8; 0x20]) {
        self.fog_densities[0] = densities[0] & 0x7F;
        for (dst, src) in self.fog_densities[1..=0x20].iter_mut().zip(densities) {
            *dst = src & 0x7F;
        }
        self.fog_densities[0x21] = densities[0x1F] & 0x7F;
    }

    #[inline]
    pub fn clear_color(&self) -> Color {
        Color::from_rgb5(self.clear_attrs.color(), self.clear_attrs.alpha())
    }

    /// The clear depth expanded to the 24-bit range used by polygon depth values.
    #[inline]
    pub fn clear_depth_24(&self) -> u32 {
        (self.clear_depth as u32 & 0x7FFF) * 0x200 + 0x1FF
    }

    /// The fog offset expanded to the 24-bit depth range.
    #[inline]
    pub fn fog_offset_24(&self) -> u32 {
        (self.fog_offset as u32 & 0x7FFF) << 9
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn texture_params_fields() {
        let params = TextureParams(0)
            .with_vram_off(0x1234)
            .with_size_shift_s(3)
            .with_size_shift_t(7)
            .with_format(5)
            .with_repeat_s(true);
        assert_eq!(params.vram_addr(), 0x1234 << 3);
        assert_eq!(params.width(), 64);
        assert_eq!(params.height(), 1024);
        assert_eq!(params.format(), 5);
        assert!(params.repeat_s() && !params.repeat_t());
    }

    #[test]
    fn shadow_classification() {
        let mut poly = Polygon {
            attrs: PolygonAttrs(0).with_mode(PolygonAttrs::MODE_SHADOW),
            ..Polygon::default()
        };
        assert!(poly.is_shadow_mask());
        assert!(!poly.is_shadow());
        poly.attrs = poly.attrs.with_id(5);
        assert!(poly.is_shadow());
        assert!(!poly.is_shadow_mask());
    }

    #[test]
    fn fog_densities_are_padded() {
        let mut state = RenderingState::default();
        let mut densities = [0; 0x20];
        for (i, density) in densities.iter_mut().enumerate() {
            *density = i as u8 * 4;
        }
        state.set_fog_densities(&densities);
        assert_eq!(state.fog_densities[0], 0);
        assert_eq!(state.fog_densities[1], 0);
        assert_eq!(state.fog_densities[2], 4);
        assert_eq!(state.fog_densities[0x20], 0x7C);
        assert_eq!(state.fog_densities[0x21], 0x7C);
    }

    #[test]
    fn clear_depth_expansion() {
        let state = RenderingState {
            clear_depth: 0x7FFF,
            ..RenderingState::default()
        };
        assert_eq!(state.clear_depth_24(), 0xFF_FFFF);
    }
}
