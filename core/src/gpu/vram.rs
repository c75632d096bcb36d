//! The texture and texture palette VRAM views sampled by the 3D renderer.
//!
//! Texture data and palettes live in VRAM banks that the emulated program can remap at any time.
//! Renderers never look at the banks directly: a [`VramSource`] first reports which regions
//! changed since the last frame, then copies them into a flat, linearly addressed [`FlatVram`].

use crate::utils::{read_u16_le, zeroed_boxed_slice};

pub const TEXTURE_LEN: usize = 0x8_0000;
pub const TEX_PAL_LEN: usize = 0x2_0000;

const TEXTURE_REGION_SHIFT: u32 = 17;
const TEXTURE_REGIONS: u32 = 4;
const TEX_PAL_REGION_SHIFT: u32 = 14;
const TEX_PAL_REGIONS: u32 = 6;

/// Masks of 128 KiB texture regions and 16 KiB texture palette regions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct DirtyRegions {
    pub texture: u8,
    pub tex_pal: u8,
}

impl DirtyRegions {
    pub const NONE: Self = DirtyRegions {
        texture: 0,
        tex_pal: 0,
    };

    pub const ALL: Self = DirtyRegions {
        texture: (1 << TEXTURE_REGIONS) - 1,
        tex_pal: (1 << TEX_PAL_REGIONS) - 1,
    };

    #[inline]
    pub fn is_empty(self) -> bool {
        self.texture == 0 && self.tex_pal == 0
    }

    pub fn texture_ranges(self) -> impl Iterator<Item = core::ops::Range<usize>> {
        (0..TEXTURE_REGIONS)
            .filter(move |i| self.texture & 1 << i != 0)
            .map(|i| (i as usize) << TEXTURE_REGION_SHIFT..(i as usize + 1) << TEXTURE_REGION_SHIFT)
    }

    pub fn tex_pal_ranges(self) -> impl Iterator<Item = core::ops::Range<usize>> {
        (0..TEX_PAL_REGIONS)
            .filter(move |i| self.tex_pal & 1 << i != 0)
            .map(|i| (i as usize) << TEX_PAL_REGION_SHIFT..(i as usize + 1) << TEX_PAL_REGION_SHIFT)
    }

    fn mark_texture(&mut self, range: core::ops::Range<usize>) {
        for i in range.start >> TEXTURE_REGION_SHIFT..=(range.end - 1) >> TEXTURE_REGION_SHIFT {
            self.texture |= 1 << (i & 3);
        }
    }

    fn mark_tex_pal(&mut self, range: core::ops::Range<usize>) {
        for i in range.start >> TEX_PAL_REGION_SHIFT..=(range.end - 1) >> TEX_PAL_REGION_SHIFT {
            if i < TEX_PAL_REGIONS as usize {
                self.tex_pal |= 1 << i;
            }
        }
    }
}

/// Byte and halfword reads over texture and palette memory. Addresses wrap around the size of
/// each area.
pub trait TextureMemory {
    fn read_texture_u8(&self, addr: u32) -> u8;
    fn read_texture_u16(&self, addr: u32) -> u16;
    fn read_palette_u16(&self, addr: u32) -> u16;
}

pub struct FlatVram {
    texture: Box<[u8]>,
    tex_pal: Box<[u8]>,
}

impl Default for FlatVram {
    fn default() -> Self {
        Self::new()
    }
}

impl FlatVram {
    pub fn new() -> Self {
        FlatVram {
            texture: zeroed_boxed_slice(TEXTURE_LEN),
            tex_pal: zeroed_boxed_slice(TEX_PAL_LEN),
        }
    }

    #[inline]
    pub fn texture(&self) -> &[u8] {
        &self.texture
    }

    #[inline]
    pub fn tex_pal(&self) -> &[u8] {
        &self.tex_pal
    }

    /// Copies the regions marked in `dirty` from a pair of bank views.
    pub fn copy_regions(&mut self, texture: &[u8], tex_pal: &[u8], dirty: DirtyRegions) {
        for range in dirty.texture_ranges() {
            self.texture[range.clone()].copy_from_slice(&texture[range]);
        }
        for range in dirty.tex_pal_ranges() {
            self.tex_pal[range.clone()].copy_from_slice(&tex_pal[range]);
        }
    }
}

impl TextureMemory for FlatVram {
    #[inline]
    fn read_texture_u8(&self, addr: u32) -> u8 {
        self.texture[addr as usize & (TEXTURE_LEN - 1)]
    }

    #[inline]
    fn read_texture_u16(&self, addr: u32) -> u16 {
        read_u16_le(&self.texture, addr as usize & (TEXTURE_LEN - 2))
    }

    #[inline]
    fn read_palette_u16(&self, addr: u32) -> u16 {
        read_u16_le(&self.tex_pal, addr as usize & (TEX_PAL_LEN - 2))
    }
}

/// Source of texture VRAM contents with dirty region tracking.
///
/// Renderers call [`derive_state`](Self::derive_state) once per frame, then
/// [`make_coherent`](Self::make_coherent) with the result before reading through
/// [`flat`](Self::flat).
pub trait VramSource {
    fn derive_state(&mut self) -> DirtyRegions;
    fn make_coherent(&mut self, dirty: DirtyRegions);
    fn flat(&self) -> &FlatVram;
}

/// A [`VramSource`] backed by plain buffers, written to directly.
pub struct VramSnapshot {
    texture: Box<[u8]>,
    tex_pal: Box<[u8]>,
    pending: DirtyRegions,
    flat: FlatVram,
}

impl Default for VramSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl VramSnapshot {
    pub fn new() -> Self {
        VramSnapshot {
            texture: zeroed_boxed_slice(TEXTURE_LEN),
            tex_pal: zeroed_boxed_slice(TEX_PAL_LEN),
            pending: DirtyRegions::ALL,
            flat: FlatVram::new(),
        }
    }

    pub fn write_texture(&mut self, addr: u32, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        let start = addr as usize & (TEXTURE_LEN - 1);
        let end = (start + data.len()).min(TEXTURE_LEN);
        self.texture[start..end].copy_from_slice(&data[..end - start]);
        self.pending.mark_texture(start..end);
    }

    pub fn write_tex_pal(&mut self, addr: u32, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        let start = addr as usize & (TEX_PAL_LEN - 1);
        let end = (start + data.len()).min(TEX_PAL_LEN);
        self.tex_pal[start..end].copy_from_slice(&data[..end - start]);
        self.pending.mark_tex_pal(start..end);
    }
}

impl VramSource for VramSnapshot {
    fn derive_state(&mut self) -> DirtyRegions {
        core::mem::take(&mut self.pending)
    }

    fn make_coherent(&mut self, dirty: DirtyRegions) {
        self.flat.copy_regions(&self.texture, &self.tex_pal, dirty);
    }

    #[inline]
    fn flat(&self) -> &FlatVram {
        &self.flat
    }
}
