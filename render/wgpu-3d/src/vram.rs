use core::ops::Range;
use hires_core::gpu::vram::{DirtyRegions, FlatVram, TEXTURE_LEN, TEX_PAL_LEN};

const ROW_TEXELS: u32 = 1024;
const TEXTURE_ROW_BYTES: u32 = ROW_TEXELS;
const TEX_PAL_ROW_BYTES: u32 = ROW_TEXELS * 2;

fn rows(range: Range<usize>, row_bytes: u32) -> Range<u32> {
    range.start as u32 / row_bytes..range.end as u32 / row_bytes
}

/// GPU copy of texture VRAM (one byte per texel) and palette VRAM (one halfword per texel),
/// updated one dirty region at a time.
pub(crate) struct GpuVram {
    texture: wgpu::Texture,
    tex_pal: wgpu::Texture,
    pub texture_view: wgpu::TextureView,
    pub tex_pal_view: wgpu::TextureView,
    uploaded: bool,
}

impl GpuVram {
    pub fn new(device: &wgpu::Device) -> Self {
        let create = |label: &str, format, len: usize, row_bytes: u32| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width: ROW_TEXELS,
                    height: len as u32 / row_bytes,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: wgpu::TextureUsages::COPY_DST | wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            })
        };

        let texture = create(
            "3D renderer texture VRAM",
            wgpu::TextureFormat::R8Uint,
            TEXTURE_LEN,
            TEXTURE_ROW_BYTES,
        );
        let tex_pal = create(
            "3D renderer texture palette VRAM",
            wgpu::TextureFormat::R16Uint,
            TEX_PAL_LEN,
            TEX_PAL_ROW_BYTES,
        );
        let texture_view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let tex_pal_view = tex_pal.create_view(&wgpu::TextureViewDescriptor::default());

        GpuVram {
            texture,
            tex_pal,
            texture_view,
            tex_pal_view,
            uploaded: false,
        }
    }

    pub fn upload(&mut self, queue: &wgpu::Queue, vram: &FlatVram, mut dirty: DirtyRegions) {
        if !self.uploaded {
            dirty = DirtyRegions::ALL;
            self.uploaded = true;
        }

        for range in dirty.texture_ranges() {
            write_rows(
                queue,
                &self.texture,
                rows(range.clone(), TEXTURE_ROW_BYTES),
                TEXTURE_ROW_BYTES,
                &vram.texture()[range],
            );
        }
        for range in dirty.tex_pal_ranges() {
            write_rows(
                queue,
                &self.tex_pal,
                rows(range.clone(), TEX_PAL_ROW_BYTES),
                TEX_PAL_ROW_BYTES,
                &vram.tex_pal()[range],
            );
        }
    }
}

fn write_rows(
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    rows: Range<u32>,
    row_bytes: u32,
    data: &[u8],
) {
    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d {
                x: 0,
                y: rows.start,
                z: 0,
            },
            aspect: wgpu::TextureAspect::All,
        },
        data,
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(row_bytes),
            rows_per_image: None,
        },
        wgpu::Extent3d {
            width: ROW_TEXELS,
            height: rows.end - rows.start,
            depth_or_array_layers: 1,
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn texture_regions_map_to_128_rows() {
        let ranges: Vec<_> = DirtyRegions {
            texture: 0b1010,
            tex_pal: 0,
        }
        .texture_ranges()
        .map(|range| rows(range, TEXTURE_ROW_BYTES))
        .collect();
        assert_eq!(ranges, [128..256, 384..512]);
    }

    #[test]
    fn palette_regions_map_to_8_rows() {
        let ranges: Vec<_> = DirtyRegions {
            texture: 0,
            tex_pal: 0b10_0001,
        }
        .tex_pal_ranges()
        .map(|range| rows(range, TEX_PAL_ROW_BYTES))
        .collect();
        assert_eq!(ranges, [0..8, 40..48]);
    }
}
