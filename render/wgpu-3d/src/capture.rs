use hires_core::gpu::{SCREEN_HEIGHT, SCREEN_WIDTH};
use slog::{error, Logger};
use std::sync::mpsc;

/// Converts an RGBA8 pixel to the 6-bit-per-channel layout used for capture, with the 5 top bits
/// of alpha in bits 24-28.
#[inline]
pub fn convert_pixel(rgba: u32) -> u32 {
    (rgba & 0xFC_FCFC) >> 2 | (rgba >> 24 & 0xF8) << 21
}

/// Native-resolution copy of the last rendered frame, readable line by line on the CPU.
pub(crate) struct Capture {
    view: wgpu::TextureView,
    texture: wgpu::Texture,
    buffer: wgpu::Buffer,
    lines: Box<[u32]>,
    needs_readback: bool,
}

impl Capture {
    pub const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
    const BYTES_PER_ROW: u32 = SCREEN_WIDTH as u32 * 4;

    pub fn new(device: &wgpu::Device) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("3D renderer capture"),
            size: wgpu::Extent3d {
                width: SCREEN_WIDTH as u32,
                height: SCREEN_HEIGHT as u32,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("3D renderer capture view"),
            ..wgpu::TextureViewDescriptor::default()
        });

        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("3D renderer capture readback"),
            size: (Self::BYTES_PER_ROW as usize * SCREEN_HEIGHT) as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        Capture {
            view,
            texture,
            buffer,
            lines: vec![0; SCREEN_WIDTH * SCREEN_HEIGHT].into_boxed_slice(),
            needs_readback: false,
        }
    }

    /// Records the downscale into the capture texture and its copy into the readback buffer.
    pub fn encode(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        pipeline: &wgpu::RenderPipeline,
        color_bg: &wgpu::BindGroup,
    ) {
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("3D renderer capture downscale pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            render_pass.set_pipeline(pipeline);
            render_pass.set_bind_group(0, color_bg, &[]);
            render_pass.draw(0..4, 0..1);
        }

        encoder.copy_texture_to_buffer(
            self.texture.as_image_copy(),
            wgpu::ImageCopyBuffer {
                buffer: &self.buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(Self::BYTES_PER_ROW),
                    rows_per_image: None,
                },
            },
            self.texture.size(),
        );
        self.needs_readback = true;
    }

    fn read_back(&mut self, device: &wgpu::Device, logger: &Logger) {
        let slice = self.buffer.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        device.poll(wgpu::Maintain::Wait);

        match rx.recv() {
            Ok(Ok(())) => {
                {
                    let data = slice.get_mapped_range();
                    for (dst, src) in self.lines.iter_mut().zip(data.chunks_exact(4)) {
                        *dst = convert_pixel(u32::from_le_bytes([src[0], src[1], src[2], src[3]]));
                    }
                }
                self.buffer.unmap();
            }
            Ok(Err(err)) => error!(logger, "Couldn't map capture buffer: {}", err),
            Err(_) => error!(logger, "Capture buffer mapping was dropped"),
        }
    }

    /// Returns a converted line of the last frame. Reading line 0 fetches the frame from the GPU.
    pub fn read_line(&mut self, device: &wgpu::Device, line: usize, logger: &Logger) -> [u32; 256] {
        if line == 0 && self.needs_readback {
            self.needs_readback = false;
            self.read_back(device, logger);
        }
        let start = line.min(SCREEN_HEIGHT - 1) * SCREEN_WIDTH;
        let mut result = [0; SCREEN_WIDTH];
        result.copy_from_slice(&self.lines[start..start + SCREEN_WIDTH]);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixels_are_reduced_to_6_bits() {
        assert_eq!(convert_pixel(0xFF_FF_FF_FF), 0x1F3F_3F3F);
        assert_eq!(convert_pixel(0x00_04_08_0C), 0x0001_0203);
        assert_eq!(convert_pixel(0x00_03_03_03), 0);
    }

    #[test]
    fn alpha_keeps_its_top_5_bits() {
        assert_eq!(convert_pixel(0x80_00_00_00), 0x1000_0000);
        assert_eq!(convert_pixel(0x07_00_00_00), 0);
    }
}
