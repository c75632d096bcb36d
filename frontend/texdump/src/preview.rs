//! Renders a texture through the 3D renderer on a screen-filling quad and reads back the
//! native-resolution capture.

use hires_core::gpu::{
    engine_3d::{
        Polygon, PolygonAttrs, RenderingControl, RenderingState, ScreenVertex, TextureParams,
    },
    vram::VramSnapshot,
    SCREEN_HEIGHT, SCREEN_WIDTH,
};
use hires_texture::ReplacementConfig;
use hires_wgpu_3d::{FrameData, RenderSettings, Renderer};
use std::{fmt, sync::Arc};

#[derive(Debug)]
pub enum Error {
    NoAdapter,
    RequestDevice(wgpu::RequestDeviceError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NoAdapter => f.write_str("no compatible graphics adapter found"),
            Error::RequestDevice(err) => write!(f, "couldn't open graphics device: {err}"),
        }
    }
}

impl std::error::Error for Error {}

/// Expands a capture pixel (6-bit color, 5-bit alpha) back to RGBA8.
fn capture_to_rgba(pixel: u32) -> [u8; 4] {
    let expand_6 = |value: u32| ((value << 2 | value >> 4) & 0xFF) as u8;
    let a = pixel >> 24 & 0x1F;
    [
        expand_6(pixel & 0x3F),
        expand_6(pixel >> 8 & 0x3F),
        expand_6(pixel >> 16 & 0x3F),
        (a << 3 | a >> 2) as u8,
    ]
}

fn quad_frame(params: TextureParams, palette_base: u16) -> FrameData {
    let uv_max = [(params.width() << 4) as i16, (params.height() << 4) as i16];
    let corners = [
        ([0, 0], [0, 0]),
        ([SCREEN_WIDTH as u16, 0], [uv_max[0], 0]),
        ([SCREEN_WIDTH as u16, SCREEN_HEIGHT as u16], uv_max),
        ([0, SCREEN_HEIGHT as u16], [0, uv_max[1]]),
    ];
    let verts = corners.map(|(coords, uv)| ScreenVertex {
        coords,
        hi_res_coords: coords.map(|c| c << 4),
        uv,
        color: [0x1FF; 3],
    });

    let mut vertices = [0; 10];
    vertices[..4].copy_from_slice(&[0, 1, 2, 3]);
    let poly = Polygon {
        vertices,
        depth_values: [0x1000; 10],
        w_values: [0x1000; 10],
        vertices_len: 4,
        attrs: PolygonAttrs(0)
            .with_mode(PolygonAttrs::MODE_MODULATION)
            .with_show_front(true)
            .with_alpha(31),
        is_front_facing: true,
        is_translucent: matches!(params.format(), 1 | 6),
        tex_params: params,
        tex_palette_base: palette_base,
        ..Default::default()
    };

    let state = RenderingState {
        control: RenderingControl(0)
            .with_texture_mapping_enabled(true)
            .with_alpha_blending_enabled(true),
        ..Default::default()
    };

    let mut frame = FrameData::new();
    frame.prepare(&verts, &[poly], &state);
    frame
}

/// Returns the rendered frame as 256x192 RGBA8 pixels.
pub fn render(
    vram: &mut VramSnapshot,
    params: TextureParams,
    palette_base: u16,
    settings: RenderSettings,
    replacement_config: &ReplacementConfig,
    logger: &slog::Logger,
) -> Result<Vec<u8>, Error> {
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
    let adapter =
        pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions::default()))
            .ok_or(Error::NoAdapter)?;
    slog::debug!(logger, "Using adapter {}", adapter.get_info().name);
    let (device, queue) = pollster::block_on(adapter.request_device(
        &wgpu::DeviceDescriptor {
            label: Some("hires-texdump device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::default(),
        },
        None,
    ))
    .map_err(Error::RequestDevice)?;

    let mut renderer = Renderer::new(
        Arc::new(device),
        Arc::new(queue),
        settings,
        replacement_config,
        logger.clone(),
    );
    let command_buffer = renderer.render_frame(&quad_frame(params, palette_base), vram);
    renderer.queue().submit([command_buffer]);

    let mut rgba = Vec::with_capacity(SCREEN_WIDTH * SCREEN_HEIGHT * 4);
    for line in 0..SCREEN_HEIGHT {
        for pixel in renderer.read_capture_line(line) {
            rgba.extend_from_slice(&capture_to_rgba(pixel));
        }
    }
    Ok(rgba)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_pixels_expand_to_full_range() {
        assert_eq!(capture_to_rgba(0x1F3F_3F3F), [0xFF; 4]);
        assert_eq!(capture_to_rgba(0), [0; 4]);
        assert_eq!(capture_to_rgba(0x0000_0020), [0x82, 0, 0, 0]);
    }

    #[test]
    fn quad_covers_the_screen_and_whole_texture() {
        let params = TextureParams(0)
            .with_format(7)
            .with_size_shift_s(1)
            .with_size_shift_t(2);
        let frame = quad_frame(params, 0);
        assert_eq!(frame.poly_ram.len(), 1);
        assert_eq!(frame.poly_ram[0].vertices(), &[0, 1, 2, 3]);
        assert!(!frame.poly_ram[0].is_translucent);
        assert_eq!(frame.vert_ram[2].coords, [256, 192]);
        assert_eq!(frame.vert_ram[2].uv, [16 << 4, 32 << 4]);
        assert!(frame.state.control.texture_mapping_enabled());
    }
}
