use hires_core::gpu::engine_3d::Color;

#[inline]
pub fn round_up_to_alignment(size: usize, alignment: usize) -> usize {
    size.div_ceil(alignment) * alignment
}

/// Shifts a depth value right until it fits in 16 bits, returning the shifted value and the
/// shift amount.
#[inline]
pub fn shift_depth(mut depth: u32) -> (u16, u8) {
    let mut shift = 0;
    while depth > 0xFFFF {
        depth >>= 1;
        shift += 1;
    }
    (depth as u16, shift)
}

#[inline]
pub fn color_to_wgpu_f64(color: Color) -> wgpu::Color {
    let [r, g, b, a] = [color.r, color.g, color.b, color.a].map(|c| c as f64 / 31.0);
    wgpu::Color { r, g, b, a }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_shift() {
        assert_eq!(shift_depth(0x1234), (0x1234, 0));
        assert_eq!(shift_depth(0xFFFF), (0xFFFF, 0));
        assert_eq!(shift_depth(0x1_0000), (0x8000, 1));
        assert_eq!(shift_depth(0xFF_FFFF), (0xFFFF, 8));
    }

    #[test]
    fn colors_are_normalized() {
        let color = color_to_wgpu_f64(Color::new(0, 31, 0, 31));
        assert_eq!((color.g, color.a), (1.0, 1.0));
    }

    #[test]
    fn alignment() {
        assert_eq!(round_up_to_alignment(0, 256), 0);
        assert_eq!(round_up_to_alignment(1, 256), 256);
        assert_eq!(round_up_to_alignment(1024, 256), 1024);
    }
}
