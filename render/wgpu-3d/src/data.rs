use hires_core::gpu::engine_3d::{Polygon, RenderingState, ScreenVertex};

pub const MAX_VERTICES: usize = 6144;
pub const MAX_POLYGONS: usize = 2048;

/// Geometry and register state for one frame, as handed over by the geometry engine.
#[derive(Clone, Debug, Default)]
pub struct FrameData {
    pub state: RenderingState,
    pub vert_ram: Vec<ScreenVertex>,
    pub poly_ram: Vec<Polygon>,
}

impl FrameData {
    pub fn new() -> Self {
        FrameData {
            state: RenderingState::default(),
            vert_ram: Vec::with_capacity(MAX_VERTICES),
            poly_ram: Vec::with_capacity(MAX_POLYGONS),
        }
    }

    /// Replaces the frame contents, truncating to the hardware's vertex and polygon RAM sizes.
    pub fn prepare(
        &mut self,
        vert_ram: &[ScreenVertex],
        poly_ram: &[Polygon],
        state: &RenderingState,
    ) {
        self.state.clone_from(state);

        self.vert_ram.clear();
        self.vert_ram
            .extend_from_slice(&vert_ram[..vert_ram.len().min(MAX_VERTICES)]);
        self.poly_ram.clear();
        self.poly_ram
            .extend_from_slice(&poly_ram[..poly_ram.len().min(MAX_POLYGONS)]);
    }

    #[inline]
    pub fn has_translucent_polys(&self) -> bool {
        self.poly_ram
            .iter()
            .any(|poly| !poly.is_degenerate && (poly.is_translucent || poly.is_shadow_mask()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hires_core::gpu::engine_3d::PolygonAttrs;

    #[test]
    fn prepare_truncates_to_ram_sizes() {
        let mut frame = FrameData::new();
        let verts = vec![ScreenVertex::default(); MAX_VERTICES + 10];
        let polys = vec![Polygon::default(); 3];
        frame.prepare(&verts, &polys, &RenderingState::default());
        assert_eq!(frame.vert_ram.len(), MAX_VERTICES);
        assert_eq!(frame.poly_ram.len(), 3);
    }

    #[test]
    fn translucent_presence() {
        let mut frame = FrameData::new();
        let opaque = Polygon {
            vertices_len: 3,
            attrs: PolygonAttrs(0).with_alpha(31).with_id(1),
            ..Polygon::default()
        };
        frame.prepare(&[], &[opaque], &RenderingState::default());
        assert!(!frame.has_translucent_polys());

        let degenerate_trans = Polygon {
            is_translucent: true,
            is_degenerate: true,
            ..opaque
        };
        frame.prepare(&[], &[opaque, degenerate_trans], &RenderingState::default());
        assert!(!frame.has_translucent_polys());

        let mask = Polygon {
            attrs: PolygonAttrs(0).with_mode(PolygonAttrs::MODE_SHADOW),
            ..opaque
        };
        frame.prepare(&[], &[opaque, mask], &RenderingState::default());
        assert!(frame.has_translucent_polys());
    }
}
