use crate::{key::RenderKey, utils::shift_depth, RenderSettings};
use core::ops::Range;
use hires_core::gpu::engine_3d::{Polygon, ScreenVertex};
use hires_texture::ReplacementImage;
use std::sync::Arc;

/// A vertex as read by the scene shaders.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [u16; 2],
    /// Depth after [`shift_depth`] and the W value.
    pub depth_w: [u16; 2],
    /// RGB halved from 9 to 8 bits, followed by the polygon's 5-bit alpha.
    pub color: [u8; 4],
    pub uv: [i16; 2],
    /// Polygon attributes with facing (bit 8), W-buffering (bit 9) and the depth shift
    /// (bits 16-20) merged in.
    pub attrs: u32,
    pub tex_params: u32,
    pub tex_palette_base: u32,
}

impl Vertex {
    pub const ATTRS_FRONT_FACING: u32 = 1 << 8;
    pub const ATTRS_W_BUFFERING: u32 = 1 << 9;
    pub const ATTRS_DEPTH_SHIFT_SHIFT: u32 = 16;
    pub const POLY_ATTRS_MASK: u32 = 0x3F00_C8F0;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Primitive {
    Triangles,
    Lines,
}

/// A polygon as seen by the batching and pass logic.
#[derive(Clone, Debug)]
pub struct RendererPolygon {
    pub key: RenderKey,
    pub prim: Primitive,
    pub id: u8,
    pub indices: Range<u32>,
    pub edge_indices: Range<u32>,
    pub replacement: Option<Arc<ReplacementImage>>,
}

/// Expands a frame's polygons into vertex and index streams.
#[derive(Default)]
pub struct PolygonPreparer {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub edge_indices: Vec<u32>,
    pub polys: Vec<RendererPolygon>,
}

struct PolySetup<'a> {
    poly: &'a Polygon,
    vert_ram: &'a [ScreenVertex],
    attrs: u32,
    scale_factor: u32,
}

impl PolySetup<'_> {
    fn vertex(&self, i: usize) -> Vertex {
        let screen_vert = self
            .vert_ram
            .get(self.poly.vertices[i] as usize)
            .copied()
            .unwrap_or_default();
        let (z, z_shift) = shift_depth(self.poly.depth_values[i]);
        let position = if self.scale_factor > 1 {
            screen_vert
                .hi_res_coords
                .map(|c| ((c as u32 * self.scale_factor) >> 4).min(0xFFFF) as u16)
        } else {
            screen_vert.coords
        };
        let [r, g, b] = screen_vert.color.map(|c| (c >> 1) as u8);
        Vertex {
            position,
            depth_w: [z, self.poly.w_values[i]],
            color: [r, g, b, self.poly.attrs.alpha()],
            uv: screen_vert.uv,
            attrs: self.attrs | (z_shift as u32) << Vertex::ATTRS_DEPTH_SHIFT_SHIFT,
            tex_params: self.poly.tex_params.0,
            tex_palette_base: self.poly.tex_palette_base as u32,
        }
    }

    /// Builds a vertex at the perspective-correct center of the polygon.
    fn center_vertex(&self, w_buffering: bool) -> Vertex {
        let len = self.poly.vertices().len();
        let (mut x, mut y) = (0_u32, 0_u32);
        let (mut z, mut w) = (0_f32, 0_f32);
        let mut color = [0_f32; 3];
        let mut uv = [0_f32; 2];

        for i in 0..len {
            let vert = self
                .vert_ram
                .get(self.poly.vertices[i] as usize)
                .copied()
                .unwrap_or_default();
            x += vert.hi_res_coords[0] as u32;
            y += vert.hi_res_coords[1] as u32;

            let weight = self.poly.w_values[i].max(1) as f32 * len as f32;
            w += 1.0 / weight;
            if w_buffering {
                z += self.poly.depth_values[i] as f32 / weight;
            } else {
                z += self.poly.depth_values[i] as f32;
            }
            for (dst, src) in color.iter_mut().zip(vert.color) {
                *dst += (src >> 1) as f32 / weight;
            }
            for (dst, src) in uv.iter_mut().zip(vert.uv) {
                *dst += src as f32 / weight;
            }
        }

        x /= len as u32;
        y /= len as u32;
        let w = 1.0 / w;
        if w_buffering {
            z *= w;
        } else {
            z /= len as f32;
        }

        let (z, z_shift) = shift_depth(z as u32);
        let [r, g, b] = color.map(|c| (c * w) as u8);
        Vertex {
            position: [x, y].map(|c| ((c * self.scale_factor) >> 4).min(0xFFFF) as u16),
            depth_w: [z, (w as u32).min(0xFFFF) as u16],
            color: [r, g, b, self.poly.attrs.alpha()],
            uv: uv.map(|c| (c * w) as i16),
            attrs: self.attrs | (z_shift as u32) << Vertex::ATTRS_DEPTH_SHIFT_SHIFT,
            tex_params: self.poly.tex_params.0,
            tex_palette_base: self.poly.tex_palette_base as u32,
        }
    }
}

impl PolygonPreparer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
        self.edge_indices.clear();
        self.polys.clear();
    }

    /// Rebuilds the vertex and index streams for `polys`, skipping degenerate polygons.
    /// `replacement` resolves the bound replacement of textured polygons.
    pub fn prepare(
        &mut self,
        vert_ram: &[ScreenVertex],
        polys: &[Polygon],
        w_buffering: bool,
        settings: &RenderSettings,
        mut replacement: impl FnMut(&Polygon) -> Option<Arc<ReplacementImage>>,
    ) {
        self.clear();

        for poly in polys {
            if poly.is_degenerate || poly.vertices_len == 0 || poly.vertices_len > 10 {
                continue;
            }

            let key = RenderKey::new(poly);
            let replacement = if poly.tex_params.format() != 0 {
                replacement(poly)
            } else {
                None
            };

            let mut attrs = poly.attrs.0 & Vertex::POLY_ATTRS_MASK;
            if poly.is_front_facing {
                attrs |= Vertex::ATTRS_FRONT_FACING;
            }
            if w_buffering {
                attrs |= Vertex::ATTRS_W_BUFFERING;
            }
            let setup = PolySetup {
                poly,
                vert_ram,
                attrs,
                scale_factor: settings.scale_factor as u32,
            };

            let indices_start = self.indices.len() as u32;
            let first = self.vertices.len() as u32;
            let len = poly.vertices().len();

            let prim = if poly.is_line {
                let mut last_coords = None;
                for i in 0..len {
                    let coords = vert_ram
                        .get(poly.vertices[i] as usize)
                        .map(|vert| vert.coords);
                    if i > 0 && coords == last_coords {
                        continue;
                    }
                    last_coords = coords;
                    self.indices.push(self.vertices.len() as u32);
                    self.vertices.push(setup.vertex(i));
                    if self.vertices.len() as u32 - first >= 2 {
                        break;
                    }
                }
                Primitive::Lines
            } else if len == 3 {
                for i in 0..3 {
                    self.vertices.push(setup.vertex(i));
                }
                self.indices.extend_from_slice(&[first, first + 1, first + 2]);
                Primitive::Triangles
            } else if !settings.better_polygons {
                for i in 0..len {
                    let vidx = self.vertices.len() as u32;
                    self.vertices.push(setup.vertex(i));
                    if i >= 2 {
                        self.indices.extend_from_slice(&[first, vidx - 1, vidx]);
                    }
                }
                Primitive::Triangles
            } else {
                self.vertices.push(setup.center_vertex(w_buffering));
                for i in 0..len {
                    let vidx = self.vertices.len() as u32;
                    self.vertices.push(setup.vertex(i));
                    if i >= 1 {
                        self.indices.extend_from_slice(&[first, vidx - 1, vidx]);
                    }
                }
                let last = self.vertices.len() as u32 - 1;
                self.indices.extend_from_slice(&[first, last, first + 1]);
                Primitive::Triangles
            };

            // The outline only connects boundary vertices, never the synthesized center
            let boundary_start = if prim == Primitive::Triangles && len > 3 && settings.better_polygons
            {
                first + 1
            } else {
                first
            };
            let boundary_end = self.vertices.len() as u32;
            let edge_indices_start = self.edge_indices.len() as u32;
            for vidx in boundary_start..boundary_end - 1 {
                self.edge_indices.extend_from_slice(&[vidx, vidx + 1]);
            }
            self.edge_indices
                .extend_from_slice(&[boundary_end - 1, boundary_start]);

            self.polys.push(RendererPolygon {
                key,
                prim,
                id: poly.attrs.id(),
                indices: indices_start..self.indices.len() as u32,
                edge_indices: edge_indices_start..self.edge_indices.len() as u32,
                replacement,
            });
        }
    }
}
