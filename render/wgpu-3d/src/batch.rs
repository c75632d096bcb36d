use crate::prepare::{Primitive, RendererPolygon};
use core::ops::Range;
use hires_texture::ReplacementImage;
use std::sync::Arc;

/// One indexed draw covering a run of consecutive polygons.
#[derive(Clone, Debug)]
pub struct Draw {
    pub prim: Primitive,
    pub polys: Range<usize>,
    pub indices: Range<u32>,
    /// Whether `indices` refers to the outline index stream instead of the fill one.
    pub edges: bool,
    pub replacement: Option<Arc<ReplacementImage>>,
}

impl Draw {
    /// The number of polygons folded into this draw.
    #[inline]
    pub fn polys_len(&self) -> usize {
        self.polys.len()
    }

    #[inline]
    pub fn indices_len(&self) -> u32 {
        self.indices.end - self.indices.start
    }
}

#[inline]
fn same_replacement(a: &Option<Arc<ReplacementImage>>, b: &Option<Arc<ReplacementImage>>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.id() == b.id(),
        _ => false,
    }
}

/// Merges the polygons starting at `start` that share primitive type, render key and (if
/// `replace_active`) replacement into one draw.
pub fn merge_run(polys: &[RendererPolygon], start: usize, replace_active: bool) -> Draw {
    let first = &polys[start];
    let end = polys[start + 1..]
        .iter()
        .position(|poly| {
            poly.prim != first.prim
                || poly.key != first.key
                || (replace_active && !same_replacement(&poly.replacement, &first.replacement))
        })
        .map_or(polys.len(), |offset| start + 1 + offset);
    Draw {
        prim: first.prim,
        polys: start..end,
        indices: first.indices.start..polys[end - 1].indices.end,
        edges: false,
        replacement: if replace_active {
            first.replacement.clone()
        } else {
            None
        },
    }
}

/// Merges the outlines of the polygons starting at `start` that share the render key. Outlines
/// are never textured, so replacements don't split runs.
pub fn merge_edge_run(polys: &[RendererPolygon], start: usize) -> Draw {
    let first = &polys[start];
    let end = polys[start + 1..]
        .iter()
        .position(|poly| poly.key != first.key)
        .map_or(polys.len(), |offset| start + 1 + offset);
    Draw {
        prim: Primitive::Lines,
        polys: start..end,
        indices: first.edge_indices.start..polys[end - 1].edge_indices.end,
        edges: true,
        replacement: None,
    }
}

pub fn draw_single(polys: &[RendererPolygon], i: usize, replace_active: bool) -> Draw {
    let poly = &polys[i];
    Draw {
        prim: poly.prim,
        polys: i..i + 1,
        indices: poly.indices.clone(),
        edges: false,
        replacement: if replace_active {
            poly.replacement.clone()
        } else {
            None
        },
    }
}
