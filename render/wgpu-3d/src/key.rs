use hires_core::gpu::engine_3d::Polygon;

/// Groups polygons that can share a draw call and pipeline state. Only equality is meaningful.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RenderKey {
    ShadowMask {
        depth_test_equal: bool,
    },
    Opaque {
        depth_test_equal: bool,
        wireframe: bool,
        id: u8,
    },
    Translucent {
        depth_test_equal: bool,
        shadow: bool,
        depth_write: bool,
        fog: bool,
        needs_opaque: bool,
        id: u8,
    },
}

impl RenderKey {
    pub fn new(poly: &Polygon) -> Self {
        let attrs = poly.attrs;
        let depth_test_equal = attrs.depth_test_equal();
        if poly.is_shadow_mask() {
            RenderKey::ShadowMask { depth_test_equal }
        } else if poly.is_translucent {
            RenderKey::Translucent {
                depth_test_equal,
                shadow: poly.is_shadow(),
                depth_write: attrs.update_depth_for_translucent(),
                fog: attrs.fog_enabled(),
                needs_opaque: attrs.alpha() == 31,
                id: attrs.id(),
            }
        } else {
            RenderKey::Opaque {
                depth_test_equal,
                wireframe: attrs.alpha() == 0,
                id: attrs.id(),
            }
        }
    }

    #[inline]
    pub fn is_shadow_mask(self) -> bool {
        matches!(self, RenderKey::ShadowMask { .. })
    }

    #[inline]
    pub fn is_translucent(self) -> bool {
        matches!(self, RenderKey::Translucent { .. })
    }

    #[inline]
    pub fn is_opaque(self) -> bool {
        matches!(self, RenderKey::Opaque { .. })
    }

    /// Whether a translucent polygon has maximum alpha and has to be drawn as opaque first.
    #[inline]
    pub fn needs_opaque(self) -> bool {
        matches!(
            self,
            RenderKey::Translucent {
                needs_opaque: true,
                ..
            }
        )
    }

    #[inline]
    pub fn is_shadow(self) -> bool {
        matches!(self, RenderKey::Translucent { shadow: true, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hires_core::gpu::engine_3d::{PolygonAttrs, TextureParams};

    fn poly(attrs: PolygonAttrs, translucent: bool) -> Polygon {
        Polygon {
            vertices_len: 3,
            attrs,
            is_translucent: translucent,
            ..Polygon::default()
        }
    }

    #[test]
    fn irrelevant_fields_dont_split_groups() {
        let attrs = PolygonAttrs(0).with_alpha(31).with_id(7);
        let a = poly(attrs, false);
        let mut b = poly(attrs.with_lights_mask(0xF).with_show_back(true), false);
        b.tex_params = TextureParams(0).with_format(3);
        b.depth_values = [0x1234; 10];
        assert_eq!(RenderKey::new(&a), RenderKey::new(&b));
    }

    #[test]
    fn opaque_keys() {
        let attrs = PolygonAttrs(0).with_alpha(31).with_id(7);
        let key = RenderKey::new(&poly(attrs, false));
        assert!(key.is_opaque());
        assert_ne!(key, RenderKey::new(&poly(attrs.with_id(8), false)));
        assert_ne!(
            key,
            RenderKey::new(&poly(attrs.with_depth_test_equal(true), false))
        );
        assert_eq!(
            RenderKey::new(&poly(attrs.with_alpha(0), false)),
            RenderKey::Opaque {
                depth_test_equal: false,
                wireframe: true,
                id: 7,
            }
        );
    }

    #[test]
    fn translucent_keys() {
        let attrs = PolygonAttrs(0).with_alpha(16).with_id(3);
        let key = RenderKey::new(&poly(attrs, true));
        assert!(key.is_translucent() && !key.needs_opaque() && !key.is_shadow());
        assert_ne!(
            key,
            RenderKey::new(&poly(attrs.with_update_depth_for_translucent(true), true))
        );
        assert_ne!(key, RenderKey::new(&poly(attrs.with_fog_enabled(true), true)));
        assert!(RenderKey::new(&poly(attrs.with_alpha(31), true)).needs_opaque());

        let shadow = RenderKey::new(&poly(attrs.with_mode(PolygonAttrs::MODE_SHADOW), true));
        assert!(shadow.is_shadow());
    }

    #[test]
    fn shadow_masks_take_precedence() {
        let attrs = PolygonAttrs(0)
            .with_alpha(16)
            .with_mode(PolygonAttrs::MODE_SHADOW);
        let key = RenderKey::new(&poly(attrs, true));
        assert_eq!(
            key,
            RenderKey::ShadowMask {
                depth_test_equal: false
            }
        );
        // Only the depth test selector is kept for shadow masks
        assert_eq!(key, RenderKey::new(&poly(attrs.with_alpha(20), true)));
    }
}
