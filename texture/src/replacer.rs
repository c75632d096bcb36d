use crate::{
    cache::{BindingKey, ReplacementCache, ReplacementImage, Signature},
    config::ReplacementConfig,
    dump::TextureDumper,
    hash::content_hash,
    image::decode_rgba_into,
    toggles::Features,
};
use ahash::AHashSet as HashSet;
use hires_core::gpu::{engine_3d::Polygon, vram::TextureMemory};
use std::sync::Arc;

/// Per-frame texture scan: hashes every texture referenced by a frame's polygons, binds the
/// matching replacements and dumps textures that weren't seen before.
pub struct TextureReplacer {
    cache: Arc<ReplacementCache>,
    dumper: TextureDumper,
    scanned: HashSet<BindingKey>,
    rgba: Vec<u8>,
    logger: slog::Logger,
}

impl TextureReplacer {
    pub fn new(config: &ReplacementConfig, logger: slog::Logger) -> Self {
        let cache = Arc::new(ReplacementCache::with_mod_dir(
            config.mod_dir(),
            logger.new(slog::o!("component" => "replacement_cache")),
        ));
        let dumper = TextureDumper::new(
            config.dump_dir(),
            logger.new(slog::o!("component" => "dumper")),
        );
        Self::with_parts(cache, dumper, logger)
    }

    pub fn with_parts(
        cache: Arc<ReplacementCache>,
        dumper: TextureDumper,
        logger: slog::Logger,
    ) -> Self {
        TextureReplacer {
            cache,
            dumper,
            scanned: HashSet::default(),
            rgba: Vec::new(),
            logger,
        }
    }

    #[inline]
    pub fn cache(&self) -> &Arc<ReplacementCache> {
        &self.cache
    }

    /// Rebuilds the replacement bindings for a frame and dumps its textures, depending on
    /// `features`.
    pub fn scan_frame(&mut self, polys: &[Polygon], mem: &impl TextureMemory, features: Features) {
        if features.replace {
            self.cache.clear_bindings();
        }
        if !features.any() {
            return;
        }

        self.scanned.clear();
        for poly in polys {
            if poly.is_degenerate || poly.tex_params.format() == 0 {
                continue;
            }
            let key = BindingKey::new(poly.tex_params, poly.tex_palette_base);
            if !self.scanned.insert(key) {
                continue;
            }

            let (width, height) =
                match decode_rgba_into(mem, poly.tex_params, poly.tex_palette_base, &mut self.rgba)
                {
                    Ok(size) => size,
                    Err(err) => {
                        slog::debug!(self.logger, "Skipping texture"; "error" => %err);
                        continue;
                    }
                };
            let signature = Signature {
                hash: content_hash(&self.rgba, width, height),
                format: poly.tex_params.format(),
                width,
                height,
            };

            if features.replace {
                if let Some(image) = self.cache.lookup_or_load(signature) {
                    self.cache.bind(key, &image);
                }
            }
            if features.dump {
                self.dumper.dump(signature, &self.rgba);
            }
        }
    }

    /// The replacement to draw `poly` with in the current frame.
    #[inline]
    pub fn bound_replacement(&self, poly: &Polygon) -> Option<Arc<ReplacementImage>> {
        if poly.tex_params.format() == 0 {
            return None;
        }
        self.cache
            .get_bound(&BindingKey::new(poly.tex_params, poly.tex_palette_base))
    }

    /// Forgets all loaded replacements and dumped signatures, e.g. when a new game is loaded.
    pub fn reset(&mut self) {
        self.cache.clear_all();
        self.dumper.reset_session();
        slog::info!(self.logger, "Texture replacement session reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cache::tests::{fake_cache, logger},
        decode::tests::vram_with,
    };
    use core::sync::atomic::Ordering;
    use hires_core::gpu::{
        engine_3d::{PolygonAttrs, TextureParams},
        vram::{VramSnapshot, VramSource},
    };

    const REPLACE: Features = Features {
        replace: true,
        dump: false,
    };

    fn textured_poly(vram_off: u16) -> Polygon {
        Polygon {
            vertices_len: 3,
            attrs: PolygonAttrs(0).with_alpha(31),
            tex_params: TextureParams(0).with_format(7).with_vram_off(vram_off),
            ..Polygon::default()
        }
    }

    /// Finds a direct color fill whose content hash is even, so the fake source serves it.
    fn vram_with_replaceable_texture() -> VramSnapshot {
        (0..0x100_u16)
            .map(|color| {
                let texels: Vec<u8> = (0..64).flat_map(|_| (color | 0x8000).to_le_bytes()).collect();
                vram_with(&[(0, &texels)], &[])
            })
            .find(|vram| {
                let mut rgba = Vec::new();
                let params = textured_poly(0).tex_params;
                let (w, h) = decode_rgba_into(vram.flat(), params, 0, &mut rgba).unwrap();
                content_hash(&rgba, w, h) & 1 == 0
            })
            .unwrap()
    }

    fn replacer() -> (
        TextureReplacer,
        Arc<core::sync::atomic::AtomicUsize>,
        tempfile::TempDir,
    ) {
        let (cache, loads) = fake_cache();
        let dir = tempfile::tempdir().unwrap();
        let replacer = TextureReplacer::with_parts(
            Arc::new(cache),
            TextureDumper::new(dir.path().join("dump"), logger()),
            logger(),
        );
        (replacer, loads, dir)
    }

    #[test]
    fn binds_replacements_for_textured_polygons() {
        let vram = vram_with_replaceable_texture();
        let (mut replacer, loads, _dir) = replacer();
        let polys = [textured_poly(0), textured_poly(0), Polygon::default()];

        replacer.scan_frame(&polys, vram.flat(), REPLACE);
        let image = replacer.bound_replacement(&polys[0]).unwrap();
        assert_eq!((image.width(), image.height()), (16, 32));
        assert!(replacer.bound_replacement(&polys[2]).is_none());
        assert_eq!(loads.load(Ordering::Relaxed), 1);

        replacer.scan_frame(&polys, vram.flat(), REPLACE);
        assert_eq!(loads.load(Ordering::Relaxed), 1);
        assert_eq!(replacer.bound_replacement(&polys[0]).unwrap().id(), image.id());
    }

    #[test]
    fn bindings_only_last_one_frame() {
        let vram = vram_with_replaceable_texture();
        let (mut replacer, _, _dir) = replacer();
        let polys = [textured_poly(0)];

        replacer.scan_frame(&polys, vram.flat(), REPLACE);
        assert!(replacer.bound_replacement(&polys[0]).is_some());

        replacer.scan_frame(&[], vram.flat(), REPLACE);
        assert!(replacer.bound_replacement(&polys[0]).is_none());
    }

    #[test]
    fn degenerate_polygons_are_skipped() {
        let vram = vram_with_replaceable_texture();
        let (mut replacer, loads, _dir) = replacer();
        let polys = [Polygon {
            is_degenerate: true,
            ..textured_poly(0)
        }];
        replacer.scan_frame(&polys, vram.flat(), REPLACE);
        assert_eq!(loads.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn dumping_writes_each_texture_once() {
        let vram = vram_with_replaceable_texture();
        let root = tempfile::tempdir().unwrap();
        let (cache, loads) = fake_cache();
        let mut replacer = TextureReplacer::with_parts(
            Arc::new(cache),
            TextureDumper::new(root.path().join("dump"), logger()),
            logger(),
        );
        let features = Features {
            replace: false,
            dump: true,
        };

        replacer.scan_frame(&[textured_poly(0)], vram.flat(), features);
        assert_eq!(loads.load(Ordering::Relaxed), 0);
        let files: Vec<_> = std::fs::read_dir(root.path().join("dump"))
            .unwrap()
            .collect();
        assert_eq!(files.len(), 1);

        replacer.reset();
        assert_eq!(replacer.cache().loaded_len(), 0);
    }
}
