//! Content-addressed store of replacement images and the per-frame bindings that point into it.

use crate::codec::{self, LoadError, RgbaImage};
use ahash::AHashMap as HashMap;
use core::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};
use hires_core::gpu::engine_3d::TextureParams;
use parking_lot::Mutex;
use std::{
    path::PathBuf,
    sync::{Arc, Weak},
};

/// Identifies a unique replacement asset: the hash of the original texture's contents, plus its
/// format and original size.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Signature {
    pub hash: u64,
    pub format: u8,
    pub width: u16,
    pub height: u16,
}

impl Signature {
    pub fn file_name(&self) -> String {
        format!(
            "{:016X}_fmt{}_{}x{}.png",
            self.hash, self.format, self.width, self.height
        )
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:016X} (format {}, {}x{})",
            self.hash, self.format, self.width, self.height
        )
    }
}

/// A specific texture reference in VRAM, as seen by a polygon.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BindingKey {
    pub vram_addr: u32,
    pub params: TextureParams,
    pub palette_base: u16,
}

impl BindingKey {
    #[inline]
    pub fn new(params: TextureParams, palette_base: u16) -> Self {
        BindingKey {
            vram_addr: params.vram_addr(),
            params,
            palette_base,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReplacementId(u64);

impl ReplacementId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        ReplacementId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

pub struct ReplacementImage {
    id: ReplacementId,
    width: u32,
    height: u32,
    scale: [f32; 2],
    rgba: Box<[u8]>,
}

impl fmt::Debug for ReplacementImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplacementImage")
            .field("id", &self.id)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("scale", &self.scale)
            .finish_non_exhaustive()
    }
}

impl ReplacementImage {
    pub fn new(image: RgbaImage, orig_width: u16, orig_height: u16) -> Self {
        ReplacementImage {
            id: ReplacementId::next(),
            width: image.width,
            height: image.height,
            scale: [
                image.width as f32 / orig_width as f32,
                image.height as f32 / orig_height as f32,
            ],
            rgba: image.pixels.into_boxed_slice(),
        }
    }

    #[inline]
    pub fn id(&self) -> ReplacementId {
        self.id
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Size relative to the original hardware texture.
    #[inline]
    pub fn scale(&self) -> [f32; 2] {
        self.scale
    }

    #[inline]
    pub fn rgba(&self) -> &[u8] {
        &self.rgba
    }
}

/// Where replacement images come from.
pub trait ImageSource: Send + Sync {
    fn load(&self, signature: &Signature) -> Result<RgbaImage, LoadError>;
}

/// Loads `{hash:016X}_fmt{format}_{width}x{height}.png` files from a directory.
pub struct ModDirectory {
    path: PathBuf,
}

impl ModDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ModDirectory { path: path.into() }
    }
}

impl ImageSource for ModDirectory {
    fn load(&self, signature: &Signature) -> Result<RgbaImage, LoadError> {
        codec::load_png(&self.path.join(signature.file_name()))
    }
}

#[derive(Default)]
struct Tables {
    by_signature: HashMap<Signature, Arc<ReplacementImage>>,
    bindings: HashMap<BindingKey, Weak<ReplacementImage>>,
}

/// Both tables sit behind one lock, which is also held while loading so concurrent lookups of
/// the same signature load it only once.
pub struct ReplacementCache {
    source: Box<dyn ImageSource>,
    tables: Mutex<Tables>,
    logger: slog::Logger,
}

impl ReplacementCache {
    pub fn new(source: Box<dyn ImageSource>, logger: slog::Logger) -> Self {
        ReplacementCache {
            source,
            tables: Mutex::new(Tables::default()),
            logger,
        }
    }

    pub fn with_mod_dir(path: impl Into<PathBuf>, logger: slog::Logger) -> Self {
        Self::new(Box::new(ModDirectory::new(path)), logger)
    }

    /// Returns the replacement for `signature`, loading it on first use. Missing or unreadable
    /// assets yield `None` and are retried on the next lookup.
    pub fn lookup_or_load(&self, signature: Signature) -> Option<Arc<ReplacementImage>> {
        let mut tables = self.tables.lock();
        if let Some(image) = tables.by_signature.get(&signature) {
            return Some(Arc::clone(image));
        }

        match self.source.load(&signature) {
            Ok(image) => {
                let image = Arc::new(ReplacementImage::new(
                    image,
                    signature.width,
                    signature.height,
                ));
                slog::info!(
                    self.logger,
                    "Loaded replacement texture";
                    "signature" => %signature,
                    "width" => image.width,
                    "height" => image.height
                );
                tables.by_signature.insert(signature, Arc::clone(&image));
                Some(image)
            }
            Err(err) => {
                if !err.is_not_found() {
                    slog::debug!(
                        self.logger,
                        "Couldn't load replacement texture";
                        "signature" => %signature,
                        "error" => %err
                    );
                }
                None
            }
        }
    }

    /// Returns the image bound to `key` in the current frame, if it's still owned by the store.
    pub fn get_bound(&self, key: &BindingKey) -> Option<Arc<ReplacementImage>> {
        self.tables.lock().bindings.get(key).and_then(Weak::upgrade)
    }

    pub fn bind(&self, key: BindingKey, image: &Arc<ReplacementImage>) {
        self.tables
            .lock()
            .bindings
            .insert(key, Arc::downgrade(image));
    }

    pub fn clear_bindings(&self) {
        self.tables.lock().bindings.clear();
    }

    pub fn clear_all(&self) {
        let mut tables = self.tables.lock();
        tables.by_signature.clear();
        tables.bindings.clear();
    }

    pub fn loaded_len(&self) -> usize {
        self.tables.lock().by_signature.len()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use core::sync::atomic::AtomicUsize;

    pub(crate) fn logger() -> slog::Logger {
        slog::Logger::root(slog::Discard, slog::o!())
    }

    /// Serves solid-color images for every signature whose hash is even.
    pub(crate) struct FakeSource {
        pub loads: Arc<AtomicUsize>,
    }

    impl ImageSource for FakeSource {
        fn load(&self, signature: &Signature) -> Result<RgbaImage, LoadError> {
            self.loads.fetch_add(1, Ordering::Relaxed);
            if signature.hash & 1 != 0 {
                return Err(LoadError::Io(std::io::ErrorKind::NotFound.into()));
            }
            let (width, height) = (signature.width as u32 * 2, signature.height as u32 * 4);
            Ok(RgbaImage {
                width,
                height,
                pixels: vec![0x80; (width * height * 4) as usize],
            })
        }
    }

    pub(crate) fn fake_cache() -> (ReplacementCache, Arc<AtomicUsize>) {
        let loads = Arc::new(AtomicUsize::new(0));
        let cache = ReplacementCache::new(
            Box::new(FakeSource {
                loads: Arc::clone(&loads),
            }),
            logger(),
        );
        (cache, loads)
    }

    fn signature(hash: u64) -> Signature {
        Signature {
            hash,
            format: 3,
            width: 16,
            height: 8,
        }
    }

    fn key(vram_off: u16) -> BindingKey {
        BindingKey::new(TextureParams(0).with_vram_off(vram_off).with_format(3), 2)
    }

    #[test]
    fn file_names() {
        let signature = Signature {
            hash: 0xDEAD_BEEF,
            format: 5,
            width: 128,
            height: 64,
        };
        assert_eq!(signature.file_name(), "00000000DEADBEEF_fmt5_128x64.png");
    }

    #[test]
    fn lookups_are_idempotent() {
        let (cache, loads) = fake_cache();
        let a = cache.lookup_or_load(signature(2)).unwrap();
        let b = cache.lookup_or_load(signature(2)).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.id(), b.id());
        assert_eq!(loads.load(Ordering::Relaxed), 1);
        assert_eq!(a.scale(), [2.0, 4.0]);
        assert_eq!((a.width(), a.height()), (32, 32));
    }

    #[test]
    fn signatures_differing_in_size_are_distinct() {
        let (cache, loads) = fake_cache();
        let a = cache.lookup_or_load(signature(2)).unwrap();
        let b = cache
            .lookup_or_load(Signature {
                width: 32,
                ..signature(2)
            })
            .unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(loads.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn failed_loads_are_not_stored() {
        let (cache, loads) = fake_cache();
        assert!(cache.lookup_or_load(signature(3)).is_none());
        assert!(cache.lookup_or_load(signature(3)).is_none());
        assert_eq!(loads.load(Ordering::Relaxed), 2);
        assert_eq!(cache.loaded_len(), 0);
    }

    #[test]
    fn binding_lifecycle() {
        let (cache, _) = fake_cache();
        let image = cache.lookup_or_load(signature(4)).unwrap();

        assert!(cache.get_bound(&key(1)).is_none());
        cache.bind(key(1), &image);
        assert!(Arc::ptr_eq(&cache.get_bound(&key(1)).unwrap(), &image));
        assert!(cache.get_bound(&key(2)).is_none());

        cache.clear_bindings();
        assert!(cache.get_bound(&key(1)).is_none());
        assert_eq!(cache.loaded_len(), 1);

        cache.bind(key(1), &image);
        assert!(cache.get_bound(&key(1)).is_some());
    }

    #[test]
    fn bindings_do_not_keep_images_alive() {
        let (cache, _) = fake_cache();
        let image = cache.lookup_or_load(signature(6)).unwrap();
        cache.bind(key(3), &image);
        drop(image);
        assert!(cache.get_bound(&key(3)).is_some());

        cache.clear_all();
        assert!(cache.get_bound(&key(3)).is_none());
        assert_eq!(cache.loaded_len(), 0);
    }

    #[test]
    fn mod_directory_loads_by_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let signature = signature(0x1234);
        codec::save_png(
            &dir.path().join(signature.file_name()),
            32,
            16,
            &[0xFF; 32 * 16 * 4],
        )
        .unwrap();

        let cache = ReplacementCache::with_mod_dir(dir.path(), logger());
        let image = cache.lookup_or_load(signature).unwrap();
        assert_eq!((image.width(), image.height()), (32, 16));
        assert_eq!(image.scale(), [2.0, 2.0]);
        assert!(cache.lookup_or_load(Signature { hash: 1, ..signature }).is_none());
    }
}
