use crate::{cache::Signature, codec};
use ahash::AHashSet as HashSet;
use std::{fs, path::PathBuf};

/// Writes decoded hardware textures to disk, once per signature per session.
pub struct TextureDumper {
    dir: PathBuf,
    dir_created: bool,
    dumped: HashSet<Signature>,
    logger: slog::Logger,
}

impl TextureDumper {
    pub fn new(dir: impl Into<PathBuf>, logger: slog::Logger) -> Self {
        TextureDumper {
            dir: dir.into(),
            dir_created: false,
            dumped: HashSet::default(),
            logger,
        }
    }

    #[inline]
    pub fn is_dumped(&self, signature: &Signature) -> bool {
        self.dumped.contains(signature)
    }

    /// Dumps `rgba` unless its signature was already seen; failures are only logged. Returns
    /// whether a file was written.
    pub fn dump(&mut self, signature: Signature, rgba: &[u8]) -> bool {
        if !self.dumped.insert(signature) {
            return false;
        }

        if !self.dir_created {
            self.dir_created = true;
            if let Err(err) = fs::create_dir_all(&self.dir) {
                slog::warn!(
                    self.logger,
                    "Couldn't create texture dump directory";
                    "path" => %self.dir.display(),
                    "error" => %err
                );
            }
        }

        let path = self.dir.join(signature.file_name());
        match codec::save_png(
            &path,
            signature.width as u32,
            signature.height as u32,
            rgba,
        ) {
            Ok(()) => {
                slog::debug!(self.logger, "Dumped texture"; "path" => %path.display());
                true
            }
            Err(err) => {
                slog::warn!(
                    self.logger,
                    "Couldn't dump texture";
                    "path" => %path.display(),
                    "error" => %err
                );
                false
            }
        }
    }

    pub fn reset_session(&mut self) {
        self.dumped.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cache::tests::logger, codec::load_png};

    fn signature(hash: u64) -> Signature {
        Signature {
            hash,
            format: 7,
            width: 8,
            height: 8,
        }
    }

    #[test]
    fn dumps_once_per_signature() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("dump");
        let mut dumper = TextureDumper::new(&dir, logger());
        let rgba = [0x55; 8 * 8 * 4];

        assert!(dumper.dump(signature(1), &rgba));
        assert!(!dumper.dump(signature(1), &rgba));
        assert!(dumper.dump(signature(2), &rgba));

        let image = load_png(&dir.join(signature(1).file_name())).unwrap();
        assert_eq!(image.pixels, rgba);

        dumper.reset_session();
        assert!(!dumper.is_dumped(&signature(1)));
        assert!(dumper.dump(signature(1), &rgba));
    }

    #[test]
    fn failures_are_swallowed() {
        let root = tempfile::tempdir().unwrap();
        let file = root.path().join("not_a_dir");
        fs::write(&file, b"").unwrap();
        let mut dumper = TextureDumper::new(&file, logger());
        assert!(!dumper.dump(signature(3), &[0; 8 * 8 * 4]));
        assert!(dumper.is_dumped(&signature(3)));
    }
}
