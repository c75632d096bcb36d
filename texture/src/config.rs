use crate::toggles;
use std::path::{Path, PathBuf};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(default, rename_all = "kebab-case")
)]
pub struct ReplacementConfig {
    pub asset_root: PathBuf,
    pub replace_enabled: bool,
    pub dump_enabled: bool,
}

impl Default for ReplacementConfig {
    fn default() -> Self {
        ReplacementConfig {
            asset_root: PathBuf::from("text_replace"),
            replace_enabled: false,
            dump_enabled: false,
        }
    }
}

impl ReplacementConfig {
    pub fn mod_dir(&self) -> PathBuf {
        self.asset_root.join("mod")
    }

    pub fn dump_dir(&self) -> PathBuf {
        self.asset_root.join("dump")
    }

    pub fn with_asset_root(mut self, asset_root: impl AsRef<Path>) -> Self {
        self.asset_root = asset_root.as_ref().to_path_buf();
        self
    }

    /// Copies the feature switches into the process-wide toggles.
    pub fn apply(&self) {
        toggles::set_replace_enabled(self.replace_enabled);
        toggles::set_dump_enabled(self.dump_enabled);
    }
}
