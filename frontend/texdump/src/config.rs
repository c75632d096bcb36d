use hires_texture::ReplacementConfig;
use hires_wgpu_3d::RenderSettings;
use serde::{Deserialize, Serialize};
use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    pub replacement: ReplacementConfig,
    pub render: RenderSettings,
}

pub struct File<T: Serialize + for<'de> Deserialize<'de>> {
    pub path: Option<PathBuf>,
    pub contents: T,
}

#[derive(Debug)]
pub enum FileError {
    Io(io::Error),
    Json(serde_json::Error),
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileError::Io(err) => write!(f, "I/O error: {err}"),
            FileError::Json(err) => write!(f, "JSON serialization error: {err}"),
        }
    }
}

impl std::error::Error for FileError {}

impl<T: Default + Serialize + for<'de> Deserialize<'de>> File<T> {
    pub fn read(path: &Path, default_on_not_found: bool) -> Result<Self, FileError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                if default_on_not_found && err.kind() == io::ErrorKind::NotFound {
                    return Ok(File {
                        path: Some(path.to_path_buf()),
                        contents: Default::default(),
                    });
                } else {
                    return Err(FileError::Io(err));
                }
            }
        };
        match serde_json::from_str(&content) {
            Ok(result) => Ok(File {
                path: Some(path.to_path_buf()),
                contents: result,
            }),
            Err(err) => Err(FileError::Json(err)),
        }
    }

    pub fn write(&self) -> Result<(), FileError> {
        if let Some(path) = &self.path {
            fs::write(
                path,
                serde_json::to_vec_pretty(&self.contents).map_err(FileError::Json)?,
            )
            .map_err(FileError::Io)
        } else {
            Ok(())
        }
    }
}
