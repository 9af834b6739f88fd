use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::data::loader::SceneLoader;
use crate::data::decoder::DecoderRegistry;
use crate::data::registry::{DatasetDescriptor, Registry};
use crate::error::{Result, SceneError};

/// Looked up relative to the working directory when no path is given.
pub const DEFAULT_CONFIG_PATH: &str = "config/scene.json";

fn default_scenes_directory() -> PathBuf {
    PathBuf::from("./datasets/")
}

/// Runtime configuration, read from JSON.
///
/// ```json
/// {
///   "scenes_directory": "/data/hyperspectral",
///   "datasets": [ { "name": "F_fluocompact", ... } ]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Root holding one folder per dataset.
    #[serde(default = "default_scenes_directory", alias = "scenes directory")]
    pub scenes_directory: PathBuf,
    /// Datasets registered in addition to the built-in ones.
    #[serde(default)]
    pub datasets: Vec<DatasetDescriptor>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            scenes_directory: default_scenes_directory(),
            datasets: Vec::new(),
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| SceneError::io(path, e))?;
        serde_json::from_str(&text)
            .map_err(|e| SceneError::corrupt(format!("{}: {e}", path.display())))
    }

    /// `explicit` when given, else [`DEFAULT_CONFIG_PATH`] if it exists, else
    /// defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let default = Path::new(DEFAULT_CONFIG_PATH);
                if default.is_file() {
                    log::debug!("Using configuration {}", default.display());
                    Self::from_file(default)
                } else {
                    Ok(Config::default())
                }
            }
        }
    }

    /// Built-in datasets plus the configured ones.
    pub fn registry(&self) -> Registry {
        Registry::builtin().with_datasets(self.datasets.iter().cloned())
    }

    pub fn loader(&self) -> SceneLoader {
        SceneLoader::new(self.registry(), DecoderRegistry::builtin().clone())
    }
}
