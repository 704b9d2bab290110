//! Loader configuration (`tagmesh.toml`)
//!
//! Every field has a default, so a partial file (or none at all) is valid.
//! [`LoaderConfig::load_options`] turns the parse-related settings into the
//! [`LoadOptions`] handed to every parser.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tagmesh_formats::{BoundsOverride, LoadOptions, SurfaceLimits};
use tagmesh_shared::MAX_MOD_KNOWN;
use thiserror::Error;
use tracing::warn;

/// Errors from reading or writing a configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Model loader configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Registry capacity, counting the default model in slot 0 (default: 1024)
    #[serde(default = "default_max_models")]
    pub max_models: usize,
    /// Per-surface vertex and index limits
    #[serde(default)]
    pub limits: SurfaceLimits,
    /// Build GPU buffers for multi-frame meshes (default: true)
    #[serde(default = "default_true")]
    pub gpu_vertex_animation: bool,
    /// Fixed bounds for compressed-frame meshes, matched by name substring
    #[serde(default)]
    pub bounds_overrides: Vec<BoundsOverride>,
}

fn default_max_models() -> usize {
    MAX_MOD_KNOWN
}
fn default_true() -> bool {
    true
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_models: default_max_models(),
            limits: SurfaceLimits::default(),
            gpu_vertex_animation: default_true(),
            bounds_overrides: Vec::new(),
        }
    }
}

impl LoaderConfig {
    /// The historical overrides for the "sherman" and "mg42" models.
    ///
    /// Not applied unless an embedder puts them in `bounds_overrides`.
    pub fn legacy_bounds_overrides() -> Vec<BoundsOverride> {
        ["sherman", "mg42"]
            .into_iter()
            .map(|name| BoundsOverride {
                name_contains: name.to_string(),
                radius: 256.0,
                mins: [128.0; 3],
                maxs: [-128.0; 3],
            })
            .collect()
    }

    /// Parse options shared by every format parser
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            limits: self.limits,
            gpu_vertex_animation: self.gpu_vertex_animation,
            bounds_overrides: self.bounds_overrides.clone(),
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Read and parse a config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML
    /// for this structure.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Like [`LoaderConfig::load`], falling back to defaults with a warning
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "using default loader config");
            Self::default()
        })
    }

    /// Write the config as TOML, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = self.to_toml_string()?;
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(write_err)?;
        }
        std::fs::write(path, content).map_err(write_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LoaderConfig::default();
        assert_eq!(config.max_models, 1024);
        assert_eq!(config.limits.max_vertexes, 1000);
        assert_eq!(config.limits.max_indexes, 6000);
        assert!(config.gpu_vertex_animation);
        assert!(config.bounds_overrides.is_empty());
    }

    #[test]
    fn test_empty_file_is_default() {
        let config = LoaderConfig::from_toml_str("").unwrap();
        assert_eq!(config, LoaderConfig::default());
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
max_models = 16
gpu_vertex_animation = false

[limits]
max_vertexes = 2000
"#;
        let config = LoaderConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.max_models, 16);
        assert!(!config.gpu_vertex_animation);
        assert_eq!(config.limits.max_vertexes, 2000);
        assert_eq!(config.limits.max_indexes, 6000);
    }

    #[test]
    fn test_bounds_overrides_from_toml() {
        let toml_str = r#"
[[bounds_overrides]]
name_contains = "tank"
radius = 64.0
mins = [-1.0, -2.0, -3.0]
maxs = [1.0, 2.0, 3.0]
"#;
        let config = LoaderConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.bounds_overrides.len(), 1);
        assert_eq!(config.bounds_overrides[0].name_contains, "tank");
        assert_eq!(config.bounds_overrides[0].mins, [-1.0, -2.0, -3.0]);

        let options = config.load_options();
        assert_eq!(options.bounds_overrides, config.bounds_overrides);
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            LoaderConfig::from_toml_str("max_models = \"many\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_legacy_overrides() {
        let overrides = LoaderConfig::legacy_bounds_overrides();
        let names: Vec<&str> = overrides.iter().map(|o| o.name_contains.as_str()).collect();
        assert_eq!(names, ["sherman", "mg42"]);
        assert!(overrides.iter().all(|o| o.radius == 256.0 && o.maxs == [-128.0; 3]));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tagmesh.toml");

        let config = LoaderConfig {
            max_models: 8,
            bounds_overrides: LoaderConfig::legacy_bounds_overrides(),
            ..LoaderConfig::default()
        };
        config.save(&path).unwrap();
        assert_eq!(LoaderConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(matches!(LoaderConfig::load(&path), Err(ConfigError::Read { .. })));
        assert_eq!(LoaderConfig::load_or_default(&path), LoaderConfig::default());
    }
}
