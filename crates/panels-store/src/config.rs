//! Store configuration loaded from TOML.
//!
//! ```toml
//! displays_path = "state/displays.jsonl"
//! variants_path = "state/variants.jsonl"
//! ```

use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub displays_path: PathBuf,
    pub variants_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            displays_path: PathBuf::from("displays.jsonl"),
            variants_path: PathBuf::from("variants.jsonl"),
        }
    }
}

impl StoreConfig {
    /// Default file names under `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let defaults = Self::default();
        let dir = dir.as_ref();
        Self {
            displays_path: dir.join(defaults.displays_path),
            variants_path: dir.join(defaults.variants_path),
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self, StoreError> {
        toml::from_str(text).map_err(|source| StoreError::ParseConfig {
            path: "<inline>".to_string(),
            source,
        })
    }

    /// Load from `path`. Relative record paths resolve against the config's directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| StoreError::ReadConfig {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = toml::from_str(&text).map_err(|source| StoreError::ParseConfig {
            path: path.display().to_string(),
            source,
        })?;
        let base = path.parent().unwrap_or(Path::new(""));
        Ok(Self {
            displays_path: base.join(config.displays_path),
            variants_path: base.join(config.variants_path),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_keys() {
        let config = StoreConfig::from_toml_str("variants_path = \"v.jsonl\"\n").expect("parses");
        assert_eq!(config.displays_path, PathBuf::from("displays.jsonl"));
        assert_eq!(config.variants_path, PathBuf::from("v.jsonl"));
    }

    #[test]
    fn load_resolves_relative_to_config_file() {
        let dir = std::env::temp_dir().join(format!("panels-store-config-{}", uuid::Uuid::new_v4().simple()));
        fs::create_dir_all(&dir).expect("temp dir");
        let path = dir.join("store.toml");
        fs::write(&path, "displays_path = \"state/d.jsonl\"\n").expect("fixture");

        let config = StoreConfig::load(&path).expect("loads");
        assert_eq!(config.displays_path, dir.join("state/d.jsonl"));
        assert_eq!(config.variants_path, dir.join("variants.jsonl"));
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn unknown_value_type_is_a_parse_error() {
        let err = StoreConfig::from_toml_str("displays_path = 3\n").expect_err("not a path");
        assert!(matches!(err, StoreError::ParseConfig { .. }));
    }
}
