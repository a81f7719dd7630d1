//! Engine configuration loaded from TOML.
//!
//! ```toml
//! [display]
//! access_logic = "or"
//!
//! [variant]
//! selection_logic = "and"
//! weight = 10
//!
//! [cache]
//! max_age = { seconds = 300 }
//! ```
//!
//! Every table and key is optional.

use crate::cache::MaxAge;
use crate::condition::ConditionLogic;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid toml at {path}: {source}")]
    ParseToml {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Defaults applied to newly created displays and variants, plus cache policy.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub display: DisplayDefaults,
    pub variant: VariantDefaults,
    pub cache: CachePolicy,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayDefaults {
    pub access_logic: ConditionLogic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VariantDefaults {
    pub selection_logic: ConditionLogic,
    pub weight: Option<i64>,
}

impl Default for VariantDefaults {
    fn default() -> Self {
        Self {
            selection_logic: ConditionLogic::And,
            weight: Some(0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CachePolicy {
    /// Upper bound on the max-age of rendered displays.
    pub max_age: MaxAge,
}

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Self::parse(text, "<inline>")
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text, &path.display().to_string())
    }

    fn parse(text: &str, path: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::ParseToml {
            path: path.to_string(),
            source,
        })
    }
}
