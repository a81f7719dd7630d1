//! Store errors.

use crate::jsonl::JsonlError;
use panels_kernel::PanelsError;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Jsonl(#[from] JsonlError),

    #[error("failed to read store config {path}: {source}")]
    ReadConfig {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid store config at {path}: {source}")]
    ParseConfig {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

impl From<StoreError> for PanelsError {
    fn from(error: StoreError) -> Self {
        PanelsError::Storage(error.to_string())
    }
}
