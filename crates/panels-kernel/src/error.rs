//! Error types for Panels kernel operations.
//!
//! Only configuration, not-found and storage failures cross component
//! boundaries. Condition faults are absorbed by the evaluator and surface as
//! denials (see [`crate::condition::ConditionFault`]).

use crate::plugin::PluginError;

/// Errors surfaced to callers of the kernel.
#[derive(Debug, thiserror::Error)]
pub enum PanelsError {
    /// The requested variant is not part of the display's collection.
    #[error("variant `{variant_id}` does not exist or is not associated with display `{display_id}`")]
    VariantNotFound {
        display_id: String,
        variant_id: String,
    },

    /// A variant claims a different owning display than the one it was added to.
    #[error("variant `{variant_id}` belongs to display `{claimed}`, not `{display_id}`")]
    VariantDisplayMismatch {
        variant_id: String,
        display_id: String,
        claimed: String,
    },

    /// A variant has no owning display reference.
    #[error("variant `{0}` has no associated display")]
    VariantUnbound(String),

    /// A variant references a display that cannot be loaded.
    #[error("display `{display_id}` referenced by variant `{variant_id}` does not exist")]
    DisplayMissing {
        variant_id: String,
        display_id: String,
    },

    #[error("display not found: {0}")]
    DisplayNotFound(String),

    /// Display ids are unique across entity types.
    #[error("display `{id}` already exists as `{existing}`, cannot save it as `{requested}`")]
    DisplayIdConflict {
        id: String,
        existing: String,
        requested: String,
    },

    #[error("variant not found: {0}")]
    VariantRecordNotFound(String),

    #[error("access condition `{condition_id}` not found on display `{display_id}`")]
    AccessConditionNotFound {
        display_id: String,
        condition_id: String,
    },

    #[error("selection condition `{condition_id}` not found on variant `{variant_id}`")]
    SelectionConditionNotFound {
        variant_id: String,
        condition_id: String,
    },

    #[error("parameter `{name}` not declared on display `{display_id}`")]
    ParameterNotFound { display_id: String, name: String },

    #[error("invalid machine name `{0}`: only lowercase letters, digits and underscores are allowed")]
    InvalidMachineName(String),

    /// A plugin could not be resolved from the plugin host.
    #[error(transparent)]
    Plugin(#[from] PluginError),

    /// The variant plugin failed while building its render tree.
    #[error("variant `{variant_id}` failed to build: {message}")]
    Build { variant_id: String, message: String },

    /// Storage or I/O failure in the persistence collaborator.
    #[error("storage error: {0}")]
    Storage(String),
}
