//! Machine-name validation for display ids, variant ids and parameter names.

use crate::error::PanelsError;
use regex::Regex;
use std::sync::OnceLock;

fn machine_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z0-9_]+$").expect("machine-name regex must compile"))
}

// Variant ids are derived from display ids and plugin ids, e.g. `front-block_display-0`.
fn variant_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[a-z0-9_]+(?:-[a-z0-9_]+)*$").expect("variant-id regex must compile")
    })
}

/// Validate a display id or parameter name.
pub fn validate_machine_name(name: &str) -> Result<(), PanelsError> {
    if machine_name_re().is_match(name) {
        Ok(())
    } else {
        Err(PanelsError::InvalidMachineName(name.to_string()))
    }
}

/// Validate a variant id.
pub fn validate_variant_id(id: &str) -> Result<(), PanelsError> {
    if variant_id_re().is_match(id) {
        Ok(())
    } else {
        Err(PanelsError::InvalidMachineName(id.to_string()))
    }
}
