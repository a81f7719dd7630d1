//! Render dispatcher: build a resolved variant into a render tree.
//!
//! The tree is opaque to the kernel. Cache metadata is the plugin's own
//! metadata joined with the owning display's cache identity; variants never
//! compute cache tags of their own.

use crate::cache::CacheMetadata;
use crate::display::Display;
use crate::error::PanelsError;
use crate::variant::Variant;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// A typed node in a render tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderNode {
    pub kind: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<RenderNode>,
}

impl RenderNode {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            properties: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    pub fn with_child(mut self, child: RenderNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn push_child(&mut self, child: RenderNode) {
        self.children.push(child);
    }
}

/// Render output plus the cache metadata it depends on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rendered {
    pub tree: RenderNode,
    pub cache: CacheMetadata,
}

/// Build `variant` with its resolved contexts.
pub fn dispatch(display: &Display, variant: &Variant) -> Result<Rendered, PanelsError> {
    variant.ensure_belongs_to(display)?;
    let plugin = variant.variant_plugin()?;
    let contexts = variant.contexts(display);

    let display_id = display.id();
    debug!(
        display = display_id,
        variant = variant.id(),
        plugin = plugin.plugin_id(),
        contexts = contexts.len(),
        "building variant"
    );

    let tree = plugin
        .build(contexts)
        .map_err(|message| PanelsError::Build {
            variant_id: variant.id().to_string(),
            message,
        })?;

    let cache = plugin.cache_metadata().merged(&variant.cache_metadata(display));
    Ok(Rendered { tree, cache })
}
