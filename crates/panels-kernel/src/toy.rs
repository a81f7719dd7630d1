//! Toy plugins for conformance testing.
//!
//! A small, fully deterministic plugin set exercising every path of the
//! evaluator and dispatcher:
//!
//! - **constant_true / constant_false**: context-free conditions.
//! - **node_type**: passes when the `node` context's `type` is in `bundles`.
//!   Faults (like a host plugin throwing) when the value has no `type`.
//! - **context_equals**: passes when the `value` slot equals `equals`.
//! - **explosive**: panics when evaluated.
//! - **block_display**: renders `regions -> blocks` and echoes its contexts.
//! - **http_status**: renders a bare status node with a short max-age.

use crate::cache::{CacheMetadata, MaxAge};
use crate::condition::{ConditionConfig, ConditionFault};
use crate::context::{ANY_TYPE, ContextMap};
use crate::plugin::{
    Condition, ContextRequirement, PluginDefinition, PluginError, PluginHost, PluginKind,
    VariantPlugin,
};
use crate::render::RenderNode;
use serde_json::{Value, json};

pub const PROVIDER: &str = "panels_toy";

pub const ALWAYS_TRUE: &str = "constant_true";
pub const ALWAYS_FALSE: &str = "constant_false";
pub const NODE_TYPE: &str = "node_type";
pub const CONTEXT_EQUALS: &str = "context_equals";
pub const EXPLOSIVE: &str = "explosive";

pub const BLOCK_DISPLAY: &str = "block_display";
pub const HTTP_STATUS: &str = "http_status";

/// A host with every toy plugin registered.
pub fn plugin_host() -> PluginHost {
    let mut host = PluginHost::new();
    host.register_condition(
        PluginDefinition::new(ALWAYS_TRUE, "Always", PROVIDER),
        |_| Ok(Box::new(Constant(true))),
    )
    .register_condition(
        PluginDefinition::new(ALWAYS_FALSE, "Never", PROVIDER),
        |_| Ok(Box::new(Constant(false))),
    )
    .register_condition(
        PluginDefinition::new(NODE_TYPE, "Node bundle", PROVIDER)
            .with_context(ContextRequirement::new("node", "entity:node")),
        |config| NodeType::from_config(config).map(|c| Box::new(c) as Box<dyn Condition>),
    )
    .register_condition(
        PluginDefinition::new(CONTEXT_EQUALS, "Context value", PROVIDER)
            .with_context(ContextRequirement::new("value", ANY_TYPE)),
        |config| {
            Ok(Box::new(ContextEquals {
                expected: config.settings.get("equals").cloned().unwrap_or(Value::Null),
            }))
        },
    )
    .register_condition(
        PluginDefinition::new(EXPLOSIVE, "Explosive", PROVIDER),
        |_| Ok(Box::new(Explosive)),
    )
    .register_variant(
        PluginDefinition::new(BLOCK_DISPLAY, "Block display", PROVIDER),
        |settings| Ok(Box::new(BlockDisplay::from_settings(settings))),
    )
    .register_variant(
        PluginDefinition::new(HTTP_STATUS, "HTTP status code", PROVIDER),
        |settings| {
            let code = settings.get("status_code").and_then(Value::as_u64).unwrap_or(404);
            Ok(Box::new(HttpStatus { code }))
        },
    );
    host
}

struct Constant(bool);

impl Condition for Constant {
    fn plugin_id(&self) -> &str {
        if self.0 { ALWAYS_TRUE } else { ALWAYS_FALSE }
    }

    fn label(&self) -> String {
        let label = if self.0 { "Always" } else { "Never" };
        label.to_string()
    }

    fn summary(&self) -> String {
        format!("constant {}", self.0)
    }

    fn evaluate(&self, _contexts: &ContextMap) -> Result<bool, ConditionFault> {
        Ok(self.0)
    }
}

struct NodeType {
    bundles: Vec<String>,
}

impl NodeType {
    fn from_config(config: &ConditionConfig) -> Result<Self, PluginError> {
        let bundles = match config.settings.get("bundles") {
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| item.as_str().map(String::from))
                .collect::<Option<Vec<_>>>(),
            _ => None,
        };
        match bundles {
            Some(bundles) => Ok(Self { bundles }),
            None => Err(PluginError::InvalidConfiguration {
                kind: PluginKind::Condition,
                id: NODE_TYPE.to_string(),
                message: "`bundles` must be a list of strings".to_string(),
            }),
        }
    }
}

impl Condition for NodeType {
    fn plugin_id(&self) -> &str {
        NODE_TYPE
    }

    fn label(&self) -> String {
        "Node bundle".to_string()
    }

    fn summary(&self) -> String {
        format!("node bundle is one of: {}", self.bundles.join(", "))
    }

    fn evaluate(&self, contexts: &ContextMap) -> Result<bool, ConditionFault> {
        let bundle = contexts
            .get("node")
            .and_then(|context| context.value.as_ref())
            .and_then(|value| value.get("type"))
            .and_then(Value::as_str)
            .ok_or_else(|| ConditionFault::Plugin("node value has no bundle".to_string()))?;
        Ok(self.bundles.iter().any(|b| b == bundle))
    }
}

struct ContextEquals {
    expected: Value,
}

impl Condition for ContextEquals {
    fn plugin_id(&self) -> &str {
        CONTEXT_EQUALS
    }

    fn label(&self) -> String {
        "Context value".to_string()
    }

    fn summary(&self) -> String {
        format!("context value equals {}", self.expected)
    }

    fn evaluate(&self, contexts: &ContextMap) -> Result<bool, ConditionFault> {
        Ok(contexts
            .get("value")
            .and_then(|context| context.value.as_ref())
            == Some(&self.expected))
    }
}

struct Explosive;

impl Condition for Explosive {
    fn plugin_id(&self) -> &str {
        EXPLOSIVE
    }

    fn label(&self) -> String {
        "Explosive".to_string()
    }

    fn summary(&self) -> String {
        "panics on evaluation".to_string()
    }

    fn evaluate(&self, _contexts: &ContextMap) -> Result<bool, ConditionFault> {
        panic!("explosive condition evaluated")
    }
}

/// Regions of labelled blocks.
pub struct BlockDisplay {
    settings: Value,
}

impl BlockDisplay {
    fn from_settings(settings: &Value) -> Self {
        let settings = if settings.is_null() {
            json!({})
        } else {
            settings.clone()
        };
        Self { settings }
    }
}

impl VariantPlugin for BlockDisplay {
    fn plugin_id(&self) -> &str {
        BLOCK_DISPLAY
    }

    fn configuration(&self) -> Value {
        self.settings.clone()
    }

    fn build(&self, contexts: &ContextMap) -> Result<RenderNode, String> {
        let mut page = RenderNode::new("page");
        if let Some(title) = self.settings.get("page_title").and_then(Value::as_str) {
            page = page.with_property("title", json!(title));
        }

        match self.settings.get("blocks") {
            None => {}
            Some(Value::Object(regions)) => {
                for (region, blocks) in regions {
                    let mut region_node =
                        RenderNode::new("region").with_property("name", json!(region));
                    for block in blocks.as_array().into_iter().flatten() {
                        let label = block.as_str().ok_or_else(|| {
                            format!("block in region `{region}` must be a string")
                        })?;
                        region_node
                            .push_child(RenderNode::new("block").with_property("label", json!(label)));
                    }
                    page.push_child(region_node);
                }
            }
            Some(_) => return Err("`blocks` must map regions to block lists".to_string()),
        }

        if !contexts.is_empty() {
            let names: Vec<&String> = contexts.keys().collect();
            page = page.with_property("contexts", json!(names));
        }
        Ok(page)
    }

    fn cache_metadata(&self) -> CacheMetadata {
        CacheMetadata::new().with_context("theme")
    }
}

struct HttpStatus {
    code: u64,
}

impl VariantPlugin for HttpStatus {
    fn plugin_id(&self) -> &str {
        HTTP_STATUS
    }

    fn configuration(&self) -> Value {
        json!({ "status_code": self.code })
    }

    fn build(&self, _contexts: &ContextMap) -> Result<RenderNode, String> {
        Ok(RenderNode::new("status").with_property("code", json!(self.code)))
    }

    fn cache_metadata(&self) -> CacheMetadata {
        CacheMetadata::new().with_max_age(MaxAge::Seconds(60))
    }
}
