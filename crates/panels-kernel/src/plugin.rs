//! Plugin host: string-keyed factories for condition and variant plugins.
//!
//! Entities store plugin ids plus plain configuration. The host turns those
//! into live plugin objects once per entity load; the live objects are cached
//! on the runtime entity and never persisted.

use crate::cache::CacheMetadata;
use crate::condition::{ConditionConfig, ConditionFault};
use crate::context::{ContextMap, type_satisfies};
use crate::render::RenderNode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// The capability a plugin id is registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginKind {
    Condition,
    Variant,
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginKind::Condition => write!(f, "condition"),
            PluginKind::Variant => write!(f, "variant"),
        }
    }
}

/// Plugin lookup and construction failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PluginError {
    #[error("unknown {kind} plugin `{id}`")]
    Unknown { kind: PluginKind, id: String },

    #[error("plugin `{id}` is a {actual} plugin, not a {expected} plugin")]
    WrongCapability {
        id: String,
        expected: PluginKind,
        actual: PluginKind,
    },

    #[error("{kind} plugin `{id}` rejected its configuration: {message}")]
    InvalidConfiguration {
        kind: PluginKind,
        id: String,
        message: String,
    },
}

/// One named context input a condition plugin reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextRequirement {
    pub slot: String,
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(default)]
    pub label: String,
}

impl ContextRequirement {
    pub fn new(slot: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            slot: slot.into(),
            data_type: data_type.into(),
            label: String::new(),
        }
    }
}

/// Static description of a registered plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDefinition {
    pub id: String,
    pub label: String,
    /// The package that provides the plugin; feeds dependency calculation.
    pub provider: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contexts: Vec<ContextRequirement>,
}

impl PluginDefinition {
    pub fn new(id: impl Into<String>, label: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            provider: provider.into(),
            contexts: Vec::new(),
        }
    }

    pub fn with_context(mut self, requirement: ContextRequirement) -> Self {
        self.contexts.push(requirement);
        self
    }

    /// Whether every required slot can be fed by some context in `contexts`.
    pub fn is_satisfiable_by(&self, contexts: &ContextMap) -> bool {
        self.contexts.iter().all(|requirement| {
            contexts
                .values()
                .any(|context| type_satisfies(&context.data_type, &requirement.data_type))
        })
    }
}

/// A boolean plugin evaluated against bound contexts.
///
/// `contexts` is keyed by the plugin's own slot names, already type-checked
/// against its definition. Returning `Err` (or panicking) is a fault, which
/// the evaluator converts into a denial.
pub trait Condition: Send + Sync {
    fn plugin_id(&self) -> &str;

    /// Human-readable label.
    fn label(&self) -> String;

    /// Machine summary of what the configured condition checks.
    fn summary(&self) -> String;

    fn evaluate(&self, contexts: &ContextMap) -> Result<bool, ConditionFault>;
}

/// A render strategy bound to a variant.
pub trait VariantPlugin: Send + Sync {
    fn plugin_id(&self) -> &str;

    /// Current configuration, flushed back into the variant's settings on save.
    fn configuration(&self) -> Value;

    /// Build the render tree from the variant's resolved contexts.
    fn build(&self, contexts: &ContextMap) -> Result<RenderNode, String>;

    /// Cache metadata contributed by the plugin itself.
    fn cache_metadata(&self) -> CacheMetadata {
        CacheMetadata::default()
    }
}

pub type ConditionFactory =
    Box<dyn Fn(&ConditionConfig) -> Result<Box<dyn Condition>, PluginError> + Send + Sync>;

pub type VariantFactory =
    Box<dyn Fn(&Value) -> Result<Box<dyn VariantPlugin>, PluginError> + Send + Sync>;

struct Registered<F> {
    definition: PluginDefinition,
    factory: F,
}

/// Registry of condition and variant plugin factories.
#[derive(Default)]
pub struct PluginHost {
    conditions: BTreeMap<String, Registered<ConditionFactory>>,
    variants: BTreeMap<String, Registered<VariantFactory>>,
}

impl fmt::Debug for PluginHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginHost")
            .field("conditions", &self.conditions.keys().collect::<Vec<_>>())
            .field("variants", &self.variants.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl PluginHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a condition plugin. Re-registering an id replaces it.
    pub fn register_condition<F>(&mut self, definition: PluginDefinition, factory: F) -> &mut Self
    where
        F: Fn(&ConditionConfig) -> Result<Box<dyn Condition>, PluginError> + Send + Sync + 'static,
    {
        self.conditions.insert(
            definition.id.clone(),
            Registered {
                definition,
                factory: Box::new(factory),
            },
        );
        self
    }

    /// Register a variant plugin. Re-registering an id replaces it.
    pub fn register_variant<F>(&mut self, definition: PluginDefinition, factory: F) -> &mut Self
    where
        F: Fn(&Value) -> Result<Box<dyn VariantPlugin>, PluginError> + Send + Sync + 'static,
    {
        self.variants.insert(
            definition.id.clone(),
            Registered {
                definition,
                factory: Box::new(factory),
            },
        );
        self
    }

    pub fn condition_definition(&self, id: &str) -> Result<&PluginDefinition, PluginError> {
        match self.conditions.get(id) {
            Some(registered) => Ok(&registered.definition),
            None => Err(self.lookup_error(id, PluginKind::Condition)),
        }
    }

    pub fn variant_definition(&self, id: &str) -> Result<&PluginDefinition, PluginError> {
        match self.variants.get(id) {
            Some(registered) => Ok(&registered.definition),
            None => Err(self.lookup_error(id, PluginKind::Variant)),
        }
    }

    pub fn create_condition(
        &self,
        config: &ConditionConfig,
    ) -> Result<Box<dyn Condition>, PluginError> {
        match self.conditions.get(&config.id) {
            Some(registered) => (registered.factory)(config),
            None => Err(self.lookup_error(&config.id, PluginKind::Condition)),
        }
    }

    pub fn create_variant(
        &self,
        id: &str,
        settings: &Value,
    ) -> Result<Box<dyn VariantPlugin>, PluginError> {
        match self.variants.get(id) {
            Some(registered) => (registered.factory)(settings),
            None => Err(self.lookup_error(id, PluginKind::Variant)),
        }
    }

    pub fn condition_definitions(&self) -> impl Iterator<Item = &PluginDefinition> {
        self.conditions.values().map(|r| &r.definition)
    }

    pub fn variant_definitions(&self) -> impl Iterator<Item = &PluginDefinition> {
        self.variants.values().map(|r| &r.definition)
    }

    /// Condition plugins whose every required input can be fed from `contexts`.
    pub fn condition_definitions_for_contexts(
        &self,
        contexts: &ContextMap,
    ) -> Vec<&PluginDefinition> {
        self.condition_definitions()
            .filter(|definition| definition.is_satisfiable_by(contexts))
            .collect()
    }

    fn lookup_error(&self, id: &str, expected: PluginKind) -> PluginError {
        let other = match expected {
            PluginKind::Condition => self.variants.contains_key(id).then_some(PluginKind::Variant),
            PluginKind::Variant => self
                .conditions
                .contains_key(id)
                .then_some(PluginKind::Condition),
        };
        match other {
            Some(actual) => PluginError::WrongCapability {
                id: id.to_string(),
                expected,
                actual,
            },
            None => PluginError::Unknown {
                kind: expected,
                id: id.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::toy;
    use serde_json::json;

    #[test]
    fn lookup_distinguishes_unknown_from_wrong_capability() {
        let host = toy::plugin_host();

        let err = host
            .create_variant("nope", &Value::Null)
            .err()
            .expect("unknown id should fail");
        assert_eq!(
            err,
            PluginError::Unknown {
                kind: PluginKind::Variant,
                id: "nope".to_string()
            }
        );

        let err = host
            .create_variant(toy::ALWAYS_TRUE, &Value::Null)
            .err()
            .expect("condition id should not build a variant");
        assert_eq!(
            err,
            PluginError::WrongCapability {
                id: toy::ALWAYS_TRUE.to_string(),
                expected: PluginKind::Variant,
                actual: PluginKind::Condition,
            }
        );
    }

    #[test]
    fn definitions_for_contexts_filters_by_type() {
        let host = toy::plugin_host();

        let without = host.condition_definitions_for_contexts(&ContextMap::new());
        assert!(without.iter().all(|d| d.contexts.is_empty()));
        assert!(!without.iter().any(|d| d.id == toy::NODE_TYPE));

        let mut contexts = ContextMap::new();
        contexts.insert(
            "node".to_string(),
            Context::new("entity:node", json!({"type": "article"})),
        );
        let with = host.condition_definitions_for_contexts(&contexts);
        assert!(with.iter().any(|d| d.id == toy::NODE_TYPE));
    }
}
