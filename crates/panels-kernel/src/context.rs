//! Context store: named, typed values visible to conditions and variants.
//!
//! Two projections exist:
//! 1. **Display contexts**: every declared [`Parameter`] resolved against the
//!    caller-supplied values (unsupplied parameters become *unset* contexts).
//! 2. **Variant contexts**: a variant's [`StaticContext`]s merged over the
//!    display contexts. Static values win on a name collision.
//!
//! Contexts are read-only inputs. Nothing in the kernel mutates a context
//! after it has been handed to a condition or a variant plugin.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Requirement type that accepts a context of any type.
pub const ANY_TYPE: &str = "any";

/// Named runtime contexts, ordered by name.
pub type ContextMap = BTreeMap<String, Context>;

/// A typed runtime value. `value == None` means the context is declared but unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Context {
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl Context {
    pub fn new(data_type: impl Into<String>, value: Value) -> Self {
        Self {
            data_type: data_type.into(),
            label: String::new(),
            value: Some(value),
        }
    }

    /// A context whose type is known but which carries no value.
    pub fn unset(data_type: impl Into<String>) -> Self {
        Self {
            data_type: data_type.into(),
            label: String::new(),
            value: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }

    /// Whether this context can feed an input that requires `required_type`.
    pub fn satisfies(&self, required_type: &str) -> bool {
        type_satisfies(&self.data_type, required_type)
    }
}

/// Typed-data compatibility.
///
/// `entity:node` satisfies `entity:node`, `entity` and `any`, but not
/// `entity:user` or `entity_reference`.
pub fn type_satisfies(provided: &str, required: &str) -> bool {
    if required == ANY_TYPE || provided == required {
        return true;
    }
    provided
        .strip_prefix(required)
        .is_some_and(|rest| rest.starts_with(':'))
}

/// A display-level declaration of a context the caller is expected to supply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub machine_name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(default)]
    pub label: String,
}

impl Parameter {
    pub fn new(
        machine_name: impl Into<String>,
        data_type: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            machine_name: machine_name.into(),
            data_type: data_type.into(),
            label: label.into(),
        }
    }

    fn unset_context(&self) -> Context {
        Context::unset(self.data_type.clone()).with_label(self.label.clone())
    }
}

/// A literal context stored on a variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticContext {
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub value: Value,
}

impl StaticContext {
    pub fn new(
        name: impl Into<String>,
        label: impl Into<String>,
        data_type: impl Into<String>,
        value: Value,
    ) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            data_type: data_type.into(),
            value,
        }
    }

    pub fn to_context(&self) -> Context {
        Context::new(self.data_type.clone(), self.value.clone()).with_label(self.label.clone())
    }
}

/// Project declared parameters over the caller-supplied contexts.
///
/// Supplied contexts with no matching parameter pass through unchanged.
pub fn display_contexts(
    parameters: &BTreeMap<String, Parameter>,
    supplied: &ContextMap,
) -> ContextMap {
    let mut contexts = supplied.clone();
    for (name, parameter) in parameters {
        contexts
            .entry(name.clone())
            .or_insert_with(|| parameter.unset_context());
    }
    contexts
}

/// Merge static contexts over inherited ones; static entries win.
pub fn merge_static_contexts(
    statics: &BTreeMap<String, StaticContext>,
    inherited: &ContextMap,
) -> ContextMap {
    let mut merged = inherited.clone();
    for (name, static_context) in statics {
        merged.insert(name.clone(), static_context.to_context());
    }
    merged
}
