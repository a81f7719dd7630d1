//! Condition evaluator: access and selection gates.
//!
//! A gate is an ordered collection of condition instances plus a
//! [`ConditionLogic`]. Evaluation is pure and never fails: a condition that
//! cannot be evaluated (missing or mistyped context, unavailable plugin,
//! plugin error or panic) produces a [`ConditionFault`], and a fault counts
//! as a failed condition.
//!
//! ```text
//! and: all must pass   (stop at first non-pass)
//! or:  one must pass   (stop at first pass)
//! empty gate: pass
//! ```

use crate::context::ContextMap;
use crate::plugin::{Condition, ContextRequirement, PluginError, PluginHost};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use tracing::warn;

/// How the results of a gate's conditions combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionLogic {
    #[default]
    And,
    Or,
}

impl fmt::Display for ConditionLogic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionLogic::And => write!(f, "and"),
            ConditionLogic::Or => write!(f, "or"),
        }
    }
}

/// Persisted configuration of one condition instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionConfig {
    /// Condition plugin id.
    pub id: String,
    #[serde(default)]
    pub uuid: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub negate: bool,
    /// Plugin slot name -> context name. Unmapped slots read the context of the same name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context_mapping: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub settings: Value,
}

impl ConditionConfig {
    pub fn new(plugin_id: impl Into<String>) -> Self {
        Self {
            id: plugin_id.into(),
            uuid: String::new(),
            negate: false,
            context_mapping: BTreeMap::new(),
            settings: Value::Null,
        }
    }

    pub fn with_settings(mut self, settings: Value) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_mapping(mut self, slot: impl Into<String>, context: impl Into<String>) -> Self {
        self.context_mapping.insert(slot.into(), context.into());
        self
    }

    pub fn negated(mut self) -> Self {
        self.negate = true;
        self
    }

    fn context_name_for<'a>(&'a self, slot: &'a str) -> &'a str {
        self.context_mapping
            .get(slot)
            .map(String::as_str)
            .unwrap_or(slot)
    }
}

/// Why a condition could not produce a result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConditionFault {
    #[error("required context `{context}` for slot `{slot}` is missing")]
    ContextMissing { slot: String, context: String },

    #[error("required context `{context}` for slot `{slot}` has no value")]
    ContextUnset { slot: String, context: String },

    #[error("context `{context}` for slot `{slot}` is `{actual}`, expected `{expected}`")]
    ContextTypeMismatch {
        slot: String,
        context: String,
        expected: String,
        actual: String,
    },

    #[error("condition plugin unavailable: {0}")]
    Unavailable(PluginError),

    #[error("condition plugin failed: {0}")]
    Plugin(String),

    #[error("condition plugin panicked: {0}")]
    Panicked(String),
}

/// Result of evaluating one condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionOutcome {
    Pass,
    Fail,
    Fault(ConditionFault),
}

impl ConditionOutcome {
    pub fn passed(&self) -> bool {
        matches!(self, ConditionOutcome::Pass)
    }
}

/// A configured condition with its plugin resolved once at load time.
pub struct ConditionInstance {
    config: ConditionConfig,
    plugin: Result<Box<dyn Condition>, PluginError>,
    requirements: Vec<ContextRequirement>,
}

impl fmt::Debug for ConditionInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionInstance")
            .field("config", &self.config)
            .field("available", &self.plugin.is_ok())
            .finish()
    }
}

impl ConditionInstance {
    /// Resolve `config` against the host. An unknown plugin is kept as a
    /// permanently faulting instance so its configuration survives a save.
    pub fn instantiate(config: ConditionConfig, host: &PluginHost) -> Self {
        let requirements = host
            .condition_definition(&config.id)
            .map(|definition| definition.contexts.clone())
            .unwrap_or_default();
        let plugin = host.create_condition(&config);
        Self {
            config,
            plugin,
            requirements,
        }
    }

    pub fn uuid(&self) -> &str {
        &self.config.uuid
    }

    pub fn plugin_id(&self) -> &str {
        &self.config.id
    }

    pub fn config(&self) -> &ConditionConfig {
        &self.config
    }

    pub fn requirements(&self) -> &[ContextRequirement] {
        &self.requirements
    }

    pub fn plugin(&self) -> Result<&dyn Condition, PluginError> {
        match &self.plugin {
            Ok(plugin) => Ok(plugin.as_ref()),
            Err(error) => Err(error.clone()),
        }
    }

    pub fn label(&self) -> Result<String, PluginError> {
        self.plugin().map(|plugin| plugin.label())
    }

    pub fn summary(&self) -> Result<String, PluginError> {
        self.plugin().map(|plugin| plugin.summary())
    }

    /// Pick the contexts this condition reads, keyed by its slot names.
    fn bind(&self, contexts: &ContextMap) -> Result<ContextMap, ConditionFault> {
        let mut bound = ContextMap::new();
        for requirement in &self.requirements {
            let name = self.config.context_name_for(&requirement.slot);
            let Some(context) = contexts.get(name) else {
                return Err(ConditionFault::ContextMissing {
                    slot: requirement.slot.clone(),
                    context: name.to_string(),
                });
            };
            if !context.satisfies(&requirement.data_type) {
                return Err(ConditionFault::ContextTypeMismatch {
                    slot: requirement.slot.clone(),
                    context: name.to_string(),
                    expected: requirement.data_type.clone(),
                    actual: context.data_type.clone(),
                });
            }
            if !context.has_value() {
                return Err(ConditionFault::ContextUnset {
                    slot: requirement.slot.clone(),
                    context: name.to_string(),
                });
            }
            bound.insert(requirement.slot.clone(), context.clone());
        }
        Ok(bound)
    }

    pub fn evaluate(&self, contexts: &ContextMap) -> ConditionOutcome {
        let plugin = match &self.plugin {
            Ok(plugin) => plugin,
            Err(error) => return ConditionOutcome::Fault(ConditionFault::Unavailable(error.clone())),
        };
        let bound = match self.bind(contexts) {
            Ok(bound) => bound,
            Err(fault) => return ConditionOutcome::Fault(fault),
        };

        match panic::catch_unwind(AssertUnwindSafe(|| plugin.evaluate(&bound))) {
            Ok(Ok(result)) => {
                if result != self.config.negate {
                    ConditionOutcome::Pass
                } else {
                    ConditionOutcome::Fail
                }
            }
            Ok(Err(fault)) => ConditionOutcome::Fault(fault),
            Err(payload) => ConditionOutcome::Fault(ConditionFault::Panicked(panic_message(
                payload.as_ref(),
            ))),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Per-condition record kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionReport {
    pub uuid: String,
    pub plugin_id: String,
    pub outcome: ConditionOutcome,
}

/// Combined result of a gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateVerdict {
    pub passed: bool,
    /// Conditions actually evaluated, in order. Short-circuited ones are absent.
    pub reports: Vec<ConditionReport>,
}

impl GateVerdict {
    pub fn faults(&self) -> impl Iterator<Item = &ConditionFault> {
        self.reports.iter().filter_map(|report| match &report.outcome {
            ConditionOutcome::Fault(fault) => Some(fault),
            _ => None,
        })
    }
}

/// Evaluate `conditions` under `logic` against `contexts`.
pub fn evaluate_conditions<'a>(
    conditions: impl IntoIterator<Item = &'a ConditionInstance>,
    logic: ConditionLogic,
    contexts: &ContextMap,
) -> GateVerdict {
    let mut reports = Vec::new();
    let mut passed = match logic {
        ConditionLogic::And => true,
        ConditionLogic::Or => false,
    };
    let mut any = false;

    for condition in conditions {
        any = true;
        let outcome = condition.evaluate(contexts);
        if let ConditionOutcome::Fault(fault) = &outcome {
            warn!(
                condition = condition.uuid(),
                plugin = condition.plugin_id(),
                error = %fault,
                "condition fault treated as denial"
            );
        }
        let ok = outcome.passed();
        reports.push(ConditionReport {
            uuid: condition.uuid().to_string(),
            plugin_id: condition.plugin_id().to_string(),
            outcome,
        });

        match logic {
            ConditionLogic::And if !ok => {
                passed = false;
                break;
            }
            ConditionLogic::Or if ok => {
                passed = true;
                break;
            }
            _ => {}
        }
    }

    GateVerdict {
        passed: passed || !any,
        reports,
    }
}

/// An ordered set of condition instances keyed by generated uuid.
#[derive(Debug, Default)]
pub struct ConditionCollection {
    instances: Vec<ConditionInstance>,
}

impl ConditionCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Instantiate persisted configuration. Entries without a uuid get one.
    pub fn hydrate(configs: Vec<ConditionConfig>, host: &PluginHost) -> Self {
        let instances = configs
            .into_iter()
            .map(|mut config| {
                if config.uuid.is_empty() {
                    config.uuid = uuid::Uuid::new_v4().to_string();
                }
                ConditionInstance::instantiate(config, host)
            })
            .collect();
        Self { instances }
    }

    /// Add a condition under a freshly generated uuid, which is returned.
    pub fn add(&mut self, mut config: ConditionConfig, host: &PluginHost) -> String {
        let uuid = uuid::Uuid::new_v4().to_string();
        config.uuid = uuid.clone();
        self.instances
            .push(ConditionInstance::instantiate(config, host));
        uuid
    }

    pub fn get(&self, uuid: &str) -> Option<&ConditionInstance> {
        self.instances.iter().find(|instance| instance.uuid() == uuid)
    }

    pub fn remove(&mut self, uuid: &str) -> Option<ConditionInstance> {
        let index = self
            .instances
            .iter()
            .position(|instance| instance.uuid() == uuid)?;
        Some(self.instances.remove(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConditionInstance> {
        self.instances.iter()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Flush back to the persisted shape.
    pub fn configuration(&self) -> Vec<ConditionConfig> {
        self.instances
            .iter()
            .map(|instance| instance.config.clone())
            .collect()
    }

    pub fn evaluate(&self, logic: ConditionLogic, contexts: &ContextMap) -> GateVerdict {
        evaluate_conditions(self.iter(), logic, contexts)
    }
}
