//! Displays: named containers of variants, gated by access conditions.
//!
//! [`DisplayRecord`] is the persisted shape. [`Display`] is the runtime shape:
//! access conditions are instantiated once at load and caller-supplied
//! contexts live only in memory.

use crate::cache::CacheMetadata;
use crate::condition::{
    ConditionCollection, ConditionConfig, ConditionInstance, ConditionLogic, GateVerdict,
};
use crate::config::EngineConfig;
use crate::context::{Context, ContextMap, Parameter, display_contexts};
use crate::error::PanelsError;
use crate::machine_name::validate_machine_name;
use crate::plugin::PluginHost;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Persisted display configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayRecord {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub uuid: String,
    pub entity_type: String,
    #[serde(default = "default_status")]
    pub status: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub access_conditions: Vec<ConditionConfig>,
    #[serde(default)]
    pub access_logic: ConditionLogic,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, Parameter>,
}

fn default_status() -> bool {
    true
}

impl DisplayRecord {
    pub fn new(
        entity_type: impl Into<String>,
        id: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            uuid: uuid::Uuid::new_v4().to_string(),
            entity_type: entity_type.into(),
            status: true,
            access_conditions: Vec::new(),
            access_logic: ConditionLogic::default(),
            parameters: BTreeMap::new(),
        }
    }

    pub fn config_name(&self) -> String {
        config_name(&self.entity_type, &self.id)
    }

    pub fn cache_tags_to_invalidate(&self) -> BTreeSet<String> {
        display_cache_tags(&self.entity_type, &self.id)
    }
}

fn config_name(entity_type: &str, id: &str) -> String {
    format!("{entity_type}.{id}")
}

/// Cache tags of the display `<entity_type>.<id>`.
pub fn display_cache_tags(entity_type: &str, id: &str) -> BTreeSet<String> {
    BTreeSet::from([format!("config:{}", config_name(entity_type, id))])
}

/// A display loaded for resolution or editing.
#[derive(Debug)]
pub struct Display {
    id: String,
    label: String,
    uuid: String,
    entity_type: String,
    status: bool,
    access_conditions: ConditionCollection,
    access_logic: ConditionLogic,
    parameters: BTreeMap<String, Parameter>,
    supplied: ContextMap,
}

impl Display {
    /// Create a new display with the configured defaults.
    pub fn new(
        entity_type: impl Into<String>,
        id: impl Into<String>,
        label: impl Into<String>,
        config: &EngineConfig,
    ) -> Result<Self, PanelsError> {
        let id = id.into();
        validate_machine_name(&id)?;
        let mut record = DisplayRecord::new(entity_type, id, label);
        record.access_logic = config.display.access_logic;
        Ok(Self::hydrate(record, &PluginHost::new()))
    }

    /// Build the runtime shape, instantiating access conditions through `host`.
    pub fn hydrate(record: DisplayRecord, host: &PluginHost) -> Self {
        let uuid = if record.uuid.is_empty() {
            uuid::Uuid::new_v4().to_string()
        } else {
            record.uuid
        };
        Self {
            id: record.id,
            label: record.label,
            uuid,
            entity_type: record.entity_type,
            status: record.status,
            access_conditions: ConditionCollection::hydrate(record.access_conditions, host),
            access_logic: record.access_logic,
            parameters: record.parameters,
            supplied: ContextMap::new(),
        }
    }

    /// Flush to the persisted shape. Supplied contexts are not persisted.
    pub fn to_record(&self) -> DisplayRecord {
        DisplayRecord {
            id: self.id.clone(),
            label: self.label.clone(),
            uuid: self.uuid.clone(),
            entity_type: self.entity_type.clone(),
            status: self.status,
            access_conditions: self.access_conditions.configuration(),
            access_logic: self.access_logic,
            parameters: self.parameters.clone(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn set_label(&mut self, label: impl Into<String>) -> &mut Self {
        self.label = label.into();
        self
    }

    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn status(&self) -> bool {
        self.status
    }

    pub fn enable(&mut self) -> &mut Self {
        self.status = true;
        self
    }

    pub fn disable(&mut self) -> &mut Self {
        self.status = false;
        self
    }

    /// Name other configuration uses to depend on this display.
    pub fn config_name(&self) -> String {
        config_name(&self.entity_type, &self.id)
    }

    pub fn cache_tags_to_invalidate(&self) -> BTreeSet<String> {
        display_cache_tags(&self.entity_type, &self.id)
    }

    /// The display's cache identity, shared by all of its variants.
    pub fn cache_metadata(&self) -> CacheMetadata {
        CacheMetadata::new().with_tags(self.cache_tags_to_invalidate())
    }

    // ── Access conditions ──

    pub fn access_conditions(&self) -> &ConditionCollection {
        &self.access_conditions
    }

    /// Add an access condition; returns its generated uuid.
    pub fn add_access_condition(&mut self, config: ConditionConfig, host: &PluginHost) -> String {
        self.access_conditions.add(config, host)
    }

    pub fn access_condition(&self, condition_id: &str) -> Result<&ConditionInstance, PanelsError> {
        self.access_conditions
            .get(condition_id)
            .ok_or_else(|| PanelsError::AccessConditionNotFound {
                display_id: self.id.clone(),
                condition_id: condition_id.to_string(),
            })
    }

    pub fn remove_access_condition(
        &mut self,
        condition_id: &str,
    ) -> Result<ConditionInstance, PanelsError> {
        self.access_conditions
            .remove(condition_id)
            .ok_or_else(|| PanelsError::AccessConditionNotFound {
                display_id: self.id.clone(),
                condition_id: condition_id.to_string(),
            })
    }

    pub fn access_logic(&self) -> ConditionLogic {
        self.access_logic
    }

    pub fn set_access_logic(&mut self, logic: ConditionLogic) -> &mut Self {
        self.access_logic = logic;
        self
    }

    /// Evaluate the display-level gate against the display contexts.
    pub fn check_access(&self) -> GateVerdict {
        self.access_conditions
            .evaluate(self.access_logic, &self.contexts())
    }

    // ── Parameters ──

    pub fn parameters(&self) -> &BTreeMap<String, Parameter> {
        &self.parameters
    }

    pub fn parameter(&self, name: &str) -> Result<&Parameter, PanelsError> {
        self.parameters
            .get(name)
            .ok_or_else(|| PanelsError::ParameterNotFound {
                display_id: self.id.clone(),
                name: name.to_string(),
            })
    }

    /// Declare or replace a parameter. Names are unique keys.
    pub fn set_parameter(
        &mut self,
        name: impl Into<String>,
        data_type: impl Into<String>,
        label: impl Into<String>,
    ) -> Result<&mut Self, PanelsError> {
        let name = name.into();
        validate_machine_name(&name)?;
        self.parameters
            .insert(name.clone(), Parameter::new(name, data_type, label));
        Ok(self)
    }

    pub fn remove_parameter(&mut self, name: &str) -> Option<Parameter> {
        self.parameters.remove(name)
    }

    // ── Contexts ──

    /// Replace the caller-supplied contexts.
    pub fn set_contexts(&mut self, contexts: ContextMap) -> &mut Self {
        self.supplied = contexts;
        self
    }

    pub fn add_context(&mut self, name: impl Into<String>, context: Context) -> &mut Self {
        self.supplied.insert(name.into(), context);
        self
    }

    pub fn supplied_contexts(&self) -> &ContextMap {
        &self.supplied
    }

    /// Declared parameters projected over the supplied contexts.
    pub fn contexts(&self) -> ContextMap {
        display_contexts(&self.parameters, &self.supplied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toy;
    use serde_json::json;

    fn front() -> Display {
        Display::new("mini_panel", "front", "Front", &EngineConfig::default())
            .expect("valid display")
    }

    #[test]
    fn parameter_round_trip() {
        let mut display = front();
        display
            .set_parameter("node", "entity:node", "Node")
            .expect("valid name");
        let parameter = display.parameter("node").expect("declared");
        assert_eq!(
            parameter,
            &Parameter::new("node", "entity:node", "Node")
        );
    }

    #[test]
    fn parameter_names_are_unique_keys() {
        let mut display = front();
        display.set_parameter("node", "entity:node", "Node").expect("valid");
        display.set_parameter("node", "entity:node", "Content").expect("valid");
        assert_eq!(display.parameters().len(), 1);
        assert_eq!(display.parameter("node").expect("declared").label, "Content");

        assert!(display.remove_parameter("node").is_some());
        assert!(matches!(
            display.parameter("node"),
            Err(PanelsError::ParameterNotFound { .. })
        ));
        assert!(matches!(
            display.set_parameter("Bad Name", "string", ""),
            Err(PanelsError::InvalidMachineName(_))
        ));
    }

    #[test]
    fn access_condition_lookup_propagates_not_found() {
        let host = toy::plugin_host();
        let mut display = front();
        let uuid = display.add_access_condition(ConditionConfig::new(toy::ALWAYS_TRUE), &host);

        let condition = display.access_condition(&uuid).expect("added condition");
        assert_eq!(condition.label().expect("plugin available"), "Always");
        assert!(matches!(
            display.access_condition("missing"),
            Err(PanelsError::AccessConditionNotFound { .. })
        ));
        display.remove_access_condition(&uuid).expect("removable");
        assert!(display.remove_access_condition(&uuid).is_err());
    }

    #[test]
    fn record_round_trip_keeps_conditions_not_contexts() {
        let host = toy::plugin_host();
        let mut display = front();
        display.set_access_logic(ConditionLogic::Or);
        display.set_parameter("node", "entity:node", "Node").expect("valid");
        let uuid = display.add_access_condition(
            ConditionConfig::new(toy::NODE_TYPE).with_settings(json!({ "bundles": ["page"] })),
            &host,
        );
        display.add_context("node", Context::new("entity:node", json!({ "type": "page" })));

        let record = display.to_record();
        let text = serde_json::to_string(&record).expect("serializable");
        assert!(!text.contains("supplied"));

        let restored = Display::hydrate(
            serde_json::from_str(&text).expect("deserializable"),
            &host,
        );
        assert_eq!(restored.access_logic(), ConditionLogic::Or);
        assert_eq!(restored.access_condition(&uuid).expect("kept").plugin_id(), toy::NODE_TYPE);
        assert!(restored.supplied_contexts().is_empty());
        assert_eq!(restored.to_record(), record);
    }

    #[test]
    fn cache_tags_name_the_display_config() {
        let display = front();
        assert_eq!(display.config_name(), "mini_panel.front");
        assert_eq!(
            display.cache_tags_to_invalidate(),
            BTreeSet::from(["config:mini_panel.front".to_string()])
        );
    }

    #[test]
    fn access_gate_reads_parameter_contexts() {
        let host = toy::plugin_host();
        let mut display = front();
        display.set_parameter("node", "entity:node", "Node").expect("valid");
        display.add_access_condition(
            ConditionConfig::new(toy::NODE_TYPE).with_settings(json!({ "bundles": ["article"] })),
            &host,
        );

        assert!(!display.check_access().passed);
        display.add_context("node", Context::new("entity:node", json!({ "type": "article" })));
        assert!(display.check_access().passed);
    }
}
