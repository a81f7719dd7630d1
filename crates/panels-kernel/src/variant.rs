//! Variants: weighted, condition-gated render strategies of a display.
//!
//! A variant names exactly one variant plugin, which is instantiated when the
//! variant is loaded. Its contexts are its static contexts merged over the
//! owning display's contexts, computed on first use and cached until the
//! static contexts change or the variant is rebound to a display.

use crate::cache::CacheMetadata;
use crate::condition::{
    ConditionCollection, ConditionConfig, ConditionInstance, ConditionLogic, GateVerdict,
};
use crate::config::EngineConfig;
use crate::context::{ContextMap, StaticContext, merge_static_contexts};
use crate::display::Display;
use crate::error::PanelsError;
use crate::machine_name::validate_variant_id;
use crate::plugin::{PluginError, PluginHost, VariantPlugin};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::OnceCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::debug;

/// Persisted variant configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantRecord {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub uuid: String,
    /// Variant plugin id.
    pub variant: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub variant_settings: Value,
    #[serde(default)]
    pub display_entity_type: Option<String>,
    #[serde(default)]
    pub display_entity_id: Option<String>,
    /// `None` sorts after every weighted variant.
    #[serde(default = "default_weight")]
    pub weight: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub selection_criteria: Vec<ConditionConfig>,
    #[serde(default)]
    pub selection_logic: ConditionLogic,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub static_context: BTreeMap<String, StaticContext>,
}

fn default_weight() -> Option<i64> {
    Some(0)
}

impl VariantRecord {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        plugin_id: impl Into<String>,
        display: &Display,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            uuid: uuid::Uuid::new_v4().to_string(),
            variant: plugin_id.into(),
            variant_settings: Value::Null,
            display_entity_type: Some(display.entity_type().to_string()),
            display_entity_id: Some(display.id().to_string()),
            weight: default_weight(),
            selection_criteria: Vec::new(),
            selection_logic: ConditionLogic::default(),
            static_context: BTreeMap::new(),
        }
    }
}

/// Config and module dependencies of a variant.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Dependencies {
    pub config: BTreeSet<String>,
    pub module: BTreeSet<String>,
}

/// Outcome of both gates for one variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessVerdict {
    pub display: GateVerdict,
    /// Absent when the display gate already denied.
    pub selection: Option<GateVerdict>,
}

impl AccessVerdict {
    pub fn granted(&self) -> bool {
        self.display.passed && self.selection.as_ref().is_some_and(|gate| gate.passed)
    }
}

/// A variant loaded for resolution or editing.
pub struct Variant {
    id: String,
    label: String,
    uuid: String,
    plugin_id: String,
    settings: Value,
    plugin: Result<Box<dyn VariantPlugin>, PluginError>,
    display_entity_type: Option<String>,
    display_entity_id: Option<String>,
    weight: Option<i64>,
    selection: ConditionCollection,
    selection_logic: ConditionLogic,
    static_contexts: BTreeMap<String, StaticContext>,
    contexts: OnceCell<ContextMap>,
}

impl fmt::Debug for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variant")
            .field("id", &self.id)
            .field("plugin_id", &self.plugin_id)
            .field("display_entity_id", &self.display_entity_id)
            .field("weight", &self.weight)
            .field("available", &self.plugin.is_ok())
            .finish()
    }
}

impl Variant {
    /// Create a new variant of `display`. Unlike [`Variant::hydrate`], an
    /// unusable plugin id is rejected up front.
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        plugin_id: impl Into<String>,
        display: &Display,
        host: &PluginHost,
        config: &EngineConfig,
    ) -> Result<Self, PanelsError> {
        let id = id.into();
        validate_variant_id(&id)?;
        let mut record = VariantRecord::new(id, label, plugin_id, display);
        record.weight = config.variant.weight;
        record.selection_logic = config.variant.selection_logic;
        let variant = Self::hydrate(record, host);
        variant.variant_plugin()?;
        Ok(variant)
    }

    /// Build the runtime shape. Plugin failures are kept and reported when the
    /// plugin is first needed, so the configuration survives a save.
    pub fn hydrate(record: VariantRecord, host: &PluginHost) -> Self {
        let plugin = host.create_variant(&record.variant, &record.variant_settings);
        if let Err(error) = &plugin {
            debug!(variant = %record.id, error = %error, "variant plugin unavailable");
        }
        let uuid = if record.uuid.is_empty() {
            uuid::Uuid::new_v4().to_string()
        } else {
            record.uuid
        };
        Self {
            id: record.id,
            label: record.label,
            uuid,
            plugin_id: record.variant,
            settings: record.variant_settings,
            plugin,
            display_entity_type: record.display_entity_type,
            display_entity_id: record.display_entity_id,
            weight: record.weight,
            selection: ConditionCollection::hydrate(record.selection_criteria, host),
            selection_logic: record.selection_logic,
            static_contexts: record.static_context,
            contexts: OnceCell::new(),
        }
    }

    /// Flush to the persisted shape. Settings come from the live plugin when
    /// there is one.
    pub fn to_record(&self) -> VariantRecord {
        let variant_settings = match &self.plugin {
            Ok(plugin) => plugin.configuration(),
            Err(_) => self.settings.clone(),
        };
        VariantRecord {
            id: self.id.clone(),
            label: self.label.clone(),
            uuid: self.uuid.clone(),
            variant: self.plugin_id.clone(),
            variant_settings,
            display_entity_type: self.display_entity_type.clone(),
            display_entity_id: self.display_entity_id.clone(),
            weight: self.weight,
            selection_criteria: self.selection.configuration(),
            selection_logic: self.selection_logic,
            static_context: self.static_contexts.clone(),
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

    pub fn weight(&self) -> Option<i64> {
        self.weight
    }

    pub fn set_weight(&mut self, weight: Option<i64>) -> &mut Self {
        self.weight = weight;
        self
    }

    // ── Owning display ──

    pub fn display_id(&self) -> Option<&str> {
        self.display_entity_id.as_deref()
    }

    pub fn display_entity_type(&self) -> Option<&str> {
        self.display_entity_type.as_deref()
    }

    /// Fail unless this variant claims `display` as its owner.
    pub fn ensure_belongs_to(&self, display: &Display) -> Result<(), PanelsError> {
        self.ensure_owned_by(display.entity_type(), display.id())
    }

    pub(crate) fn ensure_owned_by(
        &self,
        entity_type: &str,
        display_id: &str,
    ) -> Result<(), PanelsError> {
        let Some(claimed) = self.display_entity_id.as_deref() else {
            return Err(PanelsError::VariantUnbound(self.id.clone()));
        };
        let type_matches = self
            .display_entity_type
            .as_deref()
            .is_none_or(|claimed_type| claimed_type == entity_type);
        if claimed == display_id && type_matches {
            Ok(())
        } else {
            Err(PanelsError::VariantDisplayMismatch {
                variant_id: self.id.clone(),
                display_id: display_id.to_string(),
                claimed: claimed.to_string(),
            })
        }
    }

    /// Bind this variant to `display`. Drops the cached contexts.
    pub fn set_display(&mut self, display: &Display) -> &mut Self {
        self.display_entity_type = Some(display.entity_type().to_string());
        self.display_entity_id = Some(display.id().to_string());
        self.reset_contexts();
        self
    }

    // ── Variant plugin ──

    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    pub fn variant_plugin(&self) -> Result<&dyn VariantPlugin, PanelsError> {
        match &self.plugin {
            Ok(plugin) => Ok(plugin.as_ref()),
            Err(error) => Err(PanelsError::Plugin(error.clone())),
        }
    }

    /// Replace the plugin settings, re-instantiating the plugin.
    pub fn set_variant_settings(
        &mut self,
        settings: Value,
        host: &PluginHost,
    ) -> Result<(), PanelsError> {
        let plugin = host.create_variant(&self.plugin_id, &settings)?;
        self.settings = settings;
        self.plugin = Ok(plugin);
        Ok(())
    }

    /// Switch to a different variant plugin.
    pub fn set_variant_plugin(
        &mut self,
        plugin_id: impl Into<String>,
        settings: Value,
        host: &PluginHost,
    ) -> Result<(), PanelsError> {
        let plugin_id = plugin_id.into();
        let plugin = host.create_variant(&plugin_id, &settings)?;
        self.plugin_id = plugin_id;
        self.settings = settings;
        self.plugin = Ok(plugin);
        Ok(())
    }

    // ── Selection conditions ──

    pub fn selection_conditions(&self) -> &ConditionCollection {
        &self.selection
    }

    /// Add a selection condition; returns its generated uuid.
    pub fn add_selection_condition(&mut self, config: ConditionConfig, host: &PluginHost) -> String {
        self.selection.add(config, host)
    }

    pub fn selection_condition(&self, condition_id: &str) -> Result<&ConditionInstance, PanelsError> {
        self.selection
            .get(condition_id)
            .ok_or_else(|| PanelsError::SelectionConditionNotFound {
                variant_id: self.id.clone(),
                condition_id: condition_id.to_string(),
            })
    }

    pub fn remove_selection_condition(
        &mut self,
        condition_id: &str,
    ) -> Result<ConditionInstance, PanelsError> {
        self.selection
            .remove(condition_id)
            .ok_or_else(|| PanelsError::SelectionConditionNotFound {
                variant_id: self.id.clone(),
                condition_id: condition_id.to_string(),
            })
    }

    pub fn selection_logic(&self) -> ConditionLogic {
        self.selection_logic
    }

    pub fn set_selection_logic(&mut self, logic: ConditionLogic) -> &mut Self {
        self.selection_logic = logic;
        self
    }

    // ── Static contexts ──

    pub fn static_contexts(&self) -> &BTreeMap<String, StaticContext> {
        &self.static_contexts
    }

    pub fn static_context(&self, name: &str) -> Option<&StaticContext> {
        self.static_contexts.get(name)
    }

    pub fn set_static_context(&mut self, context: StaticContext) -> &mut Self {
        self.static_contexts.insert(context.name.clone(), context);
        self.reset_contexts();
        self
    }

    pub fn remove_static_context(&mut self, name: &str) -> Option<StaticContext> {
        let removed = self.static_contexts.remove(name);
        self.reset_contexts();
        removed
    }

    // ── Contexts and cache ──

    /// Static contexts merged over the display contexts, cached on first use.
    pub fn contexts(&self, display: &Display) -> &ContextMap {
        self.contexts
            .get_or_init(|| merge_static_contexts(&self.static_contexts, &display.contexts()))
    }

    pub fn reset_contexts(&mut self) {
        self.contexts = OnceCell::new();
    }

    /// Variants share their display's cache identity.
    pub fn cache_tags_to_invalidate(&self, display: &Display) -> BTreeSet<String> {
        display.cache_tags_to_invalidate()
    }

    pub fn cache_metadata(&self, display: &Display) -> CacheMetadata {
        display.cache_metadata()
    }

    pub fn calculate_dependencies(&self, display: &Display, host: &PluginHost) -> Dependencies {
        let mut dependencies = Dependencies::default();
        dependencies.config.insert(display.config_name());
        if let Ok(definition) = host.variant_definition(&self.plugin_id) {
            dependencies.module.insert(definition.provider.clone());
        }
        for condition in self.selection.iter() {
            if let Ok(definition) = host.condition_definition(condition.plugin_id()) {
                dependencies.module.insert(definition.provider.clone());
            }
        }
        dependencies
    }

    // ── Access ──

    pub fn check_selection(&self, display: &Display) -> GateVerdict {
        self.selection
            .evaluate(self.selection_logic, self.contexts(display))
    }

    /// The display gate, then (if it passed) the selection gate.
    pub fn check_access(&self, display: &Display) -> AccessVerdict {
        let display_gate = display.check_access();
        let selection = display_gate
            .passed
            .then(|| self.check_selection(display));
        AccessVerdict {
            display: display_gate,
            selection,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::toy;
    use serde_json::json;

    fn front() -> Display {
        Display::new("mini_panel", "front", "Front", &EngineConfig::default())
            .expect("valid display")
    }

    fn variant(display: &Display, host: &PluginHost) -> Variant {
        Variant::new(
            "front-default",
            "Default",
            toy::BLOCK_DISPLAY,
            display,
            host,
            &EngineConfig::default(),
        )
        .expect("valid variant")
    }

    #[test]
    fn new_rejects_unknown_and_wrong_capability_plugins() {
        let host = toy::plugin_host();
        let display = front();
        let config = EngineConfig::default();

        let err = Variant::new("front-x", "X", "nope", &display, &host, &config)
            .expect_err("unknown plugin");
        assert!(matches!(err, PanelsError::Plugin(PluginError::Unknown { .. })));

        let err = Variant::new("front-x", "X", toy::ALWAYS_TRUE, &display, &host, &config)
            .expect_err("condition is not a variant plugin");
        assert!(matches!(
            err,
            PanelsError::Plugin(PluginError::WrongCapability { .. })
        ));

        let err = Variant::new("Front X", "X", toy::HTTP_STATUS, &display, &host, &config)
            .expect_err("bad id");
        assert!(matches!(err, PanelsError::InvalidMachineName(_)));
    }

    #[test]
    fn new_applies_configured_defaults() {
        let host = toy::plugin_host();
        let display = front();
        let config = EngineConfig::from_toml_str("[variant]\nweight = 7\nselection_logic = \"or\"\n")
            .expect("config parses");
        let variant = Variant::new("front-a", "A", toy::HTTP_STATUS, &display, &host, &config)
            .expect("valid variant");
        assert_eq!(variant.weight(), Some(7));
        assert_eq!(variant.selection_logic(), ConditionLogic::Or);
    }

    #[test]
    fn static_context_overrides_display_context() {
        let host = toy::plugin_host();
        let mut display = front();
        display.set_parameter("node", "entity:node", "Node").expect("valid");
        display.add_context("node", Context::new("entity:node", json!({ "type": "page" })));

        let mut variant = variant(&display, &host);
        assert_eq!(
            variant.contexts(&display)["node"].value,
            Some(json!({ "type": "page" }))
        );

        variant.set_static_context(StaticContext::new(
            "node",
            "Pinned",
            "entity:node",
            json!({ "type": "article" }),
        ));
        assert_eq!(
            variant.contexts(&display)["node"].value,
            Some(json!({ "type": "article" }))
        );

        variant.remove_static_context("node");
        assert_eq!(
            variant.contexts(&display)["node"].value,
            Some(json!({ "type": "page" }))
        );
    }

    #[test]
    fn context_cache_holds_until_rebound() {
        let host = toy::plugin_host();
        let mut display = front();
        let mut variant = variant(&display, &host);
        assert!(variant.contexts(&display).is_empty());

        display.add_context("langcode", Context::new("string", json!("en")));
        assert!(variant.contexts(&display).is_empty());

        variant.set_display(&display);
        assert_eq!(variant.contexts(&display).len(), 1);
    }

    #[test]
    fn ownership_checks() {
        let host = toy::plugin_host();
        let display = front();
        let other = Display::new("mini_panel", "other", "Other", &EngineConfig::default())
            .expect("valid display");
        let variant = variant(&display, &host);

        assert!(variant.ensure_belongs_to(&display).is_ok());
        assert!(matches!(
            variant.ensure_belongs_to(&other),
            Err(PanelsError::VariantDisplayMismatch { .. })
        ));

        let page = Display::new("page", "front", "Front page", &EngineConfig::default())
            .expect("valid display");
        assert!(variant.ensure_belongs_to(&page).is_err());

        let mut record = variant.to_record();
        record.display_entity_id = None;
        let unbound = Variant::hydrate(record, &host);
        assert!(matches!(
            unbound.ensure_belongs_to(&display),
            Err(PanelsError::VariantUnbound(_))
        ));
    }

    #[test]
    fn cache_tags_are_the_display_tags() {
        let host = toy::plugin_host();
        let display = front();
        let variant = variant(&display, &host);
        assert_eq!(
            variant.cache_tags_to_invalidate(&display),
            display.cache_tags_to_invalidate()
        );
    }

    #[test]
    fn selection_condition_lookup() {
        let host = toy::plugin_host();
        let display = front();
        let mut variant = variant(&display, &host);
        let uuid = variant.add_selection_condition(ConditionConfig::new(toy::ALWAYS_FALSE), &host);

        assert_eq!(
            variant.selection_condition(&uuid).expect("added").plugin_id(),
            toy::ALWAYS_FALSE
        );
        assert!(matches!(
            variant.selection_condition("missing"),
            Err(PanelsError::SelectionConditionNotFound { .. })
        ));
        assert!(!variant.check_access(&display).granted());

        variant.remove_selection_condition(&uuid).expect("removable");
        assert!(variant.check_access(&display).granted());
    }

    #[test]
    fn display_denial_skips_selection() {
        let host = toy::plugin_host();
        let mut display = front();
        display.add_access_condition(ConditionConfig::new(toy::ALWAYS_FALSE), &host);
        let variant = variant(&display, &host);

        let verdict = variant.check_access(&display);
        assert!(!verdict.granted());
        assert!(verdict.selection.is_none());
    }

    #[test]
    fn dependencies_name_display_and_providers() {
        let host = toy::plugin_host();
        let display = front();
        let mut variant = variant(&display, &host);
        variant.add_selection_condition(ConditionConfig::new(toy::ALWAYS_TRUE), &host);
        variant.add_selection_condition(ConditionConfig::new("gone_module_condition"), &host);

        let dependencies = variant.calculate_dependencies(&display, &host);
        assert_eq!(
            dependencies.config,
            BTreeSet::from(["mini_panel.front".to_string()])
        );
        assert_eq!(
            dependencies.module,
            BTreeSet::from([toy::PROVIDER.to_string()])
        );
    }

    #[test]
    fn record_round_trip_and_null_weight() {
        let host = toy::plugin_host();
        let display = front();
        let mut variant = variant(&display, &host);
        variant
            .set_variant_settings(json!({ "page_title": "Hello" }), &host)
            .expect("settings accepted");
        variant.set_weight(None);
        variant.set_static_context(StaticContext::new("langcode", "", "string", json!("en")));

        let text = serde_json::to_string(&variant.to_record()).expect("serializable");
        assert!(text.contains("\"weight\":null"));

        let record: VariantRecord = serde_json::from_str(&text).expect("deserializable");
        assert_eq!(record.weight, None);
        assert_eq!(record.variant_settings, json!({ "page_title": "Hello" }));
        let restored = Variant::hydrate(record.clone(), &host);
        assert_eq!(restored.to_record(), record);

        let defaulted: VariantRecord = serde_json::from_value(json!({
            "id": "front-b",
            "label": "B",
            "variant": toy::HTTP_STATUS
        }))
        .expect("minimal record");
        assert_eq!(defaulted.weight, Some(0));
        assert_eq!(defaulted.display_entity_id, None);
    }

    #[test]
    fn unknown_plugin_keeps_settings_on_save() {
        let host = toy::plugin_host();
        let display = front();
        let mut record = VariantRecord::new("front-old", "Old", "retired_plugin", &display);
        record.variant_settings = json!({ "legacy": true });

        let variant = Variant::hydrate(record.clone(), &host);
        assert!(variant.variant_plugin().is_err());
        assert_eq!(variant.to_record(), record);
    }
}
