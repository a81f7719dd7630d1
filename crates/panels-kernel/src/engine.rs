//! Engine facade: storage, plugin host, cache invalidation and configuration
//! wired together behind display-level operations.
//!
//! Every collaborator is injected at construction. Nothing is looked up
//! globally.

use crate::cache::CacheTagInvalidator;
use crate::config::EngineConfig;
use crate::context::ContextMap;
use crate::display::{Display, DisplayRecord, display_cache_tags};
use crate::error::PanelsError;
use crate::plugin::PluginHost;
use crate::registry::VariantRegistry;
use crate::render::{Rendered, dispatch};
use crate::resolver::{Resolution, resolve};
use crate::storage::DisplayStorage;
use crate::variant::{AccessVerdict, Variant, VariantRecord};
use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, info};

/// Notified after a display is written or removed.
pub trait DisplayListener {
    fn display_saved(&self, record: &DisplayRecord);
    fn display_deleted(&self, record: &DisplayRecord);
}

/// What rendering a display produced.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderOutcome {
    Rendered { variant_id: String, output: Rendered },
    NoVariants,
    NoneAccessible,
    Disabled,
}

impl RenderOutcome {
    pub fn rendered(&self) -> Option<&Rendered> {
        match self {
            RenderOutcome::Rendered { output, .. } => Some(output),
            _ => None,
        }
    }
}

pub struct Engine<S, I> {
    storage: S,
    host: PluginHost,
    invalidator: I,
    config: EngineConfig,
    listeners: Vec<Rc<dyn DisplayListener>>,
}

impl<S, I> fmt::Debug for Engine<S, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("host", &self.host)
            .field("config", &self.config)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl<S: DisplayStorage, I: CacheTagInvalidator> Engine<S, I> {
    pub fn new(storage: S, host: PluginHost, invalidator: I, config: EngineConfig) -> Self {
        Self {
            storage,
            host,
            invalidator,
            config,
            listeners: Vec::new(),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Raw storage access. Writes made here skip cache invalidation and
    /// display listeners.
    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn host(&self) -> &PluginHost {
        &self.host
    }

    pub fn invalidator(&self) -> &I {
        &self.invalidator
    }

    pub fn invalidator_mut(&mut self) -> &mut I {
        &mut self.invalidator
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn add_listener(&mut self, listener: Rc<dyn DisplayListener>) {
        self.listeners.push(listener);
    }

    // ── Construction ──

    pub fn create_display(
        &self,
        entity_type: &str,
        id: &str,
        label: &str,
    ) -> Result<Display, PanelsError> {
        Display::new(entity_type, id, label, &self.config)
    }

    pub fn create_variant(
        &self,
        id: &str,
        label: &str,
        plugin_id: &str,
        display: &Display,
    ) -> Result<Variant, PanelsError> {
        Variant::new(id, label, plugin_id, display, &self.host, &self.config)
    }

    // ── Loading ──

    pub fn load_display(&self, id: &str) -> Result<Display, PanelsError> {
        let record = self
            .storage
            .load_display(id)?
            .ok_or_else(|| PanelsError::DisplayNotFound(id.to_string()))?;
        Ok(Display::hydrate(record, &self.host))
    }

    pub fn load_displays(&self) -> Result<Vec<Display>, PanelsError> {
        Ok(self
            .storage
            .load_displays()?
            .into_iter()
            .map(|record| Display::hydrate(record, &self.host))
            .collect())
    }

    pub fn load_variants(&self, display: &Display) -> Result<VariantRegistry, PanelsError> {
        VariantRegistry::load(display, &self.storage, &self.host)
    }

    /// Load a variant together with its owning display.
    pub fn load_variant(&self, id: &str) -> Result<(Variant, Display), PanelsError> {
        let record = self
            .storage
            .load_variant(id)?
            .ok_or_else(|| PanelsError::VariantRecordNotFound(id.to_string()))?;
        let variant = Variant::hydrate(record, &self.host);
        let display = self.owning_display(&variant)?;
        variant.ensure_belongs_to(&display)?;
        Ok((variant, display))
    }

    fn owning_display(&self, variant: &Variant) -> Result<Display, PanelsError> {
        let display_id = variant
            .display_id()
            .ok_or_else(|| PanelsError::VariantUnbound(variant.id().to_string()))?;
        match self.load_display(display_id) {
            Err(PanelsError::DisplayNotFound(_)) => Err(PanelsError::DisplayMissing {
                variant_id: variant.id().to_string(),
                display_id: display_id.to_string(),
            }),
            other => other,
        }
    }

    /// Evaluate both gates of one variant against `contexts`.
    pub fn variant_access(
        &self,
        variant_id: &str,
        contexts: ContextMap,
    ) -> Result<AccessVerdict, PanelsError> {
        let (mut variant, mut display) = self.load_variant(variant_id)?;
        display.set_contexts(contexts);
        variant.set_display(&display);
        Ok(variant.check_access(&display))
    }

    // ── Rendering ──

    /// Load a display, supply `contexts`, resolve and render.
    pub fn render_display(
        &self,
        id: &str,
        contexts: ContextMap,
    ) -> Result<RenderOutcome, PanelsError> {
        let mut display = self.load_display(id)?;
        display.set_contexts(contexts);
        self.render(&display)
    }

    /// Resolve and render a display whose contexts are already set.
    pub fn render(&self, display: &Display) -> Result<RenderOutcome, PanelsError> {
        if !display.status() {
            let display_id = display.id();
            debug!(display = display_id, "display disabled");
            return Ok(RenderOutcome::Disabled);
        }
        let registry = self.load_variants(display)?;
        let report = resolve(display, registry.variants());
        match report.resolution {
            Resolution::NoVariants => Ok(RenderOutcome::NoVariants),
            Resolution::NoneAccessible => Ok(RenderOutcome::NoneAccessible),
            Resolution::Selected(variant) => Ok(RenderOutcome::Rendered {
                variant_id: variant.id().to_string(),
                output: self.dispatch(display, variant)?,
            }),
        }
    }

    /// Render one variant, bounding its max-age by the configured cache policy.
    pub fn dispatch(&self, display: &Display, variant: &Variant) -> Result<Rendered, PanelsError> {
        let mut output = dispatch(display, variant)?;
        output.cache.max_age = output.cache.max_age.min(self.config.cache.max_age);
        Ok(output)
    }

    // ── Writes ──

    pub fn save_display(&mut self, display: &Display) -> Result<(), PanelsError> {
        let record = display.to_record();
        if let Some(existing) = self.storage.load_display(&record.id)?
            && existing.entity_type != record.entity_type
        {
            return Err(PanelsError::DisplayIdConflict {
                id: record.id,
                existing: existing.entity_type,
                requested: record.entity_type,
            });
        }
        let tags = record.cache_tags_to_invalidate();
        self.storage.save_display(record.clone())?;
        info!(display = record.id.as_str(), entity_type = record.entity_type.as_str(), "saved display");
        self.invalidate(&tags);
        for listener in &self.listeners {
            listener.display_saved(&record);
        }
        Ok(())
    }

    /// Delete a display. Its variants stay in storage.
    pub fn delete_display(&mut self, id: &str) -> Result<bool, PanelsError> {
        let Some(record) = self.storage.load_display(id)? else {
            return Ok(false);
        };
        let removed = self.storage.delete_display(id)?;
        info!(display = id, removed, "deleted display");
        self.invalidate(&record.cache_tags_to_invalidate());
        for listener in &self.listeners {
            listener.display_deleted(&record);
        }
        Ok(removed)
    }

    pub fn save_variant(&mut self, variant: &Variant) -> Result<(), PanelsError> {
        let display = self.owning_display(variant)?;
        variant.ensure_belongs_to(&display)?;
        self.storage.save_variant(variant.to_record())?;
        let display_id = display.id();
        info!(variant = variant.id(), display = display_id, "saved variant");
        self.invalidate(&variant.cache_tags_to_invalidate(&display));
        Ok(())
    }

    pub fn delete_variant(&mut self, id: &str) -> Result<bool, PanelsError> {
        let Some(record) = self.storage.load_variant(id)? else {
            return Ok(false);
        };
        let removed = self.storage.delete_variant(id)?;
        info!(variant = id, removed, "deleted variant");
        self.invalidate(&variant_tags(&record));
        Ok(removed)
    }

    /// Remove a variant from `registry` and delete its stored record.
    pub fn remove_variant(
        &mut self,
        registry: &mut VariantRegistry,
        variant_id: &str,
    ) -> Result<Variant, PanelsError> {
        registry.get(variant_id)?;
        self.delete_variant(variant_id)?;
        registry.detach(variant_id)
    }

    fn invalidate(&mut self, tags: &BTreeSet<String>) {
        self.invalidator.invalidate_tags(tags);
    }
}

// The owning display may already be gone when a variant is deleted.
fn variant_tags(record: &VariantRecord) -> BTreeSet<String> {
    match (&record.display_entity_type, &record.display_entity_id) {
        (Some(entity_type), Some(id)) => display_cache_tags(entity_type, id),
        _ => BTreeSet::new(),
    }
}
