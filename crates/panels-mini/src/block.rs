//! The mini-panel block: access and build for one derived block.

use crate::deriver::{BlockDefinition, MINI_PANEL_ENTITY_TYPE};
use crate::error::MiniPanelError;
use panels_kernel::registry::sort_by_weight;
use panels_kernel::{
    CacheTagInvalidator, Context, ContextMap, Display, DisplayStorage, Engine, RenderOutcome,
    Variant,
};
use tracing::debug;

/// Narrow `variants` to the first accessible one in weight order.
///
/// An empty input comes back unchanged, so an empty result means either
/// "no variants" or "none accessible". Callers that need the difference must
/// check for emptiness before filtering.
pub fn filter_display_variants(display: &Display, mut variants: Vec<Variant>) -> Vec<Variant> {
    if variants.is_empty() {
        return variants;
    }
    sort_by_weight(&mut variants);
    match variants
        .iter()
        .position(|variant| variant.check_access(display).granted())
    {
        Some(index) => vec![variants.swap_remove(index)],
        None => Vec::new(),
    }
}

/// A placed mini-panel block with the contexts its region supplies.
#[derive(Debug, Clone)]
pub struct MiniPanelBlock {
    definition: BlockDefinition,
    contexts: ContextMap,
}

impl MiniPanelBlock {
    pub fn new(definition: BlockDefinition) -> Self {
        Self {
            definition,
            contexts: ContextMap::new(),
        }
    }

    pub fn definition(&self) -> &BlockDefinition {
        &self.definition
    }

    pub fn derivative_id(&self) -> &str {
        &self.definition.derivative_id
    }

    pub fn set_context(&mut self, name: impl Into<String>, context: Context) -> &mut Self {
        self.contexts.insert(name.into(), context);
        self
    }

    pub fn set_contexts(&mut self, contexts: ContextMap) -> &mut Self {
        self.contexts = contexts;
        self
    }

    pub fn contexts(&self) -> &ContextMap {
        &self.contexts
    }

    fn load_panel<S: DisplayStorage, I: CacheTagInvalidator>(
        &self,
        engine: &Engine<S, I>,
    ) -> Result<Display, MiniPanelError> {
        let mut display = engine.load_display(self.derivative_id())?;
        if display.entity_type() != MINI_PANEL_ENTITY_TYPE {
            return Err(MiniPanelError::NotAMiniPanel {
                id: display.id().to_string(),
                entity_type: display.entity_type().to_string(),
            });
        }
        display.set_contexts(self.contexts.clone());
        Ok(display)
    }

    /// Whether the block may be shown: the panel is enabled and its access gate passes.
    pub fn access<S: DisplayStorage, I: CacheTagInvalidator>(
        &self,
        engine: &Engine<S, I>,
    ) -> Result<bool, MiniPanelError> {
        let display = self.load_panel(engine)?;
        Ok(display.status() && display.check_access().passed)
    }

    pub fn build<S: DisplayStorage, I: CacheTagInvalidator>(
        &self,
        engine: &Engine<S, I>,
    ) -> Result<RenderOutcome, MiniPanelError> {
        let display = self.load_panel(engine)?;
        if !display.status() {
            return Ok(RenderOutcome::Disabled);
        }
        let variants = engine.load_variants(&display)?.into_variants();
        if variants.is_empty() {
            return Ok(RenderOutcome::NoVariants);
        }

        let Some(variant) = filter_display_variants(&display, variants).into_iter().next() else {
            debug!(block = %self.definition.id, "no accessible mini panel variant");
            return Ok(RenderOutcome::NoneAccessible);
        };
        let output = engine.dispatch(&display, &variant)?;
        Ok(RenderOutcome::Rendered {
            variant_id: variant.id().to_string(),
            output,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use panels_kernel::{ConditionConfig, EngineConfig, PluginHost, toy};

    fn panel() -> Display {
        Display::new(MINI_PANEL_ENTITY_TYPE, "side", "Side", &EngineConfig::default())
            .expect("valid display")
    }

    fn variant(display: &Display, host: &PluginHost, id: &str, weight: Option<i64>, pass: bool) -> Variant {
        let mut variant = Variant::new(id, id, toy::HTTP_STATUS, display, host, &EngineConfig::default())
            .expect("valid variant");
        variant.set_weight(weight);
        let plugin = if pass { toy::ALWAYS_TRUE } else { toy::ALWAYS_FALSE };
        variant.add_selection_condition(ConditionConfig::new(plugin), host);
        variant
    }

    #[test]
    fn empty_input_is_returned_unchanged() {
        assert!(filter_display_variants(&panel(), Vec::new()).is_empty());
    }

    #[test]
    fn keeps_only_first_accessible_by_weight() {
        let host = toy::plugin_host();
        let display = panel();
        let survivors = filter_display_variants(
            &display,
            vec![
                variant(&display, &host, "side-c", None, true),
                variant(&display, &host, "side-b", Some(2), true),
                variant(&display, &host, "side-a", Some(1), false),
            ],
        );
        let ids: Vec<&str> = survivors.iter().map(Variant::id).collect();
        assert_eq!(ids, vec!["side-b"]);
    }

    #[test]
    fn nothing_accessible_filters_to_empty() {
        let host = toy::plugin_host();
        let display = panel();
        let survivors = filter_display_variants(
            &display,
            vec![variant(&display, &host, "side-a", Some(0), false)],
        );
        assert!(survivors.is_empty());
    }
}
