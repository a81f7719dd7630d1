//! Variant registry: a display's variants in weight order.
//!
//! Ordering is ascending weight. Equal weights keep their original (storage)
//! order, and variants without a weight sort after every weighted one.

use crate::display::Display;
use crate::error::PanelsError;
use crate::plugin::PluginHost;
use crate::storage::DisplayStorage;
use crate::variant::Variant;
use std::cmp::Ordering;
use tracing::{debug, warn};

/// Weight ordering with `None` last.
pub fn compare_weights(left: Option<i64>, right: Option<i64>) -> Ordering {
    match (left, right) {
        (Some(left), Some(right)) => left.cmp(&right),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Stable sort by weight.
pub fn sort_by_weight(variants: &mut [Variant]) {
    variants.sort_by(|left, right| compare_weights(left.weight(), right.weight()));
}

#[derive(Debug)]
pub struct VariantRegistry {
    display_entity_type: String,
    display_id: String,
    variants: Vec<Variant>,
}

impl VariantRegistry {
    pub fn new(display: &Display) -> Self {
        Self {
            display_entity_type: display.entity_type().to_string(),
            display_id: display.id().to_string(),
            variants: Vec::new(),
        }
    }

    /// Build from already-hydrated variants. Every variant must claim `display`.
    pub fn from_variants(display: &Display, variants: Vec<Variant>) -> Result<Self, PanelsError> {
        let mut registry = Self::new(display);
        for variant in &variants {
            variant.ensure_belongs_to(display)?;
        }
        registry.variants = variants;
        sort_by_weight(&mut registry.variants);
        Ok(registry)
    }

    /// Load and hydrate every variant stored for `display`.
    ///
    /// Records left behind by a deleted display of another entity type that
    /// shared this id are skipped.
    pub fn load<S: DisplayStorage>(
        display: &Display,
        storage: &S,
        host: &PluginHost,
    ) -> Result<Self, PanelsError> {
        let display_id = display.id();
        let entity_type = display.entity_type();
        let variants = storage
            .load_variants_by_display(display_id)?
            .into_iter()
            .filter(|record| match record.display_entity_type.as_deref() {
                Some(claimed) if claimed != entity_type => {
                    warn!(
                        variant = %record.id,
                        display = display_id,
                        claimed,
                        entity_type,
                        "skipping variant of another display type"
                    );
                    false
                }
                _ => true,
            })
            .map(|record| Variant::hydrate(record, host))
            .collect::<Vec<_>>();
        debug!(display = display_id, variants = variants.len(), "loaded variants");
        Self::from_variants(display, variants)
    }

    pub fn display_id(&self) -> &str {
        &self.display_id
    }

    /// Variants in weight order.
    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    pub fn into_variants(self) -> Vec<Variant> {
        self.variants
    }

    pub fn ids(&self) -> Vec<&str> {
        self.variants.iter().map(Variant::id).collect()
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    pub fn get(&self, variant_id: &str) -> Result<&Variant, PanelsError> {
        self.variants
            .iter()
            .find(|variant| variant.id() == variant_id)
            .ok_or_else(|| self.not_found(variant_id))
    }

    pub fn get_mut(&mut self, variant_id: &str) -> Result<&mut Variant, PanelsError> {
        let error = self.not_found(variant_id);
        self.variants
            .iter_mut()
            .find(|variant| variant.id() == variant_id)
            .ok_or(error)
    }

    /// Add or replace a variant. It must claim this registry's display.
    pub fn add(&mut self, variant: Variant) -> Result<(), PanelsError> {
        variant.ensure_owned_by(&self.display_entity_type, &self.display_id)?;
        match self
            .variants
            .iter()
            .position(|existing| existing.id() == variant.id())
        {
            Some(index) => self.variants[index] = variant,
            None => self.variants.push(variant),
        }
        sort_by_weight(&mut self.variants);
        Ok(())
    }

    /// Drop a variant from the collection only. Deleting the stored record
    /// goes through [`Engine::remove_variant`](crate::engine::Engine::remove_variant).
    pub(crate) fn detach(&mut self, variant_id: &str) -> Result<Variant, PanelsError> {
        let index = self
            .variants
            .iter()
            .position(|variant| variant.id() == variant_id)
            .ok_or_else(|| self.not_found(variant_id))?;
        Ok(self.variants.remove(index))
    }

    pub fn set_weight(&mut self, variant_id: &str, weight: Option<i64>) -> Result<(), PanelsError> {
        self.get_mut(variant_id)?.set_weight(weight);
        sort_by_weight(&mut self.variants);
        Ok(())
    }

    fn not_found(&self, variant_id: &str) -> PanelsError {
        PanelsError::VariantNotFound {
            display_id: self.display_id.clone(),
            variant_id: variant_id.to_string(),
        }
    }
}
