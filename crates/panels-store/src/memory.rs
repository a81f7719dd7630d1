//! In-memory display and variant records.
//!
//! Displays are keyed by id. Variants keep insertion order, which is the
//! storage order the kernel uses to break weight ties. Duplicate ids on load
//! resolve last-write-wins.

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::jsonl::{read_records_from_path, write_records_to_path};
use panels_kernel::{DisplayRecord, DisplayStorage, PanelsError, VariantRecord};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    displays: BTreeMap<String, DisplayRecord>,
    variants: Vec<VariantRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(displays: Vec<DisplayRecord>, variants: Vec<VariantRecord>) -> Self {
        let mut store = Self::new();
        for display in displays {
            store.upsert_display(display);
        }
        for variant in variants {
            store.upsert_variant(variant);
        }
        store
    }

    /// Load both record files. Both must exist.
    pub fn load_jsonl(
        displays_path: impl AsRef<Path>,
        variants_path: impl AsRef<Path>,
    ) -> Result<Self, StoreError> {
        let displays = read_records_from_path(displays_path)?;
        let variants = read_records_from_path(variants_path)?;
        Ok(Self::from_records(displays, variants))
    }

    pub fn save_jsonl(
        &self,
        displays_path: impl AsRef<Path>,
        variants_path: impl AsRef<Path>,
    ) -> Result<(), StoreError> {
        let displays: Vec<&DisplayRecord> = self.displays.values().collect();
        write_records_to_path(displays_path, &displays)?;
        write_records_to_path(variants_path, &self.variants)?;
        Ok(())
    }

    /// Load the configured files. A missing file is an empty collection.
    pub fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        let displays = if config.displays_path.exists() {
            read_records_from_path(&config.displays_path)?
        } else {
            Vec::new()
        };
        let variants = if config.variants_path.exists() {
            read_records_from_path(&config.variants_path)?
        } else {
            Vec::new()
        };
        debug!(
            displays = displays.len(),
            variants = variants.len(),
            path = %config.displays_path.display(),
            "opened store"
        );
        Ok(Self::from_records(displays, variants))
    }

    pub fn flush(&self, config: &StoreConfig) -> Result<(), StoreError> {
        self.save_jsonl(&config.displays_path, &config.variants_path)
    }

    pub fn display_count(&self) -> usize {
        self.displays.len()
    }

    pub fn variant_count(&self) -> usize {
        self.variants.len()
    }

    pub fn display(&self, id: &str) -> Option<&DisplayRecord> {
        self.displays.get(id)
    }

    pub fn variant(&self, id: &str) -> Option<&VariantRecord> {
        self.variants.iter().find(|variant| variant.id == id)
    }

    pub fn displays(&self) -> impl Iterator<Item = &DisplayRecord> {
        self.displays.values()
    }

    pub fn variants(&self) -> &[VariantRecord] {
        &self.variants
    }

    /// Insert or replace a display. Returns the previous record.
    pub fn upsert_display(&mut self, display: DisplayRecord) -> Option<DisplayRecord> {
        self.displays.insert(display.id.clone(), display)
    }

    /// Insert or replace a variant in place. Returns the previous record.
    pub fn upsert_variant(&mut self, variant: VariantRecord) -> Option<VariantRecord> {
        match self.variants.iter_mut().find(|existing| existing.id == variant.id) {
            Some(existing) => Some(std::mem::replace(existing, variant)),
            None => {
                self.variants.push(variant);
                None
            }
        }
    }

    pub fn remove_display(&mut self, id: &str) -> Option<DisplayRecord> {
        self.displays.remove(id)
    }

    pub fn remove_variant(&mut self, id: &str) -> Option<VariantRecord> {
        let index = self.variants.iter().position(|variant| variant.id == id)?;
        Some(self.variants.remove(index))
    }
}

impl DisplayStorage for MemoryStore {
    fn load_display(&self, id: &str) -> Result<Option<DisplayRecord>, PanelsError> {
        Ok(self.display(id).cloned())
    }

    fn load_displays(&self) -> Result<Vec<DisplayRecord>, PanelsError> {
        Ok(self.displays().cloned().collect())
    }

    fn load_variants_by_display(&self, display_id: &str) -> Result<Vec<VariantRecord>, PanelsError> {
        Ok(self
            .variants
            .iter()
            .filter(|variant| variant.display_entity_id.as_deref() == Some(display_id))
            .cloned()
            .collect())
    }

    fn load_variant(&self, id: &str) -> Result<Option<VariantRecord>, PanelsError> {
        Ok(self.variant(id).cloned())
    }

    fn save_display(&mut self, record: DisplayRecord) -> Result<(), PanelsError> {
        self.upsert_display(record);
        Ok(())
    }

    fn save_variant(&mut self, record: VariantRecord) -> Result<(), PanelsError> {
        self.upsert_variant(record);
        Ok(())
    }

    fn delete_display(&mut self, id: &str) -> Result<bool, PanelsError> {
        Ok(self.remove_display(id).is_some())
    }

    fn delete_variant(&mut self, id: &str) -> Result<bool, PanelsError> {
        Ok(self.remove_variant(id).is_some())
    }
}
