//! Block definitions derived from mini-panel displays.

use crate::error::MiniPanelError;
use panels_kernel::{
    CacheTagInvalidator, ContextRequirement, Display, DisplayListener, DisplayRecord,
    DisplayStorage, Engine, PanelsError,
};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::debug;

pub const MINI_PANEL_ENTITY_TYPE: &str = "mini_panel";

/// Base plugin id of every derived block.
pub const BLOCK_BASE_ID: &str = "mini_panel";

/// Create a new, unsaved mini-panel display.
pub fn create_mini_panel<S: DisplayStorage, I: CacheTagInvalidator>(
    engine: &Engine<S, I>,
    id: &str,
    label: &str,
) -> Result<Display, PanelsError> {
    engine.create_display(MINI_PANEL_ENTITY_TYPE, id, label)
}

/// One block per mini panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDefinition {
    /// `mini_panel:<display id>`
    pub id: String,
    pub derivative_id: String,
    pub admin_label: String,
    /// Required contexts, one per display parameter.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contexts: Vec<ContextRequirement>,
}

impl BlockDefinition {
    pub fn from_display(record: &DisplayRecord) -> Self {
        let contexts = record
            .parameters
            .values()
            .map(|parameter| ContextRequirement {
                slot: parameter.machine_name.clone(),
                data_type: parameter.data_type.clone(),
                label: parameter.label.clone(),
            })
            .collect();
        Self {
            id: format!("{BLOCK_BASE_ID}:{}", record.id),
            derivative_id: record.id.clone(),
            admin_label: format!("Mini Panel ({})", record.label),
            contexts,
        }
    }
}

/// Derives and caches block definitions from stored mini panels.
///
/// A deriver belongs to the engine it was [registered](Self::register) with.
/// The cache is cleared only by that engine's display writes, and a cached
/// answer is returned for any `storage` argument. Writes made directly
/// through [`Engine::storage_mut`] are invisible to it; call
/// [`clear_cached_definitions`](Self::clear_cached_definitions) after them.
#[derive(Debug, Default)]
pub struct MiniPanelDeriver {
    cached: RefCell<Option<Vec<BlockDefinition>>>,
}

impl MiniPanelDeriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a deriver and subscribe it to the engine's display writes.
    pub fn register<S: DisplayStorage, I: CacheTagInvalidator>(
        engine: &mut Engine<S, I>,
    ) -> Rc<Self> {
        let deriver = Rc::new(Self::new());
        engine.add_listener(deriver.clone());
        deriver
    }

    /// Definitions for every mini panel in `storage`, ordered by display id.
    pub fn derivative_definitions<S: DisplayStorage>(
        &self,
        storage: &S,
    ) -> Result<Vec<BlockDefinition>, MiniPanelError> {
        if let Some(cached) = self.cached.borrow().as_ref() {
            return Ok(cached.clone());
        }
        let definitions: Vec<BlockDefinition> = storage
            .load_displays()?
            .iter()
            .filter(|record| record.entity_type == MINI_PANEL_ENTITY_TYPE)
            .map(BlockDefinition::from_display)
            .collect();
        debug!(blocks = definitions.len(), "derived mini panel blocks");
        *self.cached.borrow_mut() = Some(definitions.clone());
        Ok(definitions)
    }

    /// Definition for one block, by block id or derivative id.
    pub fn derivative_definition<S: DisplayStorage>(
        &self,
        storage: &S,
        id: &str,
    ) -> Result<BlockDefinition, MiniPanelError> {
        let derivative_id = id
            .strip_prefix(BLOCK_BASE_ID)
            .and_then(|rest| rest.strip_prefix(':'))
            .unwrap_or(id);
        self.derivative_definitions(storage)?
            .into_iter()
            .find(|definition| definition.derivative_id == derivative_id)
            .ok_or_else(|| MiniPanelError::UnknownBlock(id.to_string()))
    }

    pub fn clear_cached_definitions(&self) {
        if self.cached.borrow_mut().take().is_some() {
            debug!("cleared mini panel block definitions");
        }
    }

    pub fn is_cached(&self) -> bool {
        self.cached.borrow().is_some()
    }
}

impl DisplayListener for MiniPanelDeriver {
    fn display_saved(&self, record: &DisplayRecord) {
        if record.entity_type == MINI_PANEL_ENTITY_TYPE {
            self.clear_cached_definitions();
        }
    }

    fn display_deleted(&self, record: &DisplayRecord) {
        if record.entity_type == MINI_PANEL_ENTITY_TYPE {
            self.clear_cached_definitions();
        }
    }
}
