//! Persistence collaborator.
//!
//! The kernel never owns storage. Implementations hand back persisted records
//! and the kernel hydrates them against its plugin host. Writes are whole-record
//! replacements; concurrent writers resolve last-writer-wins.

use crate::display::DisplayRecord;
use crate::error::PanelsError;
use crate::variant::VariantRecord;

pub trait DisplayStorage {
    fn load_display(&self, id: &str) -> Result<Option<DisplayRecord>, PanelsError>;

    /// Every display, ordered by id.
    fn load_displays(&self) -> Result<Vec<DisplayRecord>, PanelsError>;

    /// Variants whose `display_entity_id` is `display_id`, in storage order.
    fn load_variants_by_display(&self, display_id: &str) -> Result<Vec<VariantRecord>, PanelsError>;

    fn load_variant(&self, id: &str) -> Result<Option<VariantRecord>, PanelsError>;

    fn save_display(&mut self, record: DisplayRecord) -> Result<(), PanelsError>;

    fn save_variant(&mut self, record: VariantRecord) -> Result<(), PanelsError>;

    /// Returns whether a record was removed.
    fn delete_display(&mut self, id: &str) -> Result<bool, PanelsError>;

    fn delete_variant(&mut self, id: &str) -> Result<bool, PanelsError>;
}
