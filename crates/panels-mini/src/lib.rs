//! # panels-mini
//!
//! Mini panels are displays of entity type `mini_panel` exposed as blocks.
//!
//! ```text
//! mini_panel display ──derive──> BlockDefinition  (id `mini_panel:<display id>`)
//!                                     │
//!                           MiniPanelBlock::access  ← display access conditions
//!                           MiniPanelBlock::build   ← filter variants, render survivor
//! ```
//!
//! Derived definitions are cached by [`MiniPanelDeriver`], which registers
//! itself as a display listener so saving or deleting a mini panel clears
//! the cache.

pub mod block;
pub mod deriver;
pub mod error;

pub use block::{MiniPanelBlock, filter_display_variants};
pub use deriver::{
    BLOCK_BASE_ID, BlockDefinition, MINI_PANEL_ENTITY_TYPE, MiniPanelDeriver, create_mini_panel,
};
pub use error::MiniPanelError;
