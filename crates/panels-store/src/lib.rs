//! # panels-store
//!
//! Persistence collaborator for the Panels kernel.
//!
//! This crate provides:
//! - JSONL read/write for display and variant records
//! - `MemoryStore`, an in-memory [`DisplayStorage`] implementation
//! - `StoreConfig`, the TOML-configured file locations
//!
//! ## Data model
//!
//! ```text
//! displays.jsonl / variants.jsonl (one record per line)
//!     ↕  hydrate / flush
//! MemoryStore (displays by id, variants in insertion order)
//!     ↕  DisplayStorage
//! panels-kernel Engine
//! ```
//!
//! [`DisplayStorage`]: panels_kernel::DisplayStorage

pub mod config;
pub mod error;
pub mod jsonl;
pub mod memory;

pub use config::StoreConfig;
pub use error::StoreError;
pub use jsonl::{JsonlError, read_records, read_records_from_path, write_records, write_records_to_path};
pub use memory::MemoryStore;
