//! # Panels Kernel
//!
//! Display composition: a display owns weighted, condition-gated variants,
//! and each request resolves to exactly one of them, which is then rendered.
//!
//! This crate is **host-agnostic**: it does not prescribe how displays are
//! stored or where plugins come from. Both are injected collaborators
//! ([`DisplayStorage`], [`PluginHost`]).
//!
//! ## Architecture
//!
//! ```text
//! Context store         ← Parameters + supplied values, static overrides
//!     │
//! Condition evaluator   ← and/or gates, faults count as denials
//!     │
//! Variant registry      ← A display's variants in weight order (None last)
//!     │
//! Variant resolver      ← First variant passing display + selection gates
//!     │
//! Render dispatcher     ← Plugin build + cache metadata from the display
//! ```

pub mod cache;
pub mod condition;
pub mod config;
pub mod context;
pub mod display;
pub mod engine;
pub mod error;
pub mod machine_name;
pub mod plugin;
pub mod registry;
pub mod render;
pub mod resolver;
pub mod storage;
pub mod toy;
pub mod variant;

pub use cache::{CacheMetadata, CacheTagInvalidator, InvalidationLog, MaxAge};
pub use condition::{
    ConditionCollection, ConditionConfig, ConditionFault, ConditionInstance, ConditionLogic,
    ConditionOutcome, GateVerdict, evaluate_conditions,
};
pub use config::{ConfigError, EngineConfig};
pub use context::{ANY_TYPE, Context, ContextMap, Parameter, StaticContext, type_satisfies};
pub use display::{Display, DisplayRecord};
pub use engine::{DisplayListener, Engine, RenderOutcome};
pub use error::PanelsError;
pub use plugin::{
    Condition, ContextRequirement, PluginDefinition, PluginError, PluginHost, PluginKind,
    VariantPlugin,
};
pub use registry::VariantRegistry;
pub use render::{RenderNode, Rendered, dispatch};
pub use resolver::{Resolution, ResolveReport, VariantTrace, resolve};
pub use storage::DisplayStorage;
pub use variant::{AccessVerdict, Dependencies, Variant, VariantRecord};
