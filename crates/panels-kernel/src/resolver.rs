//! Variant resolver: pick the first accessible variant in weight order.
//!
//! ```text
//! variants ──sort by weight──> v1, v2, ... vn
//!   for each vi:
//!     display gate (access conditions, display contexts)
//!     selection gate (selection conditions, variant contexts)
//!     both pass -> selected, stop
//! none pass -> NoneAccessible
//! empty     -> NoVariants
//! ```
//!
//! Resolution is deterministic and independent of the input order. Condition
//! faults deny the variant they belong to; they never abort resolution.

use crate::display::Display;
use crate::registry::compare_weights;
use crate::variant::{AccessVerdict, Variant};
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub enum Resolution<'a> {
    Selected(&'a Variant),
    /// The display has no variants at all.
    NoVariants,
    /// Variants exist but every one was denied.
    NoneAccessible,
}

impl<'a> Resolution<'a> {
    pub fn selected(&self) -> Option<&'a Variant> {
        match self {
            Resolution::Selected(variant) => Some(variant),
            _ => None,
        }
    }
}

/// Verdict for one evaluated variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantTrace {
    pub variant_id: String,
    pub weight: Option<i64>,
    pub access: AccessVerdict,
}

#[derive(Debug, Clone)]
pub struct ResolveReport<'a> {
    pub resolution: Resolution<'a>,
    /// Evaluated variants in evaluation order. Variants after the winner are absent.
    pub trace: Vec<VariantTrace>,
}

/// Resolve `display` to at most one of `variants`.
pub fn resolve<'a>(display: &Display, variants: &'a [Variant]) -> ResolveReport<'a> {
    let display_id = display.id();
    if variants.is_empty() {
        debug!(display = display_id, "display has no variants");
        return ResolveReport {
            resolution: Resolution::NoVariants,
            trace: Vec::new(),
        };
    }

    let mut ordered: Vec<&'a Variant> = variants.iter().collect();
    ordered.sort_by(|left, right| compare_weights(left.weight(), right.weight()));

    let mut trace = Vec::with_capacity(ordered.len());
    for variant in ordered {
        let access = variant.check_access(display);
        let granted = access.granted();
        debug!(
            display = display_id,
            variant = variant.id(),
            weight = ?variant.weight(),
            display_gate = access.display.passed,
            selection_gate = ?access.selection.as_ref().map(|gate| gate.passed),
            granted,
            "evaluated variant"
        );
        trace.push(VariantTrace {
            variant_id: variant.id().to_string(),
            weight: variant.weight(),
            access,
        });
        if granted {
            return ResolveReport {
                resolution: Resolution::Selected(variant),
                trace,
            };
        }
    }

    debug!(display = display_id, evaluated = trace.len(), "no variant accessible");
    ResolveReport {
        resolution: Resolution::NoneAccessible,
        trace,
    }
}
