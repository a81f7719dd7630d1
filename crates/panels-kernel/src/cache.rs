//! Cache metadata carried by render output, and tag invalidation.
//!
//! Merging is a join: tags and contexts are unioned, max-age takes the
//! minimum. [`MaxAge::Permanent`] is the identity for max-age.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// How long a rendered result may be cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxAge {
    #[default]
    Permanent,
    Seconds(u64),
}

impl MaxAge {
    pub fn min(self, other: MaxAge) -> MaxAge {
        match (self, other) {
            (MaxAge::Permanent, other) => other,
            (this, MaxAge::Permanent) => this,
            (MaxAge::Seconds(a), MaxAge::Seconds(b)) => MaxAge::Seconds(a.min(b)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CacheMetadata {
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub contexts: BTreeSet<String>,
    #[serde(default)]
    pub max_age: MaxAge,
}

impl CacheMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn with_tags<T: Into<String>>(mut self, tags: impl IntoIterator<Item = T>) -> Self {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.contexts.insert(context.into());
        self
    }

    pub fn with_max_age(mut self, max_age: MaxAge) -> Self {
        self.max_age = max_age;
        self
    }

    /// Fold `other` into `self`.
    pub fn merge(&mut self, other: &CacheMetadata) {
        self.tags.extend(other.tags.iter().cloned());
        self.contexts.extend(other.contexts.iter().cloned());
        self.max_age = self.max_age.min(other.max_age);
    }

    pub fn merged(mut self, other: &CacheMetadata) -> Self {
        self.merge(other);
        self
    }
}

/// Receives cache tags whose dependents must be dropped.
pub trait CacheTagInvalidator {
    fn invalidate_tags(&mut self, tags: &BTreeSet<String>);
}

/// In-memory invalidator that records every batch it receives.
#[derive(Debug, Clone, Default)]
pub struct InvalidationLog {
    batches: Vec<BTreeSet<String>>,
}

impl InvalidationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> &[BTreeSet<String>] {
        &self.batches
    }

    pub fn is_invalidated(&self, tag: &str) -> bool {
        self.batches.iter().any(|batch| batch.contains(tag))
    }

    pub fn clear(&mut self) {
        self.batches.clear();
    }
}

impl CacheTagInvalidator for InvalidationLog {
    fn invalidate_tags(&mut self, tags: &BTreeSet<String>) {
        if tags.is_empty() {
            return;
        }
        tracing::debug!(tags = ?tags, "invalidating cache tags");
        self.batches.push(tags.clone());
    }
}
