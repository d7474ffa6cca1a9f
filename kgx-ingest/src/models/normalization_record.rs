//! Resolved forms stored in the normalization caches

use serde::{Deserialize, Serialize};

/// Resolved form of a node identifier
///
/// Immutable once stored in a cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizationRecord {
    /// Preferred identifier for the concept
    pub canonical_id: String,
    /// Preferred label, when the service has one
    #[serde(default)]
    pub label: Option<String>,
    /// Categories, most specific first
    #[serde(default)]
    pub categories: Vec<String>,
    /// Equivalent identifiers, first-seen order, no duplicates
    #[serde(default)]
    pub equivalent_identifiers: Vec<String>,
}

impl NormalizationRecord {
    pub fn new(canonical_id: impl Into<String>) -> Self {
        Self {
            canonical_id: canonical_id.into(),
            label: None,
            categories: Vec::new(),
            equivalent_identifiers: Vec::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    /// Set equivalent identifiers, dropping repeats
    pub fn with_equivalent_identifiers<I, S>(mut self, identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for identifier in identifiers.into_iter().map(Into::into) {
            if !unique.contains(&identifier) {
                unique.push(identifier);
            }
        }
        self.equivalent_identifiers = unique;
        self
    }
}

/// Resolved form of a relation (predicate normalization)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredicateRecord {
    /// Canonical predicate, e.g. `biolink:interacts_with`
    pub identifier: String,
    #[serde(default)]
    pub label: Option<String>,
}
