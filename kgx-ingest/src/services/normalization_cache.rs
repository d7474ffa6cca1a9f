//! Run-scoped normalization cache
//!
//! Every identifier is in one of three states: never asked (Miss), asked
//! and the service had no mapping or the batch failed (Unresolved), or
//! asked and mapped (Resolved). A Miss moves to one of the other two
//! states at most once per run. Later inserts for the same id are ignored.
//!
//! Caches are constructed by the caller and handed to the normalizer and
//! rewriter explicitly. Seeding from, and saving to, a JSON snapshot is
//! opt-in.

use serde::{de::DeserializeOwned, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Result of a cache lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<R> {
    /// Never looked up in this run
    Miss,
    /// Looked up; no mapping (or the batch carrying it failed)
    Unresolved,
    Resolved(Arc<R>),
}

impl<R> Lookup<R> {
    pub fn is_miss(&self) -> bool {
        matches!(self, Lookup::Miss)
    }

    pub fn resolved(&self) -> Option<&R> {
        match self {
            Lookup::Resolved(record) => Some(record),
            _ => None,
        }
    }
}

/// Serialized form of a cache: id → record, `null` for unresolved
pub type CacheSnapshot<R> = BTreeMap<String, Option<R>>;

/// Concurrent first-write-wins map from identifier to resolution
pub struct NormalizationCache<R> {
    entries: RwLock<HashMap<String, Option<Arc<R>>>>,
}

impl<R> Default for NormalizationCache<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> NormalizationCache<R> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    // A panic while holding the lock cannot leave a half-written entry,
    // so a poisoned lock still guards consistent data.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Option<Arc<R>>>> {
        self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Option<Arc<R>>>> {
        self.entries.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn lookup(&self, id: &str) -> Lookup<R> {
        match self.read().get(id) {
            None => Lookup::Miss,
            Some(None) => Lookup::Unresolved,
            Some(Some(record)) => Lookup::Resolved(Arc::clone(record)),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.read().contains_key(id)
    }

    /// Record the outcome for `id`; returns false if it already had one
    pub fn insert(&self, id: impl Into<String>, record: Option<R>) -> bool {
        let mut entries = self.write();
        let id = id.into();
        if entries.contains_key(&id) {
            return false;
        }
        entries.insert(id, record.map(Arc::new));
        true
    }

    /// Merge a whole batch under one write lock
    ///
    /// Readers never observe part of a batch. Returns how many entries
    /// were new.
    pub fn insert_batch<I>(&self, batch: I) -> usize
    where
        I: IntoIterator<Item = (String, Option<R>)>,
    {
        let mut entries = self.write();
        let mut added = 0;
        for (id, record) in batch {
            if let std::collections::hash_map::Entry::Vacant(slot) = entries.entry(id) {
                slot.insert(record.map(Arc::new));
                added += 1;
            }
        }
        added
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Ids recorded as Unresolved, sorted
    pub fn unresolved_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .read()
            .iter()
            .filter(|(_, record)| record.is_none())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }
}

impl<R: Clone> NormalizationCache<R> {
    pub fn to_snapshot(&self) -> CacheSnapshot<R> {
        self.read()
            .iter()
            .map(|(id, record)| (id.clone(), record.as_ref().map(|r| R::clone(r))))
            .collect()
    }

    pub fn from_snapshot(snapshot: CacheSnapshot<R>) -> Self {
        let cache = Self::new();
        cache.insert_batch(snapshot);
        cache
    }
}

impl<R: Clone + Serialize + DeserializeOwned> NormalizationCache<R> {
    pub fn load_json(path: &Path) -> kgx_common::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let snapshot: CacheSnapshot<R> = serde_json::from_str(&content)?;
        tracing::info!(path = %path.display(), entries = snapshot.len(), "Seeded normalization cache");
        Ok(Self::from_snapshot(snapshot))
    }

    /// Save through a temp file and rename
    pub fn save_json(&self, path: &Path) -> kgx_common::Result<()> {
        let json = serde_json::to_string(&self.to_snapshot())?;
        let temp_path = path.with_extension("json.tmp");
        std::fs::write(&temp_path, json)?;
        std::fs::rename(&temp_path, path)?;
        tracing::info!(path = %path.display(), entries = self.len(), "Saved normalization cache");
        Ok(())
    }
}
