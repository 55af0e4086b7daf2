//! In-process path cache.
//!
//! Paths are memoized under their query fingerprint and dropped eagerly when
//! a write touches an entity on the path. The cache is best-effort: a miss
//! always falls back to recomputing from the relationship store.
//!
//! The lock is held only for map operations, never across an `.await`.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use kg_core::entities::GraphPath;
use kg_core::enums::RelationshipType;

/// Cache key for a path query.
///
/// `relationship_types` is sorted and deduplicated; empty means unfiltered.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathFingerprint {
    pub start_key: String,
    pub end_key: String,
    pub max_depth: u32,
    pub relationship_types: Vec<RelationshipType>,
}

impl PathFingerprint {
    #[must_use]
    pub fn new(start_key: &str, end_key: &str, max_depth: u32) -> Self {
        Self {
            start_key: start_key.to_string(),
            end_key: end_key.to_string(),
            max_depth,
            relationship_types: Vec::new(),
        }
    }

    /// Narrow the fingerprint to paths built from `types` only.
    #[must_use]
    pub fn with_relationship_types(mut self, types: &[RelationshipType]) -> Self {
        let mut types = types.to_vec();
        types.sort_unstable();
        types.dedup();
        self.relationship_types = types;
        self
    }
}

#[derive(Debug, Default)]
pub struct PathCache {
    entries: Mutex<HashMap<PathFingerprint, GraphPath>>,
}

impl PathCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave the map half-updated.
    fn lock(&self) -> MutexGuard<'_, HashMap<PathFingerprint, GraphPath>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn get(&self, fingerprint: &PathFingerprint) -> Option<GraphPath> {
        self.lock().get(fingerprint).cloned()
    }

    pub fn insert(&self, fingerprint: PathFingerprint, path: GraphPath) {
        self.lock().insert(fingerprint, path);
    }

    /// Drop every cached path that starts, ends, or passes through `key`.
    /// Returns the number of entries removed.
    pub fn invalidate_entity(&self, key: &str) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, path| !path.touches(key));
        before - entries.len()
    }

    /// Drop every cached path that traverses the stored edge, or touches either endpoint.
    pub fn invalidate_edge(
        &self,
        source_key: &str,
        target_key: &str,
        relationship_type: RelationshipType,
    ) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, path| {
            !(path.uses_edge(source_key, target_key, relationship_type)
                || path.touches(source_key)
                || path.touches(target_key))
        });
        before - entries.len()
    }

    pub fn clear(&self) -> usize {
        let mut entries = self.lock();
        let n = entries.len();
        entries.clear();
        n
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
