//! The read-mostly, process-wide source registry (spec §3.5).
//!
//! Loaded once at startup from the storage backend and immutable to core
//! components thereafter; an administrative reload atomically replaces the
//! whole map and invalidates caches. Pattern matches the teacher's
//! `SchemaRegistry`/`SCHEMAS` singleton, but each [`Engine`](crate::engine::Engine)
//! also holds a private, non-global instance so tests don't leak state across
//! each other.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::ids::SourceId;
use crate::types::SourceMeta;

/// Thread-safe registry of [`SourceMeta`], keyed by [`SourceId`].
#[derive(Clone, Debug, Default)]
pub struct SourceRegistry(Arc<RwLock<BTreeMap<SourceId, SourceMeta>>>);

impl SourceRegistry {
    pub fn new() -> Self {
        SourceRegistry(Arc::new(RwLock::new(BTreeMap::new())))
    }

    pub fn from_entries(entries: Vec<SourceMeta>) -> Self {
        let registry = SourceRegistry::new();
        registry.replace(entries);
        registry
    }

    /// Atomically replace the entire registry contents (administrative reload).
    pub fn replace(&self, entries: Vec<SourceMeta>) {
        let mut writer = self.0.write();
        writer.clear();
        for meta in entries {
            writer.insert(meta.source_id.clone(), meta);
        }
    }

    pub fn contains(&self, id: &SourceId) -> bool {
        self.0.read().contains_key(id)
    }

    pub fn get(&self, id: &SourceId) -> Option<SourceMeta> {
        self.0.read().get(id).cloned()
    }

    pub fn ids(&self) -> Vec<SourceId> {
        self.0.read().keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.read().is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    pub fn all(&self) -> Vec<SourceMeta> {
        self.0.read().values().cloned().collect()
    }
}
