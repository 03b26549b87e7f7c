//! In-memory metadata store
//!
//! Keeps rows per collection in a `BTreeMap` ordered by canonical key, so
//! list queries return rows in a stable order. Used as the default backend
//! and as the store double in tests.

use crate::error::StoreError;
use crate::key::StoreKey;
use crate::store_trait::{StoreEntry, StoreTrait};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

#[derive(Debug, Clone)]
struct Row {
    key: StoreKey,
    tags: BTreeMap<String, Vec<u8>>,
}

type Collections = HashMap<String, BTreeMap<String, Row>>;

/// In-memory store shared between clones
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    collections: Arc<Mutex<Collections>>,
    faults: Arc<Mutex<HashMap<&'static str, String>>>,
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call of `operation` fail with `message`.
    ///
    /// `operation` is one of `insert`, `find`, `remove`, `remove_tag`.
    #[cfg(feature = "test-util")]
    #[allow(clippy::unwrap_used, reason = "test helper")]
    pub fn inject_fault(&self, operation: &'static str, message: impl Into<String>) {
        self.faults.lock().unwrap().insert(operation, message.into());
    }

    /// Clear a fault set with [`MemoryStore::inject_fault`]
    #[cfg(feature = "test-util")]
    #[allow(clippy::unwrap_used, reason = "test helper")]
    pub fn clear_fault(&self, operation: &'static str) {
        self.faults.lock().unwrap().remove(operation);
    }

    /// Number of rows in a collection
    #[cfg(feature = "test-util")]
    #[allow(clippy::unwrap_used, reason = "test helper")]
    pub fn row_count(&self, collection: &str) -> usize {
        self.collections
            .lock()
            .unwrap()
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    fn check_fault(&self, operation: &'static str) -> Result<(), StoreError> {
        let faults = self
            .faults
            .lock()
            .map_err(|e| StoreError::Backend(format!("fault table poisoned: {e}")))?;
        match faults.get(operation) {
            Some(message) => Err(StoreError::Backend(message.clone())),
            None => Ok(()),
        }
    }

    fn collections(&self) -> Result<MutexGuard<'_, Collections>, StoreError> {
        self.collections
            .lock()
            .map_err(|e| StoreError::Backend(format!("store poisoned: {e}")))
    }
}

fn upsert(rows: &mut BTreeMap<String, Row>, entry: StoreEntry) {
    rows.entry(entry.key.canonical())
        .or_insert_with(|| Row {
            key: entry.key,
            tags: BTreeMap::new(),
        })
        .tags
        .insert(entry.tag, entry.value);
}

#[async_trait::async_trait]
impl StoreTrait for MemoryStore {
    async fn insert(
        &self,
        collection: &str,
        key: &StoreKey,
        tag: &str,
        value: Vec<u8>,
    ) -> Result<(), StoreError> {
        self.check_fault("insert")?;
        let mut collections = self.collections()?;
        let rows = collections.entry(collection.to_string()).or_default();
        upsert(rows, StoreEntry::new(key.clone(), tag, value));
        debug!(collection, key = %key, tag, "inserted");
        Ok(())
    }

    async fn insert_batch(&self, collection: &str, entries: Vec<StoreEntry>) -> Result<(), StoreError> {
        self.check_fault("insert")?;
        let mut collections = self.collections()?;
        let rows = collections.entry(collection.to_string()).or_default();
        for entry in entries {
            upsert(rows, entry);
        }
        Ok(())
    }

    async fn find(
        &self,
        collection: &str,
        key: &StoreKey,
        tag: &str,
    ) -> Result<Vec<Vec<u8>>, StoreError> {
        self.check_fault("find")?;
        let collections = self.collections()?;
        let Some(rows) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        if !key.is_list_query() {
            return Ok(rows
                .get(&key.canonical())
                .and_then(|row| row.tags.get(tag))
                .cloned()
                .into_iter()
                .collect());
        }

        Ok(rows
            .values()
            .filter(|row| key.selects(&row.key))
            .filter_map(|row| row.tags.get(tag).cloned())
            .collect())
    }

    async fn remove(&self, collection: &str, key: &StoreKey) -> Result<(), StoreError> {
        self.check_fault("remove")?;
        let mut collections = self.collections()?;
        let rows = collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::NotFound(key.canonical()))?;

        if !rows.contains_key(&key.canonical()) {
            return Err(StoreError::NotFound(key.canonical()));
        }
        if rows.values().any(|row| key.is_ancestor_of(&row.key)) {
            return Err(StoreError::HasChildren(key.canonical()));
        }

        rows.remove(&key.canonical());
        debug!(collection, key = %key, "removed");
        Ok(())
    }

    async fn remove_tag(&self, collection: &str, key: &StoreKey, tag: &str) -> Result<(), StoreError> {
        self.check_fault("remove_tag")?;
        let mut collections = self.collections()?;
        let row = collections
            .get_mut(collection)
            .and_then(|rows| rows.get_mut(&key.canonical()))
            .ok_or_else(|| StoreError::NotFound(key.canonical()))?;
        row.tags.remove(tag);
        Ok(())
    }
}
