//! Store trait for mocking
//!
//! This trait abstracts the document store so managers can be handed any
//! backend. Production wiring and tests both go through it.

use crate::error::StoreError;
use crate::key::StoreKey;

/// One tagged value to write under a key
#[derive(Debug, Clone)]
pub struct StoreEntry {
    /// Row key
    pub key: StoreKey,
    /// Tag under which the value is kept on the row
    pub tag: String,
    /// Serialized payload
    pub value: Vec<u8>,
}

impl StoreEntry {
    /// Create an entry
    pub fn new(key: StoreKey, tag: impl Into<String>, value: Vec<u8>) -> Self {
        Self {
            key,
            tag: tag.into(),
            value,
        }
    }
}

/// Trait for metadata store operations
///
/// Rows live in named collections and carry any number of tagged values.
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait StoreTrait: Send + Sync {
    /// Blind upsert of one tagged value
    async fn insert(
        &self,
        collection: &str,
        key: &StoreKey,
        tag: &str,
        value: Vec<u8>,
    ) -> Result<(), StoreError>;

    /// Upsert several tagged values as one unit
    async fn insert_batch(&self, collection: &str, entries: Vec<StoreEntry>) -> Result<(), StoreError>;

    /// Values stored under `tag` for every row the key selects
    ///
    /// An exact key that matches nothing yields an empty vector.
    async fn find(
        &self,
        collection: &str,
        key: &StoreKey,
        tag: &str,
    ) -> Result<Vec<Vec<u8>>, StoreError>;

    /// Remove a row
    ///
    /// Fails with [`StoreError::NotFound`] when absent and
    /// [`StoreError::HasChildren`] when rows exist below it.
    async fn remove(&self, collection: &str, key: &StoreKey) -> Result<(), StoreError>;

    /// Remove a single tag from a row, keeping the rest of it
    async fn remove_tag(&self, collection: &str, key: &StoreKey, tag: &str) -> Result<(), StoreError>;
}
