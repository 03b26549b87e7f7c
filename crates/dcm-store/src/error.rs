//! Metadata store errors

use thiserror::Error;

/// Errors that can occur when talking to the metadata store
#[derive(Debug, Error)]
pub enum StoreError {
    /// No row exists for the key
    #[error("Not found: {0}")]
    NotFound(String),

    /// The row still has descendant rows and cannot be removed
    #[error("Has children: {0}")]
    HasChildren(String),

    /// Key could not be turned into a field map
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend failure (connection lost, injected fault, ...)
    #[error("Store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// True when the error means the row does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}
