//! AppContext errors

use thiserror::Error;

/// Errors raised while reading or writing an AppContext tree
#[derive(Debug, Error)]
pub enum AppContextError {
    /// The key or context does not exist
    #[error("AppContext key not found: {0}")]
    NotFound(String),

    /// A handle does not belong to this context or has the wrong shape
    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend failure
    #[error("AppContext store error: {0}")]
    Store(String),
}
