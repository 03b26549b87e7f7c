//! Controller-specific error types.
//!
//! Errors that stop the DCM process. Request-level failures are
//! [`logical_cloud::DcmError`] and never reach this type.

use thiserror::Error;

/// Errors that can occur in the DCM controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Listener or server I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A background task ended unexpectedly
    #[error("Task failed: {0}")]
    Watch(String),
}
