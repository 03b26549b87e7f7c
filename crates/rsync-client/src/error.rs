//! Resource synchronizer client errors

use dcm_store::StoreError;
use thiserror::Error;

/// Errors that can occur when talking to the resource synchronizer
#[derive(Debug, Error)]
pub enum RsyncError {
    /// Channel could not be established or broke
    #[error("Transport error: {0}")]
    Transport(String),

    /// The synchronizer answered with a gRPC error status
    #[error("Rsync returned status: {0}")]
    Status(#[from] tonic::Status),

    /// No controller named `rsync` is registered
    #[error("Controller not registered: {0}")]
    ControllerNotFound(String),

    /// The synchronizer refused the request
    #[error("Rsync rejected request: {0}")]
    Rejected(String),

    /// CloudConfig lookup found nothing
    #[error("No CloudConfig was returned: {0}")]
    CloudConfigNotFound(String),

    /// CloudConfig already exists for the tuple
    #[error("CloudConfig already exists: {0}")]
    CloudConfigExists(String),

    /// Metadata store failure
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// AppContext failure (only raised by the in-memory double)
    #[error("AppContext error: {0}")]
    AppContext(#[from] appcontext::AppContextError),
}

impl From<tonic::transport::Error> for RsyncError {
    fn from(e: tonic::transport::Error) -> Self {
        RsyncError::Transport(e.to_string())
    }
}
