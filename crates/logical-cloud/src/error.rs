//! Logical Cloud errors
//!
//! Every failure carries an explicit [`ErrorKind`] so transports can pick a
//! response code without inspecting messages.

use appcontext::AppContextError;
use dcm_store::StoreError;
use rsync_client::RsyncError;
use std::fmt;
use thiserror::Error;

/// Why the current AppContext state forbids an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictReason {
    /// Instantiate while the previous instantiation is being terminated
    BeingTerminated,
    /// Instantiate while already instantiated
    AlreadyInstantiated,
    /// Instantiate while instantiation is in progress
    AlreadyInstantiating,
    /// Instantiate after a failed transition; terminate first
    MustTerminateFirst,
    /// Terminate after termination finished
    AlreadyTerminated,
    /// Terminate while termination is in progress
    AlreadyTerminating,
    /// Terminate while instantiation is in progress
    StillInstantiating,
    /// Stop outside a transition
    NotTransitioning,
    /// Mutation refused while an AppContext is live
    ContextActive(String),
    /// Delete refused while child records exist
    HasChildren,
    /// Status not covered by the state table
    UnexpectedStatus(String),
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BeingTerminated => f.write_str("The Logical Cloud is being terminated, please wait"),
            Self::AlreadyInstantiated => f.write_str("The Logical Cloud is already instantiated"),
            Self::AlreadyInstantiating => f.write_str("The Logical Cloud is already being instantiated"),
            Self::MustTerminateFirst => {
                f.write_str("The Logical Cloud must be terminated before it can be instantiated again")
            }
            Self::AlreadyTerminated => f.write_str("The Logical Cloud has already been terminated"),
            Self::AlreadyTerminating => f.write_str("The Logical Cloud is already being terminated"),
            Self::StillInstantiating => {
                f.write_str("The Logical Cloud is still instantiating, terminate it once instantiated")
            }
            Self::NotTransitioning => f.write_str("The Logical Cloud is not instantiating or terminating"),
            Self::ContextActive(status) => write!(f, "The Logical Cloud AppContext is {status}"),
            Self::HasChildren => f.write_str("The resource still has child resources"),
            Self::UnexpectedStatus(status) => write!(f, "Unexpected AppContext status: {status}"),
        }
    }
}

/// Flat classification of [`DcmError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Entity absent
    NotFound,
    /// Duplicate create
    AlreadyExists,
    /// Operation forbidden by the current AppContext state
    ConflictState,
    /// Quota or primary-namespace permission missing
    PreconditionMissing,
    /// Level-0 clusters disagree on namespace
    PreconditionMixedNamespaces,
    /// Certificate not issued yet; retry later
    NotYetIssued,
    /// Operation requires an instantiated Logical Cloud
    NotInstantiated,
    /// Operation is not supported
    NotImplemented,
    /// The cluster refused to sign the user certificate
    CertificateRejected,
    /// Malformed request
    InvalidInput,
    /// Store, RPC or cleanup failure
    Internal,
}

/// Errors raised by the Logical Cloud core
#[derive(Debug, Error)]
pub enum DcmError {
    /// Entity absent
    #[error("{0} not found")]
    NotFound(String),

    /// Duplicate create
    #[error("{0} already exists")]
    AlreadyExists(String),

    /// Forbidden by the current AppContext state
    #[error("{reason}")]
    Conflict {
        /// What the state forbids
        reason: ConflictReason,
    },

    /// Quota or primary-namespace permission missing
    #[error("Precondition missing: {0}")]
    PreconditionMissing(String),

    /// Level-0 clusters disagree on namespace
    #[error("All clusters of a Level-0 Logical Cloud must share one namespace: {0}")]
    PreconditionMixedNamespaces(String),

    /// Certificate not issued yet
    #[error("Certificate not yet issued: {0}")]
    NotYetIssued(String),

    /// Operation requires an instantiated Logical Cloud
    #[error("Logical Cloud is not instantiated: {0}")]
    NotInstantiated(String),

    /// Operation is not supported
    #[error("{0}")]
    NotImplemented(String),

    /// The cluster denied the certificate signing request
    #[error("Certificate was denied for cluster {0}")]
    CertificateDenied(String),

    /// The cluster failed to issue the certificate
    #[error("Certificate issue failed for cluster {0}")]
    CertificateFailed(String),

    /// Malformed request
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Store, RPC or other internal failure
    #[error("{0}")]
    Internal(String),

    /// An operation failed and cleaning up after it failed too
    #[error("{original} (cleanup also failed: {cleanup})")]
    WithCleanup {
        /// Root cause, used for classification
        original: Box<DcmError>,
        /// Cleanup failure
        cleanup: Box<DcmError>,
    },
}

impl DcmError {
    /// Conflict error for `reason`
    #[must_use]
    pub fn conflict(reason: ConflictReason) -> Self {
        DcmError::Conflict { reason }
    }

    /// Internal error with a human-readable context
    pub fn internal(context: &str, source: impl fmt::Display) -> Self {
        DcmError::Internal(format!("{context}: {source}"))
    }

    /// Pair a root cause with a cleanup failure, if there was one
    #[must_use]
    pub fn with_cleanup(original: DcmError, cleanup: Option<DcmError>) -> Self {
        match cleanup {
            Some(cleanup) => DcmError::WithCleanup {
                original: Box::new(original),
                cleanup: Box::new(cleanup),
            },
            None => original,
        }
    }

    /// Classification of the error; a cleanup aggregate classifies as its root cause
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            DcmError::NotFound(_) => ErrorKind::NotFound,
            DcmError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            DcmError::Conflict { .. } => ErrorKind::ConflictState,
            DcmError::PreconditionMissing(_) => ErrorKind::PreconditionMissing,
            DcmError::PreconditionMixedNamespaces(_) => ErrorKind::PreconditionMixedNamespaces,
            DcmError::NotYetIssued(_) => ErrorKind::NotYetIssued,
            DcmError::NotInstantiated(_) => ErrorKind::NotInstantiated,
            DcmError::NotImplemented(_) => ErrorKind::NotImplemented,
            DcmError::CertificateDenied(_) | DcmError::CertificateFailed(_) => {
                ErrorKind::CertificateRejected
            }
            DcmError::InvalidInput(_) => ErrorKind::InvalidInput,
            DcmError::Internal(_) => ErrorKind::Internal,
            DcmError::WithCleanup { original, .. } => original.kind(),
        }
    }

    /// Conflict reason, if this is a conflict
    #[must_use]
    pub fn conflict_reason(&self) -> Option<&ConflictReason> {
        match self {
            DcmError::Conflict { reason } => Some(reason),
            DcmError::WithCleanup { original, .. } => original.conflict_reason(),
            _ => None,
        }
    }
}

impl From<StoreError> for DcmError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(key) => DcmError::NotFound(key),
            StoreError::HasChildren(_) => DcmError::conflict(ConflictReason::HasChildren),
            other => DcmError::internal("metadata store", other),
        }
    }
}

impl From<AppContextError> for DcmError {
    fn from(e: AppContextError) -> Self {
        DcmError::internal("AppContext", e)
    }
}

impl From<RsyncError> for DcmError {
    fn from(e: RsyncError) -> Self {
        DcmError::internal("rsync", e)
    }
}
