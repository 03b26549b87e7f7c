//! Status values written into an AppContext by the resource synchronizer
//!
//! Two kinds of status are read back: the lifecycle status of the whole
//! composite app, and a per-cluster resource-bundle status that carries the
//! state of the user's certificate signing request.

use crate::error::AppContextError;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Base64 of `---`, the start of every PEM block
pub const PEM_BASE64_PREFIX: &str = "LS0t";

/// Lifecycle status of a composite app
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppContextStatus {
    /// Synchronizer is applying resources
    Instantiating,
    /// All resources applied
    Instantiated,
    /// Applying resources failed
    InstantiateFailed,
    /// Synchronizer is removing resources
    Terminating,
    /// All resources removed
    Terminated,
    /// Removing resources failed
    TerminateFailed,
    /// Anything the synchronizer wrote that is not recognised
    Unknown(String),
}

impl AppContextStatus {
    /// Parse the synchronizer's string form
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "Instantiating" => Self::Instantiating,
            "Instantiated" => Self::Instantiated,
            "InstantiateFailed" => Self::InstantiateFailed,
            "Terminating" => Self::Terminating,
            "Terminated" => Self::Terminated,
            "TerminateFailed" => Self::TerminateFailed,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// String form as written by the synchronizer
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Instantiating => "Instantiating",
            Self::Instantiated => "Instantiated",
            Self::InstantiateFailed => "InstantiateFailed",
            Self::Terminating => "Terminating",
            Self::Terminated => "Terminated",
            Self::TerminateFailed => "TerminateFailed",
            Self::Unknown(other) => other,
        }
    }
}

impl fmt::Display for AppContextStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored form of the composite app status: `{"status": "..."}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusRecord {
    /// Status string
    pub status: String,
}

/// Outcome of a certificate signing request on one cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CsrStatus {
    /// Approved and issued; holds the PEM certificate bytes
    Approved(Vec<u8>),
    /// Denied by the cluster
    Denied,
    /// Signing failed on the cluster
    Failed,
    /// No status yet, not approved yet, or approved without a certificate
    Pending,
}

/// Per-cluster resource bundle status
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceBundleStatus {
    /// Statuses of the certificate signing requests applied on the cluster
    #[serde(rename = "csrStatuses", default)]
    pub csr_statuses: Vec<CsrStatusEntry>,
}

/// One CSR as reported by the cluster
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CsrStatusEntry {
    /// Observed CSR status
    #[serde(default)]
    pub status: CsrObservedStatus,
}

/// Kubernetes `CertificateSigningRequestStatus`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CsrObservedStatus {
    /// Conditions, in the order the cluster reported them
    #[serde(default)]
    pub conditions: Vec<CsrCondition>,
    /// Base64 of the issued PEM certificate
    #[serde(default)]
    pub certificate: Option<String>,
}

/// Kubernetes `CertificateSigningRequestCondition` (only the fields read here)
#[derive(Debug, Clone, Deserialize)]
pub struct CsrCondition {
    /// `Approved`, `Denied` or `Failed`
    #[serde(rename = "type")]
    pub condition_type: String,
}

impl ResourceBundleStatus {
    /// Parse a status value read from the tree.
    ///
    /// The synchronizer stores the status as a JSON document serialized into
    /// a string; an already structured object is accepted too.
    ///
    /// # Errors
    ///
    /// Returns [`AppContextError::Serialization`] when the value is not a
    /// resource bundle status.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, AppContextError> {
        match value {
            serde_json::Value::String(raw) => Ok(serde_json::from_str(raw)?),
            other => Ok(serde_json::from_value(other.clone())?),
        }
    }

    fn first_csr(&self) -> Option<&CsrObservedStatus> {
        self.csr_statuses.first().map(|entry| &entry.status)
    }

    /// Classify the first CSR of the bundle.
    ///
    /// The first `Denied` or `Failed` condition wins over an `Approved` one.
    ///
    /// # Errors
    ///
    /// Returns [`AppContextError::Serialization`] when the certificate is not
    /// valid base64.
    pub fn csr_status(&self) -> Result<CsrStatus, AppContextError> {
        let Some(csr) = self.first_csr() else {
            return Ok(CsrStatus::Pending);
        };

        let mut approved = false;
        for condition in &csr.conditions {
            match condition.condition_type.as_str() {
                "Denied" => return Ok(CsrStatus::Denied),
                "Failed" => return Ok(CsrStatus::Failed),
                "Approved" => approved = true,
                _ => {}
            }
        }
        if !approved {
            return Ok(CsrStatus::Pending);
        }

        match csr.certificate.as_deref() {
            Some(cert) if !cert.is_empty() => {
                let bytes = STANDARD.decode(cert).map_err(|e| {
                    AppContextError::Serialization(serde::de::Error::custom(format!(
                        "certificate is not base64: {e}"
                    )))
                })?;
                Ok(CsrStatus::Approved(bytes))
            }
            _ => Ok(CsrStatus::Pending),
        }
    }

    /// Whether the cluster reports an issued certificate.
    ///
    /// True when the certificate field holds base64-encoded PEM and no
    /// `Denied` or `Failed` condition is present.
    #[must_use]
    pub fn certificate_ready(&self) -> bool {
        let Some(csr) = self.first_csr() else {
            return false;
        };
        let rejected = csr
            .conditions
            .iter()
            .any(|c| c.condition_type == "Denied" || c.condition_type == "Failed");
        let has_pem = csr
            .certificate
            .as_deref()
            .is_some_and(|cert| cert.starts_with(PEM_BASE64_PREFIX));
        has_pem && !rejected
    }
}
