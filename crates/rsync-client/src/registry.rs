//! Controller registry lookup
//!
//! Controllers (the synchronizer among them) register their endpoint in the
//! metadata store. The client resolves `rsync` from there on every call.

use crate::error::RsyncError;
use dcm_store::{StoreKey, StoreTrait, find_value, insert_value};
use serde::{Deserialize, Serialize};

/// Collection holding controller registrations
pub const CONTROLLER_COLLECTION: &str = "controller";
/// Tag of the registration value
pub const CONTROLLER_TAG: &str = "controllermetadata";
/// Registered name of the resource synchronizer
pub const RSYNC_NAME: &str = "rsync";

/// Registered controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Controller {
    /// Name and free-form metadata
    pub metadata: ControllerMetadata,
    /// Endpoint
    pub spec: ControllerSpec,
}

/// Controller metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControllerMetadata {
    /// Controller name
    pub name: String,
    /// Description
    #[serde(default)]
    pub description: String,
    /// Free-form user data
    #[serde(rename = "userData1", default)]
    pub user_data1: String,
    /// Free-form user data
    #[serde(rename = "userData2", default)]
    pub user_data2: String,
}

/// Controller endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerSpec {
    /// Host name or address
    pub host: String,
    /// gRPC port
    pub port: u16,
}

impl Controller {
    /// Controller registration with empty metadata
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            metadata: ControllerMetadata {
                name: name.into(),
                ..ControllerMetadata::default()
            },
            spec: ControllerSpec {
                host: host.into(),
                port,
            },
        }
    }

    /// `http://host:port`
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("http://{}:{}", self.spec.host, self.spec.port)
    }
}

fn controller_key(name: &str) -> StoreKey {
    StoreKey::new().with("controller-name", name)
}

/// Look up a registered controller by name
///
/// # Errors
///
/// Returns [`RsyncError::ControllerNotFound`] when nothing is registered
/// under `name`.
pub async fn find_controller(store: &dyn StoreTrait, name: &str) -> Result<Controller, RsyncError> {
    find_value(store, CONTROLLER_COLLECTION, &controller_key(name), CONTROLLER_TAG)
        .await?
        .ok_or_else(|| RsyncError::ControllerNotFound(name.to_string()))
}

/// Register (or replace) a controller
///
/// # Errors
///
/// Propagates store errors.
pub async fn register_controller(store: &dyn StoreTrait, controller: &Controller) -> Result<(), RsyncError> {
    insert_value(
        store,
        CONTROLLER_COLLECTION,
        &controller_key(&controller.metadata.name),
        CONTROLLER_TAG,
        controller,
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcm_store::MemoryStore;

    #[tokio::test]
    async fn test_register_and_find() {
        let store = MemoryStore::new();
        register_controller(&store, &Controller::new("rsync", "rsync.emco", 9031))
            .await
            .unwrap();

        let found = find_controller(&store, RSYNC_NAME).await.unwrap();
        assert_eq!(found.endpoint(), "http://rsync.emco:9031");
    }

    #[tokio::test]
    async fn test_missing_controller() {
        let store = MemoryStore::new();
        let err = find_controller(&store, RSYNC_NAME).await.unwrap_err();
        assert!(matches!(err, RsyncError::ControllerNotFound(name) if name == "rsync"));
    }
}
