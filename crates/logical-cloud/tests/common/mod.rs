//! Shared fixtures for the Logical Cloud integration tests

#![allow(dead_code)]

use appcontext::{AppContext, ContextStoreTrait, MemoryContextStore};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use dcm_store::MemoryStore;
use logical_cloud::{
    Backends, ClusterReference, ClusterReferenceSpec, DcmService, EngineConfig, LogicalCloud,
    LogicalCloudSpec, Metadata, Quota, UserData, UserPermission, UserPermissionSpec,
};
use rsync_client::{CloudConfigTrait, MockRsyncClient, StoreCloudConfig};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

pub const PROJECT: &str = "testproject";
pub const LC: &str = "testlc";
pub const PEM_CERT: &str = "-----BEGIN CERTIFICATE-----\nMIIBszCCAVmgAwIBAgIU\n-----END CERTIFICATE-----\n";

pub struct Harness {
    pub store: MemoryStore,
    pub contexts: MemoryContextStore,
    pub rsync: MockRsyncClient,
    pub cloud_configs: Arc<StoreCloudConfig>,
    pub backends: Backends,
    pub service: DcmService,
}

/// Service over in-memory stores. With `synchronizer` the mock writes the
/// lifecycle statuses a real synchronizer would.
pub fn harness(synchronizer: bool) -> Harness {
    let store = MemoryStore::new();
    let contexts = MemoryContextStore::new();
    let context_store: Arc<dyn ContextStoreTrait> = Arc::new(contexts.clone());
    let rsync = if synchronizer {
        MockRsyncClient::with_context_store(Arc::clone(&context_store))
    } else {
        MockRsyncClient::new()
    };
    let cloud_configs = Arc::new(StoreCloudConfig::new(Arc::new(store.clone())));
    let backends = Backends::new(Arc::new(store.clone()), context_store);
    let config = EngineConfig {
        key_bits: 2048,
        ready_retry_secs: 5,
    };
    let service = DcmService::new(
        backends.clone(),
        Arc::new(rsync.clone()),
        Arc::clone(&cloud_configs) as Arc<dyn CloudConfigTrait>,
        config,
    );
    Harness {
        store,
        contexts,
        rsync,
        cloud_configs,
        backends,
        service,
    }
}

pub fn logical_cloud(name: &str, level: &str, namespace: &str) -> LogicalCloud {
    LogicalCloud {
        metadata: Metadata::named(name),
        spec: LogicalCloudSpec {
            namespace: namespace.to_string(),
            level: level.to_string(),
            user: UserData {
                user_name: "lcuser".to_string(),
                user_type: "certificate".to_string(),
                user_permissions: Vec::new(),
            },
        },
    }
}

pub fn cluster_reference(name: &str, provider: &str, cluster: &str) -> ClusterReference {
    ClusterReference {
        metadata: Metadata::named(name),
        spec: ClusterReferenceSpec {
            cluster_provider: provider.to_string(),
            cluster_name: cluster.to_string(),
            loadbalancer_ip: "0.0.0.0".to_string(),
            certificate: String::new(),
        },
    }
}

pub fn quota() -> Quota {
    Quota {
        metadata: Metadata::named("testquota"),
        spec: BTreeMap::from([
            ("limits.cpu".to_string(), "4".to_string()),
            ("limits.memory".to_string(), "4096".to_string()),
        ]),
    }
}

pub fn user_permission(name: &str, namespace: &str) -> UserPermission {
    UserPermission {
        metadata: Metadata::named(name),
        spec: UserPermissionSpec {
            namespace: namespace.to_string(),
            api_groups: vec![String::new(), "apps".to_string()],
            resources: vec!["deployments".to_string(), "pods".to_string()],
            verbs: vec!["get".to_string(), "list".to_string()],
        },
    }
}

impl Harness {
    /// Project, Level-1 cloud `testlc`, one cluster `testcp+testcl` named
    /// `lc-cl-1`, one quota, and the given permission namespaces
    pub async fn standard_cloud(&self, permission_namespaces: &[&str]) {
        self.service.projects().create(PROJECT).await.unwrap();
        self.service
            .logical_clouds()
            .create(PROJECT, logical_cloud(LC, "1", "testns"))
            .await
            .unwrap();
        self.service
            .clusters()
            .create(PROJECT, LC, cluster_reference("lc-cl-1", "testcp", "testcl"))
            .await
            .unwrap();
        self.service.quotas().create(PROJECT, LC, quota()).await.unwrap();
        for (i, namespace) in permission_namespaces.iter().enumerate() {
            self.service
                .user_permissions()
                .create(PROJECT, LC, user_permission(&format!("testup{i}"), namespace))
                .await
                .unwrap();
        }
    }

    /// AppContext currently bound to `name`
    pub async fn context(&self, name: &str) -> AppContext {
        let id = self
            .backends
            .context_id(PROJECT, name)
            .await
            .unwrap()
            .expect("Logical Cloud is bound");
        AppContext::load(Arc::new(self.contexts.clone()), &id)
            .await
            .unwrap()
    }

    /// Register the level-0 admin kubeconfig of a cluster
    pub async fn admin_kubeconfig(&self, provider: &str, cluster: &str, namespace: &str) {
        let yaml = format!(
            "apiVersion: v1\nkind: Config\nclusters:\n- name: {cluster}\n  cluster:\n    certificate-authority-data: Q0FEQVRB\n    server: https://{cluster}.example:6443\ncontexts: []\nusers: []\n"
        );
        self.cloud_configs
            .create_cloud_config(provider, cluster, "0", namespace, &STANDARD.encode(yaml))
            .await
            .unwrap();
    }

    /// Write the resource bundle status of one cluster the way the
    /// synchronizer does: a JSON document serialized into a string
    pub async fn write_csr_status(&self, name: &str, cluster: &str, conditions: &[&str], certificate: Option<&str>) {
        let ctx = self.context(name).await;
        let root = ctx.get_composite_app_handle().await.unwrap();
        let cluster_handle = ctx
            .get_level_handle(&root, &format!("app/logical-cloud/cluster/{cluster}"))
            .await
            .unwrap();
        let conditions: Vec<_> = conditions.iter().map(|c| json!({ "type": c })).collect();
        let mut status = json!({ "conditions": conditions });
        if let Some(cert) = certificate {
            status["certificate"] = json!(STANDARD.encode(cert));
        }
        let bundle = json!({ "csrStatuses": [{ "status": status }] }).to_string();
        ctx.add_level_value(&cluster_handle, "status", &bundle)
            .await
            .unwrap();
    }

    /// Wait until `check` holds, polling for a bounded time
    pub async fn eventually(&self, mut check: impl FnMut(&Self) -> bool) -> bool {
        for _ in 0..500 {
            if check(self) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }
}
