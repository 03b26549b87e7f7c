//! Kubeconfig assembly for Logical Cloud users
//!
//! Once a cluster has signed the user's CSR, the certificate is copied from
//! the AppContext status onto the cluster reference and combined with the
//! stored private key and the cluster admin endpoint into a kubeconfig. The
//! result is registered with the CloudConfig store so the synchronizer can
//! deploy into the Logical Cloud as that user.

use crate::binding::{Backends, Binding};
use crate::error::DcmError;
use crate::manager::{ClusterManager, LogicalCloudManager};
use crate::models::{
    ClusterReference, LEVEL_ADMIN, LOGICAL_CLOUD_APP, LogicalCloud, LogicalCloudKey,
    ORCHESTRATOR_COLLECTION, ToStoreKey, tags,
};
use appcontext::{AppContext, AppContextError, AppContextStatus, CsrStatus, ResourceBundleStatus};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use dcm_store::find_value;
use rsync_client::{CloudConfigTrait, RsyncError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Kubeconfig structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Kubeconfig {
    /// API version
    pub api_version: String,
    /// Kind (always "Config")
    pub kind: String,
    /// Clusters
    pub clusters: Vec<KubeconfigCluster>,
    /// Contexts
    pub contexts: Vec<KubeconfigContext>,
    /// Current context
    pub current_context: String,
    /// Preferences (always empty)
    #[serde(default)]
    pub preferences: BTreeMap<String, String>,
    /// Users
    pub users: Vec<KubeconfigUser>,
}

/// Cluster entry in kubeconfig
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KubeconfigCluster {
    /// Cluster name
    pub name: String,
    /// Cluster config
    pub cluster: ClusterConfig,
}

/// Cluster configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ClusterConfig {
    /// CA certificate (base64 encoded)
    #[serde(default)]
    pub certificate_authority_data: String,
    /// API server URL
    pub server: String,
}

/// Context entry in kubeconfig
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KubeconfigContext {
    /// Context name
    pub name: String,
    /// Context config
    pub context: ContextConfig,
}

/// Context configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Cluster name (reference)
    pub cluster: String,
    /// Default namespace
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    /// User name (reference)
    pub user: String,
}

/// User entry in kubeconfig
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KubeconfigUser {
    /// User name
    pub name: String,
    /// User config
    pub user: UserConfig,
}

/// User configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UserConfig {
    /// Base64 PEM client certificate
    pub client_certificate_data: String,
    /// Base64 PEM client key
    pub client_key_data: String,
}

/// The part of a cluster admin kubeconfig that is reused
#[derive(Debug, Deserialize)]
struct AdminKubeconfig {
    #[serde(default)]
    clusters: Vec<KubeconfigCluster>,
}

impl Kubeconfig {
    /// Kubeconfig authenticating `lc`'s user against one cluster
    #[must_use]
    pub fn for_user(lc: &LogicalCloud, cluster_ref: &str, admin: ClusterConfig, certificate: &str, private_key: &str) -> Self {
        let user = lc.user_name().to_string();
        let context_name = format!("{user}@{cluster_ref}");
        Self {
            api_version: "v1".to_string(),
            kind: "Config".to_string(),
            clusters: vec![KubeconfigCluster {
                name: cluster_ref.to_string(),
                cluster: admin,
            }],
            contexts: vec![KubeconfigContext {
                name: context_name.clone(),
                context: ContextConfig {
                    cluster: cluster_ref.to_string(),
                    namespace: lc.spec.namespace.clone(),
                    user: user.clone(),
                },
            }],
            current_context: context_name,
            preferences: BTreeMap::new(),
            users: vec![KubeconfigUser {
                name: user,
                user: UserConfig {
                    client_certificate_data: certificate.to_string(),
                    client_key_data: private_key.to_string(),
                },
            }],
        }
    }
}

/// Assembles per-cluster user kubeconfigs
#[derive(Clone)]
pub struct KubeconfigAssembler {
    backends: Backends,
    logical_clouds: LogicalCloudManager,
    clusters: ClusterManager,
    cloud_configs: Arc<dyn CloudConfigTrait>,
}

impl fmt::Debug for KubeconfigAssembler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KubeconfigAssembler").finish_non_exhaustive()
    }
}

impl KubeconfigAssembler {
    /// Creates a kubeconfig assembler.
    pub fn new(backends: Backends, cloud_configs: Arc<dyn CloudConfigTrait>) -> Self {
        Self {
            logical_clouds: LogicalCloudManager::new(backends.clone()),
            clusters: ClusterManager::new(backends.clone()),
            backends,
            cloud_configs,
        }
    }

    async fn instantiated_context(&self, project: &str, logical_cloud: &str) -> Result<AppContext, DcmError> {
        match self.backends.binding(project, logical_cloud).await? {
            Binding::Bound(ctx, AppContextStatus::Instantiating | AppContextStatus::Instantiated) => Ok(ctx),
            Binding::Unbound => Err(DcmError::NotInstantiated(format!(
                "Logical Cloud {logical_cloud} hasn't been instantiated yet"
            ))),
            Binding::Pending(_) => Err(DcmError::NotInstantiated(format!(
                "Logical Cloud {logical_cloud} was not accepted by the synchronizer yet"
            ))),
            Binding::Bound(_, status) => Err(DcmError::NotInstantiated(format!(
                "Logical Cloud {logical_cloud} is {status}"
            ))),
        }
    }

    async fn private_key(&self, project: &str, logical_cloud: &str) -> Result<String, DcmError> {
        let key = LogicalCloudKey::new(project, logical_cloud).to_store_key()?;
        find_value(self.backends.store.as_ref(), ORCHESTRATOR_COLLECTION, &key, tags::PRIVATE_KEY)
            .await?
            .ok_or_else(|| DcmError::Internal(format!("Logical Cloud {logical_cloud} has no private key")))
    }

    /// Copy the issued certificate from the cluster status onto the reference
    async fn issued_certificate(
        &self,
        project: &str,
        logical_cloud: &str,
        ctx: &AppContext,
        mut reference: ClusterReference,
    ) -> Result<String, DcmError> {
        let cluster = reference.full_name();
        debug!(project, logical_cloud, cluster = %cluster, "certificate not stored yet, reading cluster status");

        let handle = match ctx.get_cluster_status_handle(LOGICAL_CLOUD_APP, &cluster).await {
            Ok(handle) => handle,
            Err(AppContextError::NotFound(_)) => {
                return Err(DcmError::NotYetIssued(format!(
                    "cluster {cluster} has not reported a status yet"
                )));
            }
            Err(e) => return Err(e.into()),
        };
        let status = ResourceBundleStatus::from_value(&ctx.get_value(&handle).await?)?;

        let certificate = match status.csr_status()? {
            CsrStatus::Approved(bytes) => STANDARD.encode(bytes),
            CsrStatus::Pending => {
                return Err(DcmError::NotYetIssued(format!(
                    "the CSR for cluster {cluster} hasn't been approved or issued yet"
                )));
            }
            CsrStatus::Denied => return Err(DcmError::CertificateDenied(cluster)),
            CsrStatus::Failed => return Err(DcmError::CertificateFailed(cluster)),
        };

        reference.spec.certificate.clone_from(&certificate);
        let name = reference.name().to_string();
        self.clusters.update(project, logical_cloud, &name, reference).await?;
        info!(project, logical_cloud, cluster = %cluster, "stored issued user certificate");
        Ok(certificate)
    }

    async fn admin_cluster(&self, reference: &ClusterReference) -> Result<ClusterConfig, DcmError> {
        let provider = &reference.spec.cluster_provider;
        let cluster = &reference.spec.cluster_name;
        let cloud_config = self
            .cloud_configs
            .get_cloud_config(provider, cluster, LEVEL_ADMIN, "")
            .await
            .map_err(|e| DcmError::internal("fetching admin CloudConfig", e))?;

        let raw = STANDARD
            .decode(cloud_config.config.as_bytes())
            .map_err(|e| DcmError::internal("decoding admin kubeconfig", e))?;
        let admin: AdminKubeconfig = serde_yaml::from_slice(&raw)
            .map_err(|e| DcmError::internal("parsing admin kubeconfig", e))?;
        admin
            .clusters
            .into_iter()
            .next()
            .map(|c| c.cluster)
            .ok_or_else(|| DcmError::Internal(format!("admin kubeconfig of {provider}+{cluster} has no clusters")))
    }

    /// Kubeconfig of the Logical Cloud user for one cluster reference.
    ///
    /// The kubeconfig is also registered with the CloudConfig store at the
    /// Logical Cloud's level and namespace; an existing entry is kept.
    ///
    /// # Errors
    ///
    /// Returns [`DcmError::NotInstantiated`] without a live AppContext,
    /// [`DcmError::NotYetIssued`] until the certificate is issued,
    /// [`DcmError::CertificateDenied`] / [`DcmError::CertificateFailed`]
    /// when the cluster refused the CSR, and [`DcmError::NotFound`] for an
    /// unknown Logical Cloud or reference.
    pub async fn get_cluster_config(
        &self,
        project: &str,
        logical_cloud: &str,
        cluster_ref: &str,
    ) -> Result<String, DcmError> {
        let ctx = self.instantiated_context(project, logical_cloud).await?;
        let lc = self.logical_clouds.get(project, logical_cloud).await?;
        let private_key = self.private_key(project, logical_cloud).await?;
        let reference = self.clusters.get(project, logical_cloud, cluster_ref).await?;

        let certificate = if reference.spec.certificate.is_empty() {
            self.issued_certificate(project, logical_cloud, &ctx, reference.clone())
                .await?
        } else {
            reference.spec.certificate.clone()
        };

        let admin = self.admin_cluster(&reference).await?;
        let kubeconfig = Kubeconfig::for_user(&lc, cluster_ref, admin, &certificate, &private_key);
        let yaml = serde_yaml::to_string(&kubeconfig)
            .map_err(|e| DcmError::internal("serializing user kubeconfig", e))?;

        match self
            .cloud_configs
            .create_cloud_config(
                &reference.spec.cluster_provider,
                &reference.spec.cluster_name,
                lc.level(),
                &lc.spec.namespace,
                &STANDARD.encode(yaml.as_bytes()),
            )
            .await
        {
            Ok(_) => {
                info!(project, logical_cloud, cluster = %reference.full_name(), "registered user kubeconfig");
            }
            Err(RsyncError::CloudConfigExists(_)) => {
                debug!(project, logical_cloud, cluster = %reference.full_name(), "user kubeconfig already registered");
            }
            Err(e) => return Err(DcmError::internal("registering user kubeconfig", e)),
        }

        Ok(yaml)
    }
}
