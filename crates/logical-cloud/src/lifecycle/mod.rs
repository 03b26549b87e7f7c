//! Logical Cloud lifecycle
//!
//! Drives the AppContext attached to a Logical Cloud through
//! `Instantiating → Instantiated → Terminating → Terminated`. Every
//! transition is a status check followed by an action; a request that finds
//! the cloud mid-transition is rejected rather than queued.

mod instantiate;
mod readiness;
pub mod supervisor;
mod terminate;

use crate::backoff::MIN_RETRY_SECS;
use crate::binding::Backends;
use crate::kubeconfig::KubeconfigAssembler;
use crate::manager::{ClusterManager, LogicalCloudManager};
use crate::render::DEFAULT_KEY_BITS;
use readiness::ReadinessHandler;
use rsync_client::{CloudConfigTrait, RsyncClientTrait};
use std::fmt;
use std::sync::Arc;

pub use supervisor::ReadinessSupervisor;

/// Tunables of the lifecycle engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// RSA modulus size of generated user keys
    pub key_bits: usize,
    /// First delay before a readiness retry, in seconds
    pub ready_retry_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            key_bits: DEFAULT_KEY_BITS,
            ready_retry_secs: MIN_RETRY_SECS,
        }
    }
}

/// Instantiates, terminates and watches Logical Clouds
#[derive(Clone)]
pub struct LifecycleEngine {
    backends: Backends,
    logical_clouds: LogicalCloudManager,
    clusters: ClusterManager,
    rsync: Arc<dyn RsyncClientTrait>,
    cloud_configs: Arc<dyn CloudConfigTrait>,
    kubeconfigs: KubeconfigAssembler,
    supervisor: Arc<ReadinessSupervisor>,
    config: EngineConfig,
}

impl fmt::Debug for LifecycleEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleEngine")
            .field("config", &self.config)
            .field("supervisor", &self.supervisor)
            .finish_non_exhaustive()
    }
}

impl LifecycleEngine {
    /// Creates a lifecycle engine.
    pub fn new(
        backends: Backends,
        rsync: Arc<dyn RsyncClientTrait>,
        cloud_configs: Arc<dyn CloudConfigTrait>,
        config: EngineConfig,
    ) -> Self {
        Self {
            logical_clouds: LogicalCloudManager::new(backends.clone()),
            clusters: ClusterManager::new(backends.clone()),
            kubeconfigs: KubeconfigAssembler::new(backends.clone(), Arc::clone(&cloud_configs)),
            backends,
            rsync,
            cloud_configs,
            supervisor: Arc::new(ReadinessSupervisor::new()),
            config,
        }
    }

    /// Kubeconfig assembler sharing this engine's stores
    #[must_use]
    pub fn kubeconfigs(&self) -> &KubeconfigAssembler {
        &self.kubeconfigs
    }

    /// Supervisor of the readiness tasks
    #[must_use]
    pub fn supervisor(&self) -> &ReadinessSupervisor {
        &self.supervisor
    }

    fn readiness_handler(&self) -> ReadinessHandler {
        ReadinessHandler {
            backends: self.backends.clone(),
            clusters: self.clusters.clone(),
            kubeconfigs: self.kubeconfigs.clone(),
            rsync: Arc::clone(&self.rsync),
            retry_secs: self.config.ready_retry_secs,
        }
    }
}
