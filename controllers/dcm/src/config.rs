//! Process configuration read from the environment

use crate::error::ControllerError;
use logical_cloud::EngineConfig;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_PORT: u16 = 9015;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// DCM process configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// HTTP bind address
    pub listen_addr: SocketAddr,
    /// Fixed synchronizer URI; `None` resolves it from the controller registry
    pub rsync_endpoint: Option<String>,
    /// gRPC connect timeout
    pub rsync_connect_timeout: Duration,
    /// Lifecycle engine tunables
    pub engine: EngineConfig,
}

fn parse<T: FromStr>(name: &str, value: Option<String>, default: T) -> Result<T, ControllerError>
where
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ControllerError::InvalidConfig(format!("{name}={raw}: {e}"))),
    }
}

impl Config {
    /// Read the configuration from process environment variables
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the configuration through `lookup`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ControllerError> {
        let listen_addr = parse(
            "DCM_LISTEN_ADDR",
            lookup("DCM_LISTEN_ADDR"),
            SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
        )?;
        let rsync_endpoint = lookup("DCM_RSYNC_ENDPOINT").filter(|v| !v.trim().is_empty());
        let connect_timeout = parse(
            "DCM_RSYNC_CONNECT_TIMEOUT_SECS",
            lookup("DCM_RSYNC_CONNECT_TIMEOUT_SECS"),
            DEFAULT_CONNECT_TIMEOUT_SECS,
        )?;
        let defaults = EngineConfig::default();
        let engine = EngineConfig {
            key_bits: parse("DCM_KEY_BITS", lookup("DCM_KEY_BITS"), defaults.key_bits)?,
            ready_retry_secs: parse(
                "DCM_READY_RETRY_SECS",
                lookup("DCM_READY_RETRY_SECS"),
                defaults.ready_retry_secs,
            )?,
        };

        Ok(Self {
            listen_addr,
            rsync_endpoint,
            rsync_connect_timeout: Duration::from_secs(connect_timeout),
            engine,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            rsync_endpoint: None,
            rsync_connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            engine: EngineConfig::default(),
        }
    }
}
