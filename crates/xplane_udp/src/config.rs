//! # Client Configuration
//!
//! Protocol constants and tunables, loadable from a TOML file.
//! Every key is optional; missing keys keep their defaults.
//!
//! ```toml
//! receive_timeout_ms = 1500
//! keepalive_dataref = "sim/network/misc/network_time_sec"
//! ```

use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{XPlaneError, XPlaneResult};
use crate::{DEFAULT_TIMEOUT_MS, MULTICAST_GROUP, MULTICAST_PORT};

/// Dataref subscribed at startup so the simulator keeps streaming.
pub const DEFAULT_KEEPALIVE_DATAREF: &str = "sim/network/misc/network_time_sec";

/// Client configuration.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Multicast group of the beacon.
    pub multicast_group: Ipv4Addr,
    /// Multicast port of the beacon.
    pub multicast_port: u16,
    /// Discovery deadline in milliseconds.
    pub discovery_timeout_ms: u64,
    /// Per-receive deadline of the receive loop in milliseconds.
    pub receive_timeout_ms: u64,
    /// Fixed name field width of a subscribe packet.
    pub subscribe_name_width: usize,
    /// Fixed name field width of a set packet.
    pub set_name_width: usize,
    /// Subscribed at startup so the registry is never empty while the transport runs.
    ///
    /// A config file cannot turn it off: an empty name is rejected. `None` is only
    /// reachable from code and leaves the simulator silent until the caller's first
    /// `add_dataref`, which is meant for callers (and tests) that subscribe immediately.
    pub keepalive_dataref: Option<String>,
    /// Sentinel dataref stopped during shutdown.
    pub close_marker_dataref: String,
    /// Local address for steady-state traffic.
    pub bind_address: SocketAddr,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            multicast_group: MULTICAST_GROUP,
            multicast_port: MULTICAST_PORT,
            discovery_timeout_ms: DEFAULT_TIMEOUT_MS,
            receive_timeout_ms: DEFAULT_TIMEOUT_MS,
            subscribe_name_width: 400,
            set_name_width: 500,
            keepalive_dataref: Some(DEFAULT_KEEPALIVE_DATAREF.to_string()),
            close_marker_dataref: "inop".to_string(),
            bind_address: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
        }
    }
}

impl ClientConfig {
    /// Parses a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> XPlaneResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| XPlaneError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration file.
    pub fn load(path: impl AsRef<Path>) -> XPlaneResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Discovery deadline.
    #[must_use]
    pub const fn discovery_timeout(&self) -> Duration {
        Duration::from_millis(self.discovery_timeout_ms)
    }

    /// Per-receive deadline of the receive loop.
    #[must_use]
    pub const fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    fn validate(&self) -> XPlaneResult<()> {
        if self.receive_timeout_ms == 0 || self.discovery_timeout_ms == 0 {
            return Err(XPlaneError::Config("timeouts must be greater than zero".into()));
        }
        if self.subscribe_name_width < 2 || self.set_name_width < 2 {
            return Err(XPlaneError::Config("name field widths must be at least 2 bytes".into()));
        }
        if self.keepalive_dataref.as_deref().is_some_and(str::is_empty) {
            return Err(XPlaneError::Config("keepalive_dataref must not be empty".into()));
        }
        if !self.multicast_group.is_multicast() {
            return Err(XPlaneError::Config(format!(
                "{} is not a multicast address",
                self.multicast_group
            )));
        }
        Ok(())
    }
}
