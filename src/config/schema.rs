//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::throttle::ProfileName;

/// Port tried first when nothing else is configured.
pub const DEFAULT_PREFERRED_PORT: u16 = 8080;

/// Ports tried, in order, when the preferred port cannot be bound.
pub const DEFAULT_FALLBACK_PORTS: [u16; 4] = [8888, 8889, 8890, 8891];

/// Root configuration for the throttling proxy.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listening socket and port fallback.
    pub listener: ListenerConfig,

    /// Relay timeouts and buffer sizes.
    pub relay: RelayConfig,

    /// Initial throttle profile.
    pub throttle: ThrottleConfig,

    /// Admin control API.
    pub admin: AdminConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Interface to bind (e.g., "0.0.0.0" or "127.0.0.1").
    pub bind_host: String,

    /// Port tried first. `0` lets the OS choose.
    pub preferred_port: u16,

    /// Ports tried in order when the preferred port is taken.
    pub fallback_ports: Vec<u16>,

    /// Start listening as soon as the daemon is up.
    pub auto_start: bool,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            preferred_port: DEFAULT_PREFERRED_PORT,
            fallback_ports: DEFAULT_FALLBACK_PORTS.to_vec(),
            auto_start: true,
        }
    }
}

/// Relay timeouts and buffer sizes.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Origin/target connect timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Idle read timeout on origin/target sockets in seconds.
    pub read_timeout_secs: u64,

    /// How long a tunnel waits for each direction to finish, in seconds.
    pub tunnel_join_timeout_secs: u64,

    /// Relay chunk size in bytes; throttling is charged per chunk.
    pub chunk_size: usize,

    /// Maximum request head size in bytes.
    pub max_head_bytes: usize,
}

impl RelayConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn tunnel_join_timeout(&self) -> Duration {
        Duration::from_secs(self.tunnel_join_timeout_secs)
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            read_timeout_secs: 30,
            tunnel_join_timeout_secs: 60,
            chunk_size: 8 * 1024,
            max_head_bytes: 64 * 1024,
        }
    }
}

/// Throttle settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ThrottleConfig {
    /// Catalog profile active at startup (and after a config reload).
    pub profile: ProfileName,
}

/// Admin control API configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// Bearer token required on every admin request.
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: placeholder, override it whenever the admin API is enabled.
            api_key: "CHANGE_ME".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error), used when RUST_LOG is unset.
    pub log_level: String,

    /// Enable the Prometheus endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
