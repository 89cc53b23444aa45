use serde::Serialize;

use crate::config::{ListenerConfig, ProxyConfig};
use crate::net::{BindError, ListenerPhase, ProxyListener};
use crate::relay::{RelayContext, RelaySettings};
use crate::throttle::{ActiveProfile, ProfileName, ThrottleProfile};

/// Read-only view of the proxy.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub version: &'static str,
    pub running: bool,
    pub phase: ListenerPhase,
    pub port: u16,
    /// Catalog name of the active profile, `None` for a custom profile.
    pub profile_name: Option<ProfileName>,
    pub profile: ThrottleProfile,
    pub active_connections: u64,
}

pub struct ProxyService {
    listener: ProxyListener,
    profile: ActiveProfile,
    preferred_port: u16,
    fallback_ports: Vec<u16>,
}

impl ProxyService {
    pub fn new(config: &ProxyConfig) -> Self {
        Self::from_parts(
            &config.listener,
            RelaySettings::from(&config.relay),
            ActiveProfile::new(config.throttle.profile.profile()),
        )
    }

    pub fn from_parts(
        listener: &ListenerConfig,
        settings: RelaySettings,
        profile: ActiveProfile,
    ) -> Self {
        let ctx = RelayContext::new(profile.clone(), settings);
        Self {
            listener: ProxyListener::new(listener.bind_host.clone(), ctx),
            profile,
            preferred_port: listener.preferred_port,
            fallback_ports: listener.fallback_ports.clone(),
        }
    }

    /// Start listening on the preferred or first free fallback port.
    pub async fn start(&self) -> Result<u16, BindError> {
        self.listener.start(self.preferred_port, &self.fallback_ports).await
    }

    /// Stop accepting connections. Safe to call when already stopped.
    pub async fn stop(&self) {
        self.listener.stop().await;
    }

    /// Swap the active profile; applies to in-flight relays on their next chunk.
    pub fn set_profile(&self, profile: ThrottleProfile) -> ThrottleProfile {
        self.profile.set(profile)
    }

    pub fn set_named_profile(&self, name: ProfileName) -> ThrottleProfile {
        self.profile.set_named(name)
    }

    pub fn is_running(&self) -> bool {
        self.listener.status().running
    }

    /// The bound port while listening, otherwise the preferred port.
    pub fn current_port(&self) -> u16 {
        self.listener.bound_port().unwrap_or(self.preferred_port)
    }

    pub fn current_profile(&self) -> ThrottleProfile {
        self.profile.current()
    }

    pub fn status(&self) -> ServiceStatus {
        let listener = self.listener.status();
        let profile = self.profile.current();
        ServiceStatus {
            version: env!("CARGO_PKG_VERSION"),
            running: listener.running,
            phase: listener.phase,
            port: listener.bound_port.unwrap_or(self.preferred_port),
            profile_name: ProfileName::identify(&profile),
            profile,
            active_connections: listener.active_connections,
        }
    }
}
