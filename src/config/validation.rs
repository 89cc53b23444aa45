//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ports valid, sizes sane)
//! - Validate addresses before anything tries to bind them
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};

use thiserror::Error;

use crate::config::schema::ProxyConfig;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("listener.bind_host {0:?} is not an IP address")]
    InvalidBindHost(String),

    #[error("listener.fallback_ports contains port 0")]
    ZeroFallbackPort,

    #[error("listener.fallback_ports lists port {0} more than once")]
    DuplicateFallbackPort(u16),

    #[error("relay.{0} must be greater than zero")]
    ZeroValue(&'static str),

    #[error("admin.bind_address {0:?} is not a socket address")]
    InvalidAdminAddress(String),

    #[error("admin.api_key must not be empty when the admin API is enabled")]
    EmptyApiKey,

    #[error("observability.metrics_address {0:?} is not a socket address")]
    InvalidMetricsAddress(String),
}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let listener = &config.listener;
    if listener.bind_host.parse::<IpAddr>().is_err() {
        errors.push(ValidationError::InvalidBindHost(listener.bind_host.clone()));
    }
    let mut seen = HashSet::new();
    for &port in &listener.fallback_ports {
        if port == 0 {
            errors.push(ValidationError::ZeroFallbackPort);
        } else if !seen.insert(port) {
            errors.push(ValidationError::DuplicateFallbackPort(port));
        }
    }

    let relay = &config.relay;
    for (name, value) in [
        ("connect_timeout_secs", relay.connect_timeout_secs as usize),
        ("read_timeout_secs", relay.read_timeout_secs as usize),
        ("tunnel_join_timeout_secs", relay.tunnel_join_timeout_secs as usize),
        ("chunk_size", relay.chunk_size),
        ("max_head_bytes", relay.max_head_bytes),
    ] {
        if value == 0 {
            errors.push(ValidationError::ZeroValue(name));
        }
    }

    if config.admin.enabled {
        if config.admin.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidAdminAddress(config.admin.bind_address.clone()));
        }
        if config.admin.api_key.trim().is_empty() {
            errors.push(ValidationError::EmptyApiKey);
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(validate_config(&ProxyConfig::default()), Ok(()));
    }

    #[test]
    fn reports_every_problem() {
        let mut config = ProxyConfig::default();
        config.listener.bind_host = "localhost:80".into();
        config.listener.fallback_ports = vec![8888, 0, 8888];
        config.relay.read_timeout_secs = 0;
        config.admin.enabled = true;
        config.admin.api_key = "  ".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::InvalidBindHost("localhost:80".into()),
                ValidationError::ZeroFallbackPort,
                ValidationError::DuplicateFallbackPort(8888),
                ValidationError::ZeroValue("read_timeout_secs"),
                ValidationError::EmptyApiKey,
            ]
        );
    }

    #[test]
    fn admin_address_only_checked_when_enabled() {
        let mut config = ProxyConfig::default();
        config.admin.bind_address = "nope".into();
        assert!(validate_config(&config).is_ok());

        config.admin.enabled = true;
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::InvalidAdminAddress("nope".into())])
        );
    }
}
