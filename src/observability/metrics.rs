//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_connections_total` (counter): accepted client connections
//! - `proxy_active_connections` (gauge): connections currently being relayed
//! - `proxy_accept_errors_total` (counter): failed accept calls while listening
//! - `proxy_relays_total` (counter): finished relays by kind and outcome
//! - `proxy_bytes_total` (counter): relayed bytes by direction
//! - `proxy_throttle_sleep_milliseconds_total` (counter): pacing time by direction
//! - `proxy_profile_changes_total` (counter): profile swaps by profile name
//!
//! # Design Decisions
//! - Low-overhead metric updates (atomic operations)
//! - Without an installed recorder every call is a no-op

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::throttle::ProfileName;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => {
            tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter")
        }
    }
}

pub fn record_connection_accepted() {
    metrics::counter!("proxy_connections_total").increment(1);
}

pub fn set_active_connections(count: u64) {
    metrics::gauge!("proxy_active_connections").set(count as f64);
}

pub fn record_accept_error() {
    metrics::counter!("proxy_accept_errors_total").increment(1);
}

/// `kind` is `http` or `tunnel`; `outcome` names the error class or `ok`.
pub fn record_relay(kind: &'static str, outcome: &'static str) {
    metrics::counter!("proxy_relays_total", "kind" => kind, "outcome" => outcome).increment(1);
}

pub fn record_bytes(direction: &'static str, bytes: u64) {
    if bytes > 0 {
        metrics::counter!("proxy_bytes_total", "direction" => direction).increment(bytes);
    }
}

pub fn record_throttle_sleep(direction: &'static str, slept: Duration) {
    if !slept.is_zero() {
        metrics::counter!("proxy_throttle_sleep_milliseconds_total", "direction" => direction)
            .increment(slept.as_millis() as u64);
    }
}

pub fn record_profile_change(name: Option<ProfileName>) {
    let profile = name.map(|n| n.as_str()).unwrap_or("custom");
    metrics::counter!("proxy_profile_changes_total", "profile" => profile).increment(1);
}
