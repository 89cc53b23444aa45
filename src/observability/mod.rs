//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters, gauges via the `metrics` facade)
//!
//! Consumers:
//!     → stdout (fmt layer, filtered by RUST_LOG or config)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Connection IDs flow through every relay log line
//! - Metrics are cheap (atomic increments) and no-ops until a recorder is installed
//! - The Prometheus exporter is opt-in

pub mod logging;
pub mod metrics;
