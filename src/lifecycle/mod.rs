//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Metrics → ProxyService → auto-start → Admin API → Config watcher
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → shutdown
//!
//! Shutdown:
//!     Stop accepting → stop admin API → exit (in-flight relays are not severed)
//! ```
//!
//! # Design Decisions
//! - Fail fast: bind failures at startup are fatal
//! - Subsystems initialize in order, not concurrently

pub mod signals;
pub mod startup;

pub use startup::{run, StartupError};
