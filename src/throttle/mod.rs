//! Network condition emulation.
//!
//! # Data Flow
//! ```text
//! Control surface / config reload
//!     → active.rs (atomic swap of the current ThrottleProfile)
//!
//! Every relayed chunk:
//!     → active.rs (load current snapshot)
//!     → rate_limit.rs (bytes + kbps → sleep duration)
//!     → tokio::time::sleep
//! ```
//!
//! # Design Decisions
//! - Profiles are immutable `Copy` values; the catalog is fixed at compile time
//! - The active profile is swapped whole, never mutated field by field
//! - Pacing is charged per chunk, so throughput is capped on average and bursty
//!   within a chunk

pub mod active;
pub mod profile;
pub mod rate_limit;

pub use active::ActiveProfile;
pub use profile::{ProfileName, ThrottleProfile, UnknownProfile};
