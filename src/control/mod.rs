//! Control surface.
//!
//! `ProxyService` is the single owner of the listener and the active profile.
//! The daemon, the admin API and embedding applications all drive the proxy
//! through it.

pub mod service;

pub use service::{ProxyService, ServiceStatus};
