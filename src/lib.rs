//! Local forwarding proxy that emulates network conditions.

pub mod admin;
pub mod config;
pub mod control;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod relay;
pub mod throttle;

pub use config::schema::ProxyConfig;
pub use control::{ProxyService, ServiceStatus};
pub use net::BindError;
pub use throttle::{ActiveProfile, ProfileName, ThrottleProfile};
