//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (port fallback, accept loop)
//!     → connection.rs (id + in-flight tracking)
//!     → Hand off to relay::handle_connection
//!
//! Listener States:
//!     Stopped → Binding → Listening → Stopped
//! ```

pub mod connection;
pub mod listener;

pub use listener::{BindError, ListenerPhase, ListenerStatus, ProxyListener};
