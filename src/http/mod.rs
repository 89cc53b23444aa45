//! HTTP/1.1 forward-proxy framing.
//!
//! # Data Flow
//! ```text
//! Client socket (buffered read half)
//!     → request.rs (read head, split request line, parse target)
//!     → relay layer (HTTP relay or CONNECT tunnel)
//!     → response.rs (handshake / error responses written by the proxy)
//! ```
//!
//! # Design Decisions
//! - Only the head is parsed; message bodies are relayed as raw bytes
//! - Proxy-originated responses never carry a body

pub mod request;
pub mod response;

pub use request::{read_request_head, ParseError, RequestHead};
pub use response::{send_error, ErrorResponse, CONNECTION_ESTABLISHED};
