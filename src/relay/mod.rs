//! Relay subsystem.
//!
//! # Data Flow
//! ```text
//! Accepted client socket
//!     → handle_connection (split socket, parse head)
//!     → CONNECT  → tunnel.rs (raw bidirectional byte relay)
//!     → anything else → http.rs (rewrite request, stream response back)
//!
//! Per chunk, in every direction:
//!     read → throttle::rate_limit::pace(current profile) → write
//! ```
//!
//! # Design Decisions
//! - Each connection is owned by exactly one task; a tunnel adds one task per
//!   direction, each owning one read half and one write half
//! - Errors never escape a connection: they become a response (400/500/503)
//!   or a silent teardown, plus a log line and a metric
//! - The active profile is re-read on every chunk so swaps apply mid-transfer

pub mod http;
pub mod tunnel;

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, BufReader};
use tokio::net::TcpStream;

use crate::config::RelayConfig;
use crate::http::{read_request_head, send_error, ErrorResponse, ParseError};
use crate::net::connection::ConnectionId;
use crate::observability::metrics;
use crate::throttle::ActiveProfile;

/// Timeouts and sizes every relay runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelaySettings {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub tunnel_join_timeout: Duration,
    pub chunk_size: usize,
    pub max_head_bytes: usize,
}

impl From<&RelayConfig> for RelaySettings {
    fn from(config: &RelayConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout(),
            read_timeout: config.read_timeout(),
            tunnel_join_timeout: config.tunnel_join_timeout(),
            chunk_size: config.chunk_size,
            max_head_bytes: config.max_head_bytes,
        }
    }
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self::from(&RelayConfig::default())
    }
}

/// Everything a relay needs besides its sockets.
#[derive(Debug, Clone)]
pub struct RelayContext {
    pub profile: ActiveProfile,
    pub settings: RelaySettings,
}

impl RelayContext {
    pub fn new(profile: ActiveProfile, settings: RelaySettings) -> Self {
        Self { profile, settings }
    }
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("rejected by offline profile")]
    Offline,

    #[error("failed to connect to {target}: {source}")]
    TargetConnect {
        target: String,
        #[source]
        source: io::Error,
    },

    #[error("relay I/O failed: {0}")]
    Io(#[from] io::Error),
}

impl RelayError {
    /// Short label used for the `outcome` metric label.
    pub fn outcome(&self) -> &'static str {
        match self {
            RelayError::Parse(_) => "bad_request",
            RelayError::Offline => "offline",
            RelayError::TargetConnect { .. } => "connect_failed",
            RelayError::Io(_) => "io_error",
        }
    }
}

/// Bytes moved by one relay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Client → origin.
    pub bytes_up: u64,
    /// Origin → client.
    pub bytes_down: u64,
}

/// Serve one accepted client connection to completion.
pub async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    id: ConnectionId,
    ctx: RelayContext,
) {
    let _ = stream.set_nodelay(true);
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::with_capacity(ctx.settings.chunk_size, read_half);

    let head = match read_request_head(&mut reader, ctx.settings.max_head_bytes).await {
        Ok(head) => head,
        Err(ParseError::Io(e)) => {
            tracing::debug!(
                connection_id = %id,
                peer_addr = %peer,
                error = %e,
                "Client read failed before request head"
            );
            metrics::record_relay("unknown", "io_error");
            return;
        }
        Err(e) => {
            tracing::debug!(
                connection_id = %id,
                peer_addr = %peer,
                error = %e,
                "Rejecting malformed request"
            );
            send_error(&mut write_half, ErrorResponse::BadRequest).await;
            metrics::record_relay("unknown", "bad_request");
            return;
        }
    };

    tracing::debug!(
        connection_id = %id,
        peer_addr = %peer,
        request = head.request_line(),
        "Request received"
    );

    let (kind, result) = if head.method() == "CONNECT" {
        let target = head.target().to_string();
        ("tunnel", tunnel::relay_tunnel(reader, write_half, &target, &ctx, id).await)
    } else {
        ("http", http::relay_http(reader, write_half, &head, &ctx, id).await)
    };

    match result {
        Ok(stats) => {
            metrics::record_bytes("upload", stats.bytes_up);
            metrics::record_bytes("download", stats.bytes_down);
            metrics::record_relay(kind, "ok");
            tracing::debug!(
                connection_id = %id,
                kind,
                target = head.target(),
                bytes_up = stats.bytes_up,
                bytes_down = stats.bytes_down,
                "Relay finished"
            );
        }
        Err(e) => {
            metrics::record_relay(kind, e.outcome());
            match &e {
                RelayError::TargetConnect { .. } => {
                    tracing::warn!(connection_id = %id, kind, error = %e, "Relay failed")
                }
                _ => tracing::debug!(
                    connection_id = %id,
                    kind,
                    target = head.target(),
                    error = %e,
                    "Relay ended early"
                ),
            }
        }
    }
}

/// Connect to `host:port`, bounded by `timeout`.
pub(crate) async fn connect_target(
    host: &str,
    port: u16,
    timeout: Duration,
) -> Result<TcpStream, RelayError> {
    let target = || {
        if host.contains(':') {
            format!("[{}]:{}", host, port)
        } else {
            format!("{}:{}", host, port)
        }
    };

    let stream = match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(source)) => return Err(RelayError::TargetConnect { target: target(), source }),
        Err(_) => {
            return Err(RelayError::TargetConnect {
                target: target(),
                source: io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("connect timed out after {:?}", timeout),
                ),
            })
        }
    };
    let _ = stream.set_nodelay(true);
    Ok(stream)
}

/// Single read bounded by an optional idle timeout.
pub(crate) async fn read_chunk<R>(
    reader: &mut R,
    buf: &mut [u8],
    timeout: Option<Duration>,
) -> io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, reader.read(buf))
            .await
            .map_err(|_| {
                io::Error::new(io::ErrorKind::TimedOut, format!("no data for {:?}", limit))
            })?,
        None => reader.read(buf).await,
    }
}
