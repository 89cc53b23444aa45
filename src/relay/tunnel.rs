//! CONNECT tunnelling.
//!
//! After the handshake the tunnel is an opaque byte pipe. Each direction runs
//! as its own task and is paced by its own cap. The two tasks share a
//! cancellation token. A client half-close only closes the target's write
//! side, so the target can still answer. Any other exit (download finished,
//! an error, a failed write) cancels the token and the peer direction winds
//! down even if it is blocked in a read.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::http::request::split_host_port;
use crate::http::{send_error, ErrorResponse, CONNECTION_ESTABLISHED};
use crate::net::connection::ConnectionId;
use crate::observability::metrics;
use crate::relay::{connect_target, read_chunk, RelayContext, RelayError, RelayStats};
use crate::throttle::rate_limit;
use crate::throttle::ThrottleProfile;

/// Port used when a CONNECT target names none.
pub const DEFAULT_TUNNEL_PORT: u16 = 443;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Client → target.
    Upload,
    /// Target → client.
    Download,
}

impl Direction {
    pub fn rate_kbps(self, profile: &ThrottleProfile) -> u32 {
        match self {
            Direction::Upload => profile.upload_kbps,
            Direction::Download => profile.download_kbps,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Upload => "upload",
            Direction::Download => "download",
        }
    }
}

/// How a direction stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PumpEnd {
    Eof,
    Cancelled,
    Failed,
}

/// Relay one CONNECT request.
///
/// No per-connection latency is added here; only the per-chunk caps apply.
pub async fn relay_tunnel<R, W>(
    client_reader: R,
    mut client_writer: W,
    target: &str,
    ctx: &RelayContext,
    id: ConnectionId,
) -> Result<RelayStats, RelayError>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    if ctx.profile.current().offline {
        tracing::debug!(connection_id = %id, target, "Offline mode: rejecting tunnel");
        send_error(&mut client_writer, ErrorResponse::OfflineTunnel).await;
        return Err(RelayError::Offline);
    }

    let (host, port) = match split_host_port(target, DEFAULT_TUNNEL_PORT) {
        Ok(parts) => parts,
        Err(e) => {
            send_error(&mut client_writer, ErrorResponse::BadRequest).await;
            return Err(e.into());
        }
    };

    let stream = match connect_target(&host, port, ctx.settings.connect_timeout).await {
        Ok(stream) => stream,
        Err(e) => {
            send_error(&mut client_writer, ErrorResponse::InternalError).await;
            return Err(e);
        }
    };

    client_writer.write_all(CONNECTION_ESTABLISHED).await?;
    client_writer.flush().await?;
    tracing::debug!(connection_id = %id, %host, port, "Tunnel established");

    let (target_reader, target_writer) = stream.into_split();
    let closed = CancellationToken::new();

    let upload = tokio::spawn(pump(
        client_reader,
        target_writer,
        Direction::Upload,
        None,
        ctx.clone(),
        closed.clone(),
        id,
    ));
    let download = tokio::spawn(pump(
        target_reader,
        client_writer,
        Direction::Download,
        Some(ctx.settings.read_timeout),
        ctx.clone(),
        closed,
        id,
    ));

    let join_timeout = ctx.settings.tunnel_join_timeout;
    Ok(RelayStats {
        bytes_up: join_direction(upload, Direction::Upload, join_timeout, id).await,
        bytes_down: join_direction(download, Direction::Download, join_timeout, id).await,
    })
}

/// Copy one direction until EOF, an I/O error, or cancellation.
///
/// Each chunk is paced *before* it is written. On exit the write half is shut
/// down. The shared token is cancelled unless this is the upload direction
/// ending on a clean EOF.
async fn pump<R, W>(
    mut reader: R,
    mut writer: W,
    direction: Direction,
    read_timeout: Option<Duration>,
    ctx: RelayContext,
    closed: CancellationToken,
    id: ConnectionId,
) -> u64
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let cancel_on_exit = closed.clone().drop_guard();
    let mut buf = vec![0u8; ctx.settings.chunk_size];
    let mut total = 0u64;

    let end = loop {
        let read = tokio::select! {
            _ = closed.cancelled() => break PumpEnd::Cancelled,
            read = read_chunk(&mut reader, &mut buf, read_timeout) => read,
        };
        let n = match read {
            Ok(0) => break PumpEnd::Eof,
            Ok(n) => n,
            Err(e) => {
                tracing::debug!(
                    connection_id = %id,
                    direction = direction.as_str(),
                    error = %e,
                    "Tunnel read ended"
                );
                break PumpEnd::Failed;
            }
        };

        let rate = direction.rate_kbps(&ctx.profile.current());
        let slept = rate_limit::pace(n, rate).await;
        metrics::record_throttle_sleep(direction.as_str(), slept);

        if let Err(e) = writer.write_all(&buf[..n]).await {
            tracing::debug!(
                connection_id = %id,
                direction = direction.as_str(),
                error = %e,
                "Tunnel peer closed"
            );
            break PumpEnd::Failed;
        }
        total += n as u64;
    };

    let _ = writer.shutdown().await;
    if direction == Direction::Upload && end == PumpEnd::Eof {
        // half-close: the target may still answer on the download side
        cancel_on_exit.disarm();
    }
    tracing::trace!(
        connection_id = %id,
        direction = direction.as_str(),
        bytes = total,
        end = ?end,
        "Tunnel direction finished"
    );
    total
}

/// Wait for one direction. A timeout only stops the wait; the task keeps
/// running detached until it notices the cancellation.
async fn join_direction(
    handle: JoinHandle<u64>,
    direction: Direction,
    limit: Duration,
    id: ConnectionId,
) -> u64 {
    match tokio::time::timeout(limit, handle).await {
        Ok(Ok(bytes)) => bytes,
        Ok(Err(e)) => {
            tracing::warn!(
                connection_id = %id,
                direction = direction.as_str(),
                error = %e,
                "Tunnel task failed"
            );
            0
        }
        Err(_) => {
            tracing::debug!(
                connection_id = %id,
                direction = direction.as_str(),
                "Tunnel direction still running after join timeout"
            );
            0
        }
    }
}
