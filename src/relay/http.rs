//! Plain HTTP forwarding.
//!
//! # Responsibilities
//! - Reject requests up front when the offline profile is active
//! - Connect to the origin named by the absolute-form target
//! - Rewrite the request into origin form with canonical `Host`/`Connection`
//! - Forward `POST` bodies, then stream the response back paced by the
//!   download cap
//!
//! # Design Decisions
//! - The profile latency is charged once, between connect and send
//! - Only `POST` carries a body upstream; other methods are sent head-only
//! - A `500` is only written while no response byte has reached the client

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::http::request::{header_name, parse_absolute_target, AbsoluteTarget, RequestHead};
use crate::http::{send_error, ErrorResponse};
use crate::net::connection::ConnectionId;
use crate::observability::metrics;
use crate::relay::{connect_target, read_chunk, RelayContext, RelayError, RelayStats};
use crate::throttle::rate_limit;

/// Port used when the target URL names none.
pub const DEFAULT_HTTP_PORT: u16 = 80;

/// Relay one plain HTTP request.
pub async fn relay_http<R, W>(
    mut client_reader: R,
    mut client_writer: W,
    head: &RequestHead,
    ctx: &RelayContext,
    id: ConnectionId,
) -> Result<RelayStats, RelayError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let profile = ctx.profile.current();
    if profile.offline {
        tracing::debug!(
            connection_id = %id,
            target = head.target(),
            "Offline mode: rejecting HTTP request"
        );
        send_error(&mut client_writer, ErrorResponse::OfflineHttp).await;
        return Err(RelayError::Offline);
    }

    let target = match parse_absolute_target(head.target(), DEFAULT_HTTP_PORT) {
        Ok(target) => target,
        Err(e) => {
            send_error(&mut client_writer, ErrorResponse::BadRequest).await;
            return Err(e.into());
        }
    };

    let connect = connect_target(&target.host, target.port, ctx.settings.connect_timeout);
    let origin = match connect.await {
        Ok(stream) => stream,
        Err(e) => {
            send_error(&mut client_writer, ErrorResponse::InternalError).await;
            return Err(e);
        }
    };
    tracing::debug!(
        connection_id = %id,
        host = %target.host,
        port = target.port,
        "Connected to origin"
    );

    if profile.latency_ms > 0 {
        tracing::trace!(connection_id = %id, latency_ms = profile.latency_ms, "Applying latency");
        tokio::time::sleep(profile.latency()).await;
    }

    let (mut origin_reader, mut origin_writer) = origin.into_split();
    let mut stats = RelayStats::default();

    let request = build_origin_request(head, &target);
    let sent = async {
        origin_writer.write_all(&request).await?;
        if head.method() == "POST" {
            let limit = head
                .header("content-length")
                .and_then(|value| value.parse::<u64>().ok());
            stats.bytes_up =
                forward_body(&mut client_reader, &mut origin_writer, limit, ctx).await?;
        }
        origin_writer.flush().await
    }
    .await;
    if let Err(e) = sent {
        send_error(&mut client_writer, ErrorResponse::InternalError).await;
        return Err(e.into());
    }

    let mut buf = vec![0u8; ctx.settings.chunk_size];
    loop {
        let read = read_chunk(&mut origin_reader, &mut buf, Some(ctx.settings.read_timeout));
        let n = match read.await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                if stats.bytes_down == 0 {
                    send_error(&mut client_writer, ErrorResponse::InternalError).await;
                }
                return Err(e.into());
            }
        };

        client_writer.write_all(&buf[..n]).await?;
        stats.bytes_down += n as u64;

        let slept = rate_limit::pace(n, ctx.profile.current().download_kbps).await;
        metrics::record_throttle_sleep("download", slept);
    }

    client_writer.flush().await?;
    let _ = client_writer.shutdown().await;
    Ok(stats)
}

/// Origin-form request: original headers minus `Host`/`Connection`, then the
/// canonical `Host` and `Connection: close`.
pub fn build_origin_request(head: &RequestHead, target: &AbsoluteTarget) -> Vec<u8> {
    let mut request = format!("{} {} HTTP/1.1\r\n", head.method(), target.path).into_bytes();
    for line in head.header_lines() {
        let name = header_name(line);
        if name.eq_ignore_ascii_case(b"host") || name.eq_ignore_ascii_case(b"connection") {
            continue;
        }
        request.extend_from_slice(line);
        request.extend_from_slice(b"\r\n");
    }
    request.extend_from_slice(format!("Host: {}\r\n", target.authority).as_bytes());
    request.extend_from_slice(b"Connection: close\r\n\r\n");
    request
}

/// Copy a request body upstream, paced by the upload cap.
///
/// With `limit` set exactly that many bytes are copied; otherwise the client
/// stream is copied until it ends.
async fn forward_body<R, W>(
    reader: &mut R,
    writer: &mut W,
    limit: Option<u64>,
    ctx: &RelayContext,
) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; ctx.settings.chunk_size];
    let mut total = 0u64;

    loop {
        let want = match limit {
            Some(limit) if total >= limit => break,
            Some(limit) => (limit - total).min(buf.len() as u64) as usize,
            None => buf.len(),
        };
        let n = reader.read(&mut buf[..want]).await?;
        if n == 0 {
            break;
        }
        writer.write_all(&buf[..n]).await?;
        total += n as u64;

        let slept = rate_limit::pace(n, ctx.profile.current().upload_kbps).await;
        metrics::record_throttle_sleep("upload", slept);
    }

    Ok(total)
}
