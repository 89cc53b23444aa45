//! Proxy-generated responses.
//!
//! The proxy only ever originates two kinds of bytes on the client socket:
//! the CONNECT handshake and bodiless error responses. Everything else is
//! relayed verbatim from the origin.

use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Tunnel handshake sent after the target connection succeeds.
pub const CONNECTION_ESTABLISHED: &[u8] = b"HTTP/1.1 200 Connection established\r\n\r\n";

/// Error responses the proxy can produce on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorResponse {
    /// Malformed request head or target.
    BadRequest,
    /// Origin unreachable or failed mid-request.
    InternalError,
    /// Offline profile rejected a plain HTTP request.
    OfflineHttp,
    /// Offline profile rejected a CONNECT request.
    OfflineTunnel,
}

impl ErrorResponse {
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorResponse::BadRequest => 400,
            ErrorResponse::InternalError => 500,
            ErrorResponse::OfflineHttp | ErrorResponse::OfflineTunnel => 503,
        }
    }

    /// Status code plus reason phrase.
    pub fn status(&self) -> &'static str {
        match self {
            ErrorResponse::BadRequest => "400 Bad Request",
            ErrorResponse::InternalError => "500 Internal Server Error",
            ErrorResponse::OfflineHttp => "503 Service Unavailable - Offline Mode",
            ErrorResponse::OfflineTunnel => "503 Service Unavailable - Offline Mode (Tunnel)",
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        format!(
            "HTTP/1.1 {}\r\nContent-Type: text/plain\r\nContent-Length: 0\r\n\r\n",
            self.status()
        )
        .into_bytes()
    }
}

/// Best-effort write of an error response.
///
/// Failures are logged and swallowed so they never mask the error that caused
/// the response in the first place.
pub async fn send_error<W>(writer: &mut W, response: ErrorResponse)
where
    W: AsyncWrite + Unpin,
{
    let result = async {
        writer.write_all(&response.to_bytes()).await?;
        writer.flush().await
    }
    .await;

    if let Err(e) = result {
        tracing::debug!(
            status = response.status_code(),
            error = %e,
            "Failed to send error response"
        );
    }
}
