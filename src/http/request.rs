//! Request head parsing.
//!
//! # Responsibilities
//! - Read the request head (request line + header lines) up to the blank line
//! - Split the request line into method, target and version
//! - Split proxy targets into host, port and path
//!
//! # Design Decisions
//! - Body framing (`Content-Length`, chunked) is left to the relays
//! - Bytes following the head stay in the caller's buffered reader
//! - Head size is bounded before anything is forwarded

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Default bound on the size of a request head.
pub const DEFAULT_MAX_HEAD_BYTES: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("connection closed before a request line was received")]
    Empty,

    #[error("malformed request line: {0:?}")]
    MalformedRequestLine(String),

    #[error("request head exceeds {0} bytes")]
    HeadTooLarge(usize),

    #[error("invalid request target: {0:?}")]
    InvalidTarget(String),

    #[error("failed to read request head: {0}")]
    Io(#[from] std::io::Error),
}

/// A parsed request head.
///
/// Header lines are kept as raw bytes so values outside UTF-8 reach the origin
/// unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    request_line: String,
    headers: Vec<Vec<u8>>,
}

impl RequestHead {
    /// Build a head from already-split lines, validating the request line.
    pub fn from_lines<L>(lines: impl IntoIterator<Item = L>) -> Result<Self, ParseError>
    where
        L: Into<Vec<u8>>,
    {
        let mut lines = lines.into_iter().map(Into::into);
        let Some(first) = lines.next() else {
            return Err(ParseError::Empty);
        };
        let request_line = String::from_utf8_lossy(&first).into_owned();
        if request_line.split_whitespace().count() < 3 {
            return Err(ParseError::MalformedRequestLine(request_line));
        }
        Ok(Self {
            request_line,
            headers: lines.collect(),
        })
    }

    pub fn request_line(&self) -> &str {
        &self.request_line
    }

    pub fn method(&self) -> &str {
        self.token(0)
    }

    pub fn target(&self) -> &str {
        self.token(1)
    }

    pub fn version(&self) -> &str {
        self.token(2)
    }

    /// Raw header lines in arrival order, without line terminators.
    pub fn header_lines(&self) -> &[Vec<u8>] {
        &self.headers
    }

    /// Value of the first header named `name` (case-insensitive), if it is UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find_map(|line| {
            let colon = line.iter().position(|&b| b == b':')?;
            if !line[..colon].trim_ascii().eq_ignore_ascii_case(name.as_bytes()) {
                return None;
            }
            std::str::from_utf8(&line[colon + 1..]).ok().map(str::trim)
        })
    }

    fn token(&self, index: usize) -> &str {
        // from_lines guarantees at least three tokens
        self.request_line
            .split_whitespace()
            .nth(index)
            .unwrap_or_default()
    }
}

/// Read a request head from `reader`.
///
/// Lines may end in CRLF or a bare LF. Reading stops at the first empty line
/// or at end of stream.
pub async fn read_request_head<R>(
    reader: &mut R,
    max_head_bytes: usize,
) -> Result<RequestHead, ParseError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = Vec::new();
    let mut buf = Vec::with_capacity(256);
    let mut consumed = 0usize;

    loop {
        buf.clear();
        let n = reader.read_until(b'\n', &mut buf).await?;
        if n == 0 {
            break;
        }
        consumed += n;
        if consumed > max_head_bytes {
            return Err(ParseError::HeadTooLarge(max_head_bytes));
        }

        let mut end = buf.len();
        while end > 0 && matches!(buf[end - 1], b'\r' | b'\n') {
            end -= 1;
        }
        if end == 0 {
            break;
        }
        lines.push(buf[..end].to_vec());
    }

    RequestHead::from_lines(lines)
}

/// Name part of a `Name: value` header line.
pub fn header_name(line: &[u8]) -> &[u8] {
    match line.iter().position(|&b| b == b':') {
        Some(colon) => line[..colon].trim_ascii(),
        None => line,
    }
}

/// Split `host`, `host:port`, `[v6]` or `[v6]:port`.
pub fn split_host_port(authority: &str, default_port: u16) -> Result<(String, u16), ParseError> {
    let invalid = || ParseError::InvalidTarget(authority.to_string());

    let (host, port) = if let Some(rest) = authority.strip_prefix('[') {
        let (host, after) = rest.split_once(']').ok_or_else(invalid)?;
        match after {
            "" => (host, None),
            _ => (host, Some(after.strip_prefix(':').ok_or_else(invalid)?)),
        }
    } else {
        match authority.split_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (authority, None),
        }
    };

    if host.is_empty() {
        return Err(invalid());
    }
    let port = match port {
        Some(p) => p.parse::<u16>().map_err(|_| invalid())?,
        None => default_port,
    };
    Ok((host.to_string(), port))
}

/// An absolute-form proxy target such as `http://example.com:8080/a?b=c`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbsoluteTarget {
    pub scheme: String,
    /// Authority exactly as the client wrote it, reused for the `Host` header.
    pub authority: String,
    pub host: String,
    pub port: u16,
    pub path: String,
}

/// Parse `scheme://authority[/path]`. The target must contain exactly one `://`.
pub fn parse_absolute_target(
    target: &str,
    default_port: u16,
) -> Result<AbsoluteTarget, ParseError> {
    let parts: Vec<&str> = target.split("://").collect();
    let [scheme, rest] = parts.as_slice() else {
        return Err(ParseError::InvalidTarget(target.to_string()));
    };

    let (authority, path) = match rest.split_once('/') {
        Some((authority, path)) => (authority, format!("/{}", path)),
        None => (*rest, "/".to_string()),
    };
    let (host, port) = split_host_port(authority, default_port)?;

    Ok(AbsoluteTarget {
        scheme: scheme.to_string(),
        authority: authority.to_string(),
        host,
        port,
        path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn reads_head_and_leaves_body_buffered() {
        let raw = b"POST http://example.com/upload HTTP/1.1\r\n\
            Host: example.com\r\nContent-Length: 4\r\n\r\nbody";
        let mut reader = &raw[..];

        let head = read_request_head(&mut reader, DEFAULT_MAX_HEAD_BYTES).await.unwrap();
        assert_eq!(head.method(), "POST");
        assert_eq!(head.target(), "http://example.com/upload");
        assert_eq!(head.version(), "HTTP/1.1");
        assert_eq!(head.header_lines().len(), 2);
        assert_eq!(head.header("content-length"), Some("4"));

        let mut rest = String::new();
        reader.read_to_string(&mut rest).await.unwrap();
        assert_eq!(rest, "body");
    }

    #[tokio::test]
    async fn accepts_bare_lf_and_eof_terminated_heads() {
        let mut reader = &b"GET http://a/ HTTP/1.1\nAccept: */*"[..];
        let head = read_request_head(&mut reader, DEFAULT_MAX_HEAD_BYTES).await.unwrap();
        assert_eq!(head.request_line(), "GET http://a/ HTTP/1.1");
        assert_eq!(head.header_lines(), [b"Accept: */*".to_vec()]);
    }

    #[tokio::test]
    async fn empty_stream_is_an_error() {
        let mut reader = &b""[..];
        let err = read_request_head(&mut reader, DEFAULT_MAX_HEAD_BYTES).await.unwrap_err();
        assert!(matches!(err, ParseError::Empty));

        let mut reader = &b"\r\n"[..];
        let err = read_request_head(&mut reader, DEFAULT_MAX_HEAD_BYTES).await.unwrap_err();
        assert!(matches!(err, ParseError::Empty));
    }

    #[tokio::test]
    async fn short_request_line_is_malformed() {
        let mut reader = &b"GET /\r\n\r\n"[..];
        let err = read_request_head(&mut reader, DEFAULT_MAX_HEAD_BYTES).await.unwrap_err();
        assert!(matches!(err, ParseError::MalformedRequestLine(line) if line == "GET /"));
    }

    #[tokio::test]
    async fn oversized_head_is_rejected() {
        let raw = format!("GET http://a/ HTTP/1.1\r\nX-Big: {}\r\n\r\n", "x".repeat(200));
        let mut reader = raw.as_bytes();
        let err = read_request_head(&mut reader, 64).await.unwrap_err();
        assert!(matches!(err, ParseError::HeadTooLarge(64)));
    }

    #[test]
    fn splits_host_and_port() {
        assert_eq!(split_host_port("example.com", 443).unwrap(), ("example.com".into(), 443));
        assert_eq!(split_host_port("example.com:8443", 443).unwrap(), ("example.com".into(), 8443));
        assert_eq!(split_host_port("[::1]:8080", 80).unwrap(), ("::1".into(), 8080));
        assert_eq!(split_host_port("[::1]", 80).unwrap(), ("::1".into(), 80));
        assert!(split_host_port("example.com:http", 80).is_err());
        assert!(split_host_port(":80", 80).is_err());
        assert!(split_host_port("[::1", 80).is_err());
    }

    #[test]
    fn parses_absolute_targets() {
        let t = parse_absolute_target("http://example.com:8080/a/b?c=d", 80).unwrap();
        assert_eq!(t.scheme, "http");
        assert_eq!(t.authority, "example.com:8080");
        assert_eq!((t.host.as_str(), t.port), ("example.com", 8080));
        assert_eq!(t.path, "/a/b?c=d");

        let t = parse_absolute_target("http://example.com", 80).unwrap();
        assert_eq!((t.port, t.path.as_str()), (80, "/"));
    }

    #[test]
    fn rejects_targets_without_exactly_one_scheme_separator() {
        assert!(parse_absolute_target("/relative/path", 80).is_err());
        assert!(parse_absolute_target("http://a/?next=http://b/", 80).is_err());
    }

    #[test]
    fn header_name_is_trimmed() {
        assert_eq!(header_name(b"Host : example.com"), b"Host");
        assert_eq!(header_name(b"garbage"), b"garbage");
    }

    #[tokio::test]
    async fn non_utf8_header_bytes_are_kept() {
        let mut reader = &b"GET http://a/ HTTP/1.1\r\nX-Name: caf\xe9\r\nAccept: */*\r\n\r\n"[..];
        let head = read_request_head(&mut reader, DEFAULT_MAX_HEAD_BYTES).await.unwrap();
        assert_eq!(head.header_lines()[0], b"X-Name: caf\xe9".to_vec());
        assert_eq!(head.header("x-name"), None);
        assert_eq!(head.header("accept"), Some("*/*"));
    }
}
