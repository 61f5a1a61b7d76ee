//! Origin connection and chunked relaying
//!
//! This module fetches a resource from the configured origin and streams it
//! back as chunks, with `X-Content-SHA256` and `X-Content-Length` trailers
//! computed over the relayed bytes.

use std::io::Cursor;
use std::time::Duration;

use anyhow::{Context, Result};
use bytes::{Bytes, BytesMut};
use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, Chain, Take};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::config::RelayConfig;
use crate::http::headers::{Headers, find_crlf};
use crate::http::response::{StatusCode, default_headers};
use crate::http::writer::{ResponseWriter, WriteError};

/// Origin response heads larger than this are refused.
const MAX_HEAD_SIZE: usize = 64 * 1024;

/// Origin body: bytes buffered with the head, then the rest of the socket,
/// cut off at `Content-Length` when the origin sent one.
type OriginBody = Take<Chain<Cursor<Bytes>, TcpStream>>;

pub const SHA256_TRAILER: &str = "X-Content-SHA256";
pub const LENGTH_TRAILER: &str = "X-Content-Length";

/// What was relayed, as reported in the trailers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodySummary {
    /// Lower-case hex SHA-256 of the relayed body
    pub sha256: String,
    /// Number of body bytes relayed
    pub length: usize,
}

/// Status and headers of an origin response.
#[derive(Debug)]
pub struct OriginHead {
    pub status: StatusCode,
    pub headers: Headers,
}

/// Relays requests to a single plain-HTTP origin.
pub struct Relay {
    origin: url::Url,
    connect_timeout: Duration,
    chunk_size: usize,
}

impl Relay {
    pub fn new(cfg: &RelayConfig) -> Result<Self> {
        let origin = url::Url::parse(&cfg.origin).context("Invalid relay origin URL")?;
        if origin.scheme() != "http" {
            anyhow::bail!("unsupported relay origin scheme {:?}", origin.scheme());
        }
        origin.host_str().context("Relay origin URL missing host")?;

        Ok(Self {
            origin,
            connect_timeout: cfg.connect_timeout(),
            chunk_size: cfg.chunk_size.max(1),
        })
    }

    /// Headers for a relayed response: chunked, with digest trailers declared.
    pub fn response_headers() -> Headers {
        let mut headers = default_headers(0);
        headers.remove("Content-Length");
        headers.replace("Transfer-Encoding", "chunked");
        headers.replace("Trailer", &format!("{SHA256_TRAILER}, {LENGTH_TRAILER}"));
        headers
    }

    /// Builds the request sent to the origin for `path`.
    ///
    /// An HTTP/1.0 request line keeps the origin from answering with chunked
    /// encoding, so its body ends at `Content-Length` or connection close.
    pub fn build_origin_request(&self, path: &str) -> Vec<u8> {
        let path = path.trim_start_matches('/');
        let host = match (self.origin.host_str(), self.origin.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => String::new(),
        };

        format!("GET /{path} HTTP/1.0\r\nHost: {host}\r\nConnection: close\r\nAccept: */*\r\n\r\n").into_bytes()
    }

    /// Fetches `path` from the origin and streams it to `w` as chunks.
    ///
    /// Nothing is written to `w` if the origin cannot be reached or answers
    /// with a malformed head, so the caller can still send an error page.
    pub async fn relay<W>(&self, path: &str, w: &mut ResponseWriter<W>) -> Result<BodySummary>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let (head, mut body) = self.open(path).await?;
        tracing::debug!(status = head.status.as_u16(), path, "origin responded");

        w.write_status_line(head.status).await?;
        w.write_headers(&Self::response_headers()).await?;
        let summary = stream_with_digest(&mut body, w, self.chunk_size).await?;

        tracing::info!(
            path,
            bytes = summary.length,
            sha256 = %summary.sha256,
            "relayed origin body"
        );
        Ok(summary)
    }

    /// Connects, sends the request and reads the response head.
    ///
    /// Returns the head and a reader positioned at the start of the body.
    async fn open(&self, path: &str) -> Result<(OriginHead, OriginBody)> {
        let host = self.origin.host_str().context("Relay origin URL missing host")?;
        let port = self.origin.port_or_known_default().unwrap_or(80);
        let addr = format!("{host}:{port}");

        let mut stream = timeout(self.connect_timeout, TcpStream::connect(&addr))
            .await
            .context("Connection timeout")?
            .context("Failed to connect to origin")?;
        tracing::trace!(origin = %addr, "Connected to origin");

        stream.write_all(&self.build_origin_request(path)).await?;
        stream.flush().await?;

        let mut buffer = BytesMut::with_capacity(4096);
        let head_end = loop {
            if let Some(end) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
                break end;
            }
            if buffer.len() > MAX_HEAD_SIZE {
                anyhow::bail!("Origin response head too large");
            }
            let n = stream.read_buf(&mut buffer).await?;
            if n == 0 {
                anyhow::bail!("Connection closed before complete response head received");
            }
        };

        let head_bytes = buffer.split_to(head_end + 4);
        let head = parse_origin_head(&head_bytes)?;

        let limit = match head.headers.get("content-length") {
            Some(v) => v.parse::<u64>().context("Invalid origin content-length")?,
            None => u64::MAX,
        };
        let body = Cursor::new(buffer.freeze()).chain(stream).take(limit);

        Ok((head, body))
    }
}

/// Parses `HTTP/1.x <code> <reason>\r\n<fields>\r\n\r\n`.
pub fn parse_origin_head(data: &[u8]) -> Result<OriginHead> {
    let line_end = find_crlf(data).context("Empty response")?;
    let status_line = std::str::from_utf8(&data[..line_end]).context("Invalid UTF-8 in status line")?;

    let mut parts = status_line.splitn(3, ' ');
    let version = parts.next().unwrap_or_default();
    if !version.starts_with("HTTP/") {
        anyhow::bail!("Invalid status line: {}", status_line);
    }
    let code: u16 = parts
        .next()
        .context("Status line missing code")?
        .parse()
        .context("Invalid status code")?;

    let mut headers = Headers::new();
    let mut rest = &data[line_end + 2..];
    loop {
        let (n, done) = headers.parse(rest)?;
        if done || n == 0 {
            break;
        }
        rest = &rest[n..];
    }

    Ok(OriginHead {
        status: StatusCode::from(code),
        headers,
    })
}

/// Copies `source` to `w` as chunks of at most `chunk_size` bytes, then
/// writes the terminal chunk and the digest trailers.
///
/// A read error from `source` ends the body early; what was relayed so far is
/// still terminated and summarized. Write errors are returned.
pub async fn stream_with_digest<R, W>(
    source: &mut R,
    w: &mut ResponseWriter<W>,
    chunk_size: usize,
) -> Result<BodySummary, WriteError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send,
{
    let mut hasher = Sha256::new();
    let mut length: usize = 0;
    let mut buf = vec![0u8; chunk_size.max(1)];

    loop {
        let n = match source.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(error = %e, relayed = length, "error reading origin body");
                break;
            }
        };

        w.write_chunked_body(&buf[..n]).await?;
        hasher.update(&buf[..n]);
        length += n;
    }

    w.write_chunked_body_done().await?;

    let summary = BodySummary {
        sha256: format!("{:x}", hasher.finalize()),
        length,
    };

    let mut trailers = Headers::new();
    trailers.replace(SHA256_TRAILER, &summary.sha256);
    trailers.replace(LENGTH_TRAILER, &summary.length.to_string());
    w.write_trailers(&trailers).await?;

    Ok(summary)
}
