//! Incremental request parsing from a byte stream.

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::config::LimitsConfig;
use crate::http::headers::HeaderError;
use crate::http::request::{ParseState, Request};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid number of request line parts: {0}")]
    InvalidRequestLineParts(usize),
    #[error("request line is not valid utf-8")]
    InvalidRequestLineEncoding,
    #[error("method token is invalid: {0:?}")]
    InvalidMethod(String),
    #[error("invalid target: {0:?}")]
    InvalidTarget(String),
    #[error("invalid http version: {0:?}")]
    InvalidVersion(String),
    #[error(transparent)]
    Header(#[from] HeaderError),
    #[error("error getting content-length: {0:?}")]
    InvalidContentLength(String),
    #[error("body length greater than content-length: {actual} > {declared}")]
    BodyTooLong { declared: usize, actual: usize },
    #[error("body present without content-length ({0} bytes)")]
    BodyWithoutContentLength(usize),
    #[error("incomplete request: stream ended in state {state} after {bytes_read} bytes")]
    Incomplete { state: ParseState, bytes_read: usize },
    #[error("request exceeds {limit} bytes")]
    TooLarge { limit: usize },
    #[error("trying to parse in done state")]
    ParseAfterDone,
    #[error("error reading from connection: {0}")]
    Io(#[from] std::io::Error),
}

impl ParseError {
    /// True for errors caused by the bytes the peer sent, as opposed to the transport.
    pub fn is_malformed_input(&self) -> bool {
        !matches!(self, ParseError::Io(_) | ParseError::ParseAfterDone)
    }
}

/// Reads from `reader` until a complete request is parsed.
///
/// Reads go into a buffer of `limits.initial_buffer_size` bytes which doubles
/// whenever it is full. After every parse pass the unconsumed tail is shifted
/// to the front. End-of-stream before the request is complete is an error, as
/// is a request of more than `limits.max_request_bytes` in total. A declared
/// `Content-Length` that cannot fit under the limit is rejected as soon as the
/// header section ends, before any of the body is read.
pub async fn request_from_reader<R>(reader: &mut R, limits: &LimitsConfig) -> Result<Request, ParseError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; limits.initial_buffer_size.max(1)];
    let mut filled = 0;
    let mut bytes_read = 0;
    let mut consumed_total = 0;
    let mut req = Request::new();

    while !req.is_done() {
        if filled == buf.len() {
            let grown = buf.len() * 2;
            tracing::trace!(from = buf.len(), to = grown, "growing read buffer");
            buf.resize(grown, 0);
        }

        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            return Err(ParseError::Incomplete {
                state: req.state(),
                bytes_read,
            });
        }

        bytes_read += n;
        if bytes_read > limits.max_request_bytes {
            return Err(ParseError::TooLarge {
                limit: limits.max_request_bytes,
            });
        }
        filled += n;

        let consumed = req.parse(&buf[..filled])?;
        buf.copy_within(consumed..filled, 0);
        filled -= consumed;
        consumed_total += consumed;

        if req.state() == ParseState::ParsingBody {
            let head_len = consumed_total - req.body.len();
            if let Some(declared) = req.content_length()?
                && head_len.saturating_add(declared) > limits.max_request_bytes
            {
                return Err(ParseError::TooLarge {
                    limit: limits.max_request_bytes,
                });
            }
        }

        tracing::trace!(read = n, consumed, buffered = filled, state = ?req.state(), "parse pass");
    }

    Ok(req)
}

/// Parses a complete request held in memory.
pub fn parse_request(data: &[u8]) -> Result<Request, ParseError> {
    let mut req = Request::new();
    req.parse(data)?;
    if !req.is_done() {
        return Err(ParseError::Incomplete {
            state: req.state(),
            bytes_read: data.len(),
        });
    }
    Ok(req)
}
