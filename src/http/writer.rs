//! Response serialization with enforced write ordering.
//!
//! ```text
//! WritingStatusLine ─▶ WritingHeaders ─▶ WritingBody ─write_body──────────────▶ Done
//!                                          │  ▲
//!                                          └──┘ write_chunked_body
//!                                          │
//!                                          └─write_chunked_body_done─▶ WritingTrailers ─write_trailers─▶ Done
//! ```
//!
//! Every call made out of order fails with [`WriteError::OutOfOrder`] without
//! writing anything or changing state. The same holds for a field containing
//! CR or LF, which fails with [`WriteError::InvalidField`].

use std::fmt;

use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::http::headers::Headers;
use crate::http::response::StatusCode;

const HTTP_VERSION: &str = "HTTP/1.1";
const CRLF: &[u8] = b"\r\n";

/// Type-erased output half of a connection.
pub type BoxedSink = Box<dyn AsyncWrite + Unpin + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    WritingStatusLine,
    WritingHeaders,
    WritingBody,
    WritingTrailers,
    Done,
}

impl fmt::Display for WriterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WriterState::WritingStatusLine => "writing status line",
            WriterState::WritingHeaders => "writing headers",
            WriterState::WritingBody => "writing body",
            WriterState::WritingTrailers => "writing trailers",
            WriterState::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("cannot {operation} while {state}")]
    OutOfOrder {
        operation: &'static str,
        state: WriterState,
    },
    #[error("field {name:?} contains CR or LF")]
    InvalidField { name: String },
    #[error("error writing to connection: {0}")]
    Io(#[from] std::io::Error),
}

pub struct ResponseWriter<W = BoxedSink> {
    out: W,
    state: WriterState,
    body_crlf: bool,
}

impl<W> ResponseWriter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(out: W) -> Self {
        Self {
            out,
            state: WriterState::WritingStatusLine,
            body_crlf: false,
        }
    }

    /// Appends CRLF after a fixed-length body.
    ///
    /// The extra two bytes are not covered by `Content-Length`, so strict
    /// clients see them as garbage after the message. Off by default.
    pub fn with_body_crlf(mut self, enabled: bool) -> Self {
        self.body_crlf = enabled;
        self
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn expect_state(&self, expected: WriterState, operation: &'static str) -> Result<(), WriteError> {
        if self.state != expected {
            return Err(WriteError::OutOfOrder {
                operation,
                state: self.state,
            });
        }
        Ok(())
    }

    /// Writes `HTTP/1.1 <code> <reason>\r\n`.
    pub async fn write_status_line(&mut self, status: StatusCode) -> Result<(), WriteError> {
        self.expect_state(WriterState::WritingStatusLine, "write status line")?;

        let line = format!(
            "{} {} {}\r\n",
            HTTP_VERSION,
            status.as_u16(),
            status.reason_phrase()
        );
        self.out.write_all(line.as_bytes()).await?;
        self.state = WriterState::WritingHeaders;
        Ok(())
    }

    /// Writes every field followed by the empty line ending the header section.
    pub async fn write_headers(&mut self, headers: &Headers) -> Result<(), WriteError> {
        self.expect_state(WriterState::WritingHeaders, "write headers")?;

        let block = field_block(headers)?;
        self.out.write_all(&block).await?;
        self.state = WriterState::WritingBody;
        Ok(())
    }

    /// Writes a complete fixed-length body and finishes the response.
    pub async fn write_body(&mut self, body: &[u8]) -> Result<usize, WriteError> {
        self.expect_state(WriterState::WritingBody, "write body")?;

        self.out.write_all(body).await?;
        if self.body_crlf {
            self.out.write_all(CRLF).await?;
        }
        self.out.flush().await?;
        self.state = WriterState::Done;
        Ok(body.len())
    }

    /// Writes one chunk: `<hex len>\r\n<bytes>\r\n`.
    ///
    /// An empty slice writes nothing, since a zero-size chunk would end the body.
    pub async fn write_chunked_body(&mut self, chunk: &[u8]) -> Result<usize, WriteError> {
        self.expect_state(WriterState::WritingBody, "write chunked body")?;

        if chunk.is_empty() {
            return Ok(0);
        }

        let mut buf = Vec::with_capacity(chunk.len() + 16);
        buf.extend_from_slice(format!("{:x}\r\n", chunk.len()).as_bytes());
        buf.extend_from_slice(chunk);
        buf.extend_from_slice(CRLF);
        self.out.write_all(&buf).await?;
        Ok(chunk.len())
    }

    /// Writes the terminal zero-size chunk `0\r\n`.
    ///
    /// The response is completed by [`write_trailers`](Self::write_trailers),
    /// with an empty [`Headers`] when no trailers were declared.
    pub async fn write_chunked_body_done(&mut self) -> Result<usize, WriteError> {
        self.expect_state(WriterState::WritingBody, "write chunked body done")?;

        self.out.write_all(b"0\r\n").await?;
        self.state = WriterState::WritingTrailers;
        Ok(0)
    }

    /// Writes trailer fields and the closing empty line, finishing the response.
    pub async fn write_trailers(&mut self, trailers: &Headers) -> Result<(), WriteError> {
        self.expect_state(WriterState::WritingTrailers, "write trailers")?;

        let block = field_block(trailers)?;
        self.out.write_all(&block).await?;
        self.out.flush().await?;
        self.state = WriterState::Done;
        Ok(())
    }
}

fn field_block(fields: &Headers) -> Result<Vec<u8>, WriteError> {
    let mut buf = Vec::new();
    for (name, value) in fields.iter() {
        if has_line_break(name) || has_line_break(value) {
            return Err(WriteError::InvalidField { name: name.to_string() });
        }
        buf.extend_from_slice(name.as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(value.as_bytes());
        buf.extend_from_slice(CRLF);
    }
    buf.extend_from_slice(CRLF);
    Ok(buf)
}

fn has_line_break(s: &str) -> bool {
    s.bytes().any(|b| b == b'\r' || b == b'\n')
}
