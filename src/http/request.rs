use std::fmt;

use crate::http::headers::{Headers, find_crlf};
use crate::http::parser::ParseError;

const CRLF_LEN: usize = 2;
const SUPPORTED_VERSION: &str = "HTTP/1.1";

/// Position of a [`Request`] in its parse state machine.
///
/// ```text
/// Init ──request-line──▶ ParsingHeaders ──empty line──▶ ParsingBody ──content-length reached──▶ Done
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    /// Waiting for the request-line
    Init,
    /// Reading header lines until the empty line
    ParsingHeaders,
    /// Accumulating the body declared by `content-length`
    ParsingBody,
    /// The request is complete and immutable
    Done,
}

impl fmt::Display for ParseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParseState::Init => "init",
            ParseState::ParsingHeaders => "parsing headers",
            ParseState::ParsingBody => "parsing body",
            ParseState::Done => "done",
        };
        f.write_str(name)
    }
}

/// The first line of a request: `<METHOD> <TARGET> HTTP/1.1`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestLine {
    /// Method token, uppercase letters only (e.g. "GET")
    pub method: String,
    /// Request target, always starting with `/`
    pub target: String,
    /// Version after the `HTTP/` prefix, always "1.1"
    pub http_version: String,
}

impl RequestLine {
    /// Parses a request-line without its CRLF.
    ///
    /// # Example
    ///
    /// ```
    /// # use rawhttp::http::request::RequestLine;
    /// let line = RequestLine::parse(b"GET /path HTTP/1.1").unwrap();
    /// assert_eq!(line.method, "GET");
    /// assert_eq!(line.target, "/path");
    /// assert_eq!(line.http_version, "1.1");
    /// ```
    pub fn parse(line: &[u8]) -> Result<Self, ParseError> {
        let line = std::str::from_utf8(line).map_err(|_| ParseError::InvalidRequestLineEncoding)?;

        let parts: Vec<&str> = line.split(' ').collect();
        let &[method, target, version] = parts.as_slice() else {
            return Err(ParseError::InvalidRequestLineParts(parts.len()));
        };

        if method.is_empty() || !method.bytes().all(|b| b.is_ascii_uppercase()) {
            return Err(ParseError::InvalidMethod(method.to_string()));
        }

        if !target.starts_with('/') {
            return Err(ParseError::InvalidTarget(target.to_string()));
        }

        if version != SUPPORTED_VERSION {
            return Err(ParseError::InvalidVersion(version.to_string()));
        }

        let (_, http_version) = version
            .split_once('/')
            .ok_or_else(|| ParseError::InvalidVersion(version.to_string()))?;

        Ok(Self {
            method: method.to_string(),
            target: target.to_string(),
            http_version: http_version.to_string(),
        })
    }
}

/// A request as assembled by the parser.
///
/// Once [`Request::state`] reaches [`ParseState::Done`] the request is handed
/// to the application handler and no longer mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub request_line: RequestLine,
    pub headers: Headers,
    pub body: Vec<u8>,
    state: ParseState,
}

impl Default for Request {
    fn default() -> Self {
        Self::new()
    }
}

impl Request {
    pub fn new() -> Self {
        Self {
            request_line: RequestLine::default(),
            headers: Headers::new(),
            body: Vec::new(),
            state: ParseState::Init,
        }
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == ParseState::Done
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// The declared body length, `None` when no `content-length` was sent.
    pub fn content_length(&self) -> Result<Option<usize>, ParseError> {
        self.headers
            .get("content-length")
            .map(|v| {
                v.parse::<usize>()
                    .map_err(|_| ParseError::InvalidContentLength(v.to_string()))
            })
            .transpose()
    }

    /// Drives the state machine over buffered bytes.
    ///
    /// Parses as many units (request-line, header line, body bytes) as `data`
    /// allows and returns how many bytes were consumed. Unconsumed bytes must
    /// be presented again, followed by more input, on the next call.
    pub fn parse(&mut self, data: &[u8]) -> Result<usize, ParseError> {
        if self.is_done() {
            return Err(ParseError::ParseAfterDone);
        }

        let mut consumed = 0;
        while !self.is_done() {
            let before = self.state;
            let n = self.parse_single(&data[consumed..])?;
            consumed += n;

            if n == 0 && self.state == before {
                break;
            }
        }

        Ok(consumed)
    }

    fn parse_single(&mut self, data: &[u8]) -> Result<usize, ParseError> {
        match self.state {
            ParseState::Init => {
                let Some(line_end) = find_crlf(data) else {
                    return Ok(0);
                };
                self.request_line = RequestLine::parse(&data[..line_end])?;
                self.state = ParseState::ParsingHeaders;
                tracing::trace!(
                    method = %self.request_line.method,
                    target = %self.request_line.target,
                    "request line parsed"
                );
                Ok(line_end + CRLF_LEN)
            }

            ParseState::ParsingHeaders => {
                let (n, done) = self.headers.parse(data)?;
                if done {
                    self.state = ParseState::ParsingBody;
                }
                Ok(n)
            }

            ParseState::ParsingBody => self.parse_body(data),

            ParseState::Done => Err(ParseError::ParseAfterDone),
        }
    }

    fn parse_body(&mut self, data: &[u8]) -> Result<usize, ParseError> {
        let Some(declared) = self.content_length()? else {
            if !data.is_empty() {
                return Err(ParseError::BodyWithoutContentLength(data.len()));
            }
            self.state = ParseState::Done;
            return Ok(0);
        };

        if declared == 0 || self.body.len() == declared {
            self.state = ParseState::Done;
            return Ok(0);
        }

        if self.body.len() > declared {
            return Err(ParseError::BodyTooLong {
                declared,
                actual: self.body.len(),
            });
        }

        self.body.extend_from_slice(data);
        Ok(data.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_in_done_state_fails() {
        let mut req = Request::new();
        let n = req.parse(b"GET / HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(n, 18);
        assert!(req.is_done());
        assert!(matches!(req.parse(b"x"), Err(ParseError::ParseAfterDone)));
    }

    #[test]
    fn waits_for_crlf_before_request_line() {
        let mut req = Request::new();
        assert_eq!(req.parse(b"GET / HTT").unwrap(), 0);
        assert_eq!(req.state(), ParseState::Init);
    }
}
