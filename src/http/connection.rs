use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::{Config, LimitsConfig};
use crate::http::parser::{ParseError, request_from_reader};
use crate::http::request::Request;
use crate::http::response::{HandlerError, StatusCode};
use crate::http::writer::{BoxedSink, ResponseWriter, WriterState};
use crate::server::Handler;

/// Per-connection knobs taken from [`Config`].
#[derive(Debug, Clone, Default)]
pub struct ConnectionSettings {
    pub limits: LimitsConfig,
    pub body_trailing_crlf: bool,
}

impl From<&Config> for ConnectionSettings {
    fn from(cfg: &Config) -> Self {
        Self {
            limits: cfg.limits.clone(),
            body_trailing_crlf: cfg.response.body_trailing_crlf,
        }
    }
}

/// One accepted connection: a single request, a single response, then close.
pub struct Connection<S> {
    stream: S,
    peer: String,
    handler: Arc<dyn Handler>,
    settings: ConnectionSettings,
}

enum ConnectionState {
    Reading,
    Rejecting(ParseError),
    Dispatching(Request),
    Closed,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(stream: S, handler: Arc<dyn Handler>, settings: ConnectionSettings) -> Self {
        Self {
            stream,
            peer: "unknown".to_string(),
            handler,
            settings,
        }
    }

    pub fn with_peer(mut self, peer: impl ToString) -> Self {
        self.peer = peer.to_string();
        self
    }

    /// Reads one request, answers it, and closes the stream.
    ///
    /// Malformed requests are answered with a 400 and never reach the
    /// handler. The stream is shut down on every path, including errors.
    pub async fn run(self) -> anyhow::Result<()> {
        let Connection {
            stream,
            peer,
            handler,
            settings,
        } = self;

        let (mut reader, sink) = tokio::io::split(stream);
        let sink: BoxedSink = Box::new(sink);
        let mut writer = ResponseWriter::new(sink).with_body_crlf(settings.body_trailing_crlf);

        let mut state = ConnectionState::Reading;
        let result = loop {
            match state {
                ConnectionState::Reading => {
                    let reading = request_from_reader(&mut reader, &settings.limits);
                    let parsed = match settings.limits.read_timeout() {
                        Some(deadline) => match timeout(deadline, reading).await {
                            Ok(parsed) => parsed,
                            Err(_) => {
                                warn!(peer = %peer, ?deadline, "timed out reading request");
                                state = ConnectionState::Closed;
                                continue;
                            }
                        },
                        None => reading.await,
                    };

                    state = match parsed {
                        Ok(req) => ConnectionState::Dispatching(req),
                        Err(e) if e.is_malformed_input() => ConnectionState::Rejecting(e),
                        Err(e) => break Err(anyhow::Error::from(e)),
                    };
                }

                ConnectionState::Rejecting(err) => {
                    warn!(peer = %peer, error = %err, "rejecting malformed request");
                    let rejection =
                        HandlerError::new(StatusCode::BadRequest, format!("Error parsing request: {err}"));
                    if let Err(e) = rejection.write_to(&mut writer).await {
                        break Err(anyhow::Error::from(e));
                    }
                    state = ConnectionState::Closed;
                }

                ConnectionState::Dispatching(req) => {
                    info!(
                        peer = %peer,
                        method = %req.request_line.method,
                        target = %req.request_line.target,
                        body_len = req.body.len(),
                        "dispatching request"
                    );
                    handler.call(&req, &mut writer).await;

                    if writer.state() != WriterState::Done {
                        warn!(peer = %peer, state = %writer.state(), "handler returned before finishing the response");
                    }
                    state = ConnectionState::Closed;
                }

                ConnectionState::Closed => break Ok(()),
            }
        };

        let mut sink = writer.into_inner();
        if let Err(e) = sink.shutdown().await {
            debug!(peer = %peer, error = %e, "error shutting down connection");
        }
        debug!(peer = %peer, "connection closed");

        result
    }
}
