use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, error, warn};

use crate::config::ServerConfig;
use crate::http::buffer::ReadBuffer;
use crate::http::parser::{ParseError, RequestParser};
use crate::http::request::{Request, Version};
use crate::http::response::StatusCode;
use crate::http::writer::{ResponseWriter, WriteError};
use crate::server::router::Router;

/// Limits applied to every connection, fixed by the server at startup.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionSettings {
    /// Deadline for receiving one complete request.
    pub read_timeout: Duration,
    /// Most bytes buffered while waiting for a request to complete.
    pub max_request_bytes: usize,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

impl From<&ServerConfig> for ConnectionSettings {
    fn from(cfg: &ServerConfig) -> Self {
        Self {
            read_timeout: cfg.read_timeout(),
            max_request_bytes: cfg.max_request_bytes,
        }
    }
}

pub struct Connection<S = TcpStream> {
    stream: S,
    buffer: ReadBuffer,
    state: ConnectionState,
    router: Arc<Router>,
    settings: ConnectionSettings,
    /// Version to answer a rejected request with.
    reject_version: Version,
}

pub enum ConnectionState {
    Reading,
    Processing(Request),
    Writing(Vec<u8>, bool), // bool = keep_alive?
    Closed,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, router: Arc<Router>, settings: ConnectionSettings) -> Self {
        Self {
            stream,
            buffer: ReadBuffer::with_limit(settings.max_request_bytes),
            state: ConnectionState::Reading,
            router,
            settings,
            reject_version: Version::Http11,
        }
    }

    /// Serves requests until the client or a response asks to close, the
    /// read deadline passes, or the request is malformed.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        loop {
            match std::mem::replace(&mut self.state, ConnectionState::Closed) {
                ConnectionState::Reading => match self.read_request().await {
                    Ok(Some(req)) => {
                        self.state = ConnectionState::Processing(req);
                    }
                    Ok(None) => {
                        self.state = ConnectionState::Closed;
                    }
                    Err(e) => {
                        let Some(&parse_error) = e.downcast_ref::<ParseError>() else {
                            return Err(e);
                        };
                        warn!(error = %parse_error, "rejecting malformed request");
                        let status = match parse_error {
                            ParseError::RequestTooLarge => StatusCode::PayloadTooLarge,
                            _ => StatusCode::BadRequest,
                        };
                        let response = canned_response(self.reject_version, status);
                        self.state = ConnectionState::Writing(response, false);
                    }
                },

                ConnectionState::Processing(req) => {
                    let (response, keep_alive) = self.handle_request(&req);
                    self.state = ConnectionState::Writing(response, keep_alive);
                }

                ConnectionState::Writing(response, keep_alive) => {
                    self.stream
                        .write_all(&response)
                        .await
                        .context("failed to write response")?;
                    self.stream.flush().await.context("failed to flush response")?;

                    if keep_alive {
                        self.state = ConnectionState::Reading; // go back for next request
                    } else {
                        self.state = ConnectionState::Closed;
                    }
                }

                ConnectionState::Closed => {
                    break;
                }
            }
        }

        // The peer may already be gone; the socket is released on drop anyway.
        let _ = self.stream.shutdown().await;
        Ok(())
    }

    /// Reads until one request is complete.
    ///
    /// Returns `Ok(None)` when the client closes the connection or the read
    /// deadline expires, and a [`ParseError`] (inside the `anyhow::Error`)
    /// for requests that cannot be served.
    pub async fn read_request(&mut self) -> anyhow::Result<Option<Request>> {
        let deadline = Instant::now() + self.settings.read_timeout;
        let mut parser = RequestParser::new();

        loop {
            // Leftover bytes from the previous turn are parsed before reading.
            let fed = parser.feed(self.buffer.unconsumed());
            // Falls back to 1.1 until the request line is known.
            self.reject_version = parser.version().unwrap_or(Version::Http11);
            let status = fed?;
            self.buffer.consume(status.consumed());
            if status.is_complete() {
                return Ok(parser.take_request());
            }

            if self.buffer.is_full() {
                return Err(ParseError::RequestTooLarge.into());
            }

            let mut temp = [0u8; 1024];
            let want = temp.len().min(self.buffer.remaining());
            let n = match timeout_at(deadline, self.stream.read(&mut temp[..want])).await {
                Ok(read) => read.context("failed to read from client")?,
                Err(_) => {
                    debug!(
                        buffered = self.buffer.len(),
                        "read deadline expired, closing connection"
                    );
                    return Ok(None);
                }
            };

            if n == 0 {
                // Client closed connection
                if !self.buffer.is_empty() {
                    debug!(buffered = self.buffer.len(), "client closed mid-request");
                }
                return Ok(None);
            }

            self.buffer.append(&temp[..n]);
        }
    }

    /// Runs the handler for `req` and decides whether the connection
    /// survives the turn.
    fn handle_request(&self, req: &Request) -> (Vec<u8>, bool) {
        let mut writer = ResponseWriter::for_request(Vec::new(), req);

        let served = match self.router.resolve(&req.target) {
            Some(handler) => handler.serve(&mut writer, req),
            None => {
                debug!(path = %req.target, "no handler registered for target");
                not_found(&mut writer).map_err(Into::into)
            }
        };

        if let Err(e) = served {
            error!(
                method = %req.method,
                path = %req.target,
                error = %e,
                "handler failed"
            );
            if !writer.head_written() {
                return (canned_response(req.version, StatusCode::InternalServerError), false);
            }
            // Part of the response is out; leave the body unterminated so
            // the client sees the truncation when the connection closes.
            return (writer.abandon(), false);
        }

        let keep_alive = req.keep_alive() && !writer.wants_close();
        let (response, complete) = finish_or_log(writer);

        debug!(
            method = %req.method,
            path = %req.target,
            version = %req.version,
            keep_alive = keep_alive && complete,
            "request served"
        );

        (response, keep_alive && complete)
    }
}

/// Terminates the body and hands back the serialized bytes, plus whether the
/// message framing is intact.
fn finish_or_log(mut writer: ResponseWriter) -> (Vec<u8>, bool) {
    let complete = match writer.finish() {
        Ok(true) => true,
        Ok(false) => {
            warn!(
                written = writer.bytes_written(),
                "response body shorter than its content-length, closing connection"
            );
            false
        }
        Err(e) => {
            warn!(error = %e, "failed to finish response");
            if !writer.head_written() {
                return (canned_response(writer.version(), StatusCode::InternalServerError), false);
            }
            false
        }
    };
    (writer.into_inner(), complete)
}

fn not_found(writer: &mut ResponseWriter) -> Result<(), WriteError> {
    let body = b"404 Not Found";
    writer.header().set("content-type", "text/plain");
    writer.header().set("content-length", body.len().to_string());
    writer.write_header(StatusCode::NotFound.as_u16())?;
    writer.write(body)?;
    Ok(())
}

/// Small plain-text response that always closes the connection.
///
/// Rejected requests are answered in their own version when the request
/// line got that far, HTTP/1.1 otherwise.
fn canned_response(version: Version, status: StatusCode) -> Vec<u8> {
    let body = format!("{} {}", status.as_u16(), status.reason_phrase());
    let mut writer = ResponseWriter::new(Vec::new(), version, false);
    writer.header().set("content-type", "text/plain");
    writer.header().set("content-length", body.len().to_string());
    writer.header().set("connection", "close");

    let rendered = writer
        .write_header(status.as_u16())
        .and_then(|_| writer.write(body.as_bytes()));
    if let Err(e) = rendered {
        error!(error = %e, status = status.as_u16(), "failed to render error response");
    }
    writer.into_inner()
}
