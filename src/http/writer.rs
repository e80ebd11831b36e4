use std::io::Write;
use std::time::SystemTime;

use tracing::{debug, warn};

use crate::http::headers::HeaderMap;
use crate::http::parser::parse_content_length;
use crate::http::request::{Request, Version};
use crate::http::response::{Framing, StatusCode};

#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("unsupported status code {0}")]
    UnsupportedStatus(u16),
    #[error("invalid content-length {0:?}")]
    InvalidContentLength(String),
    #[error("write overflow: {attempted} bytes exceeds declared content-length {declared}")]
    Overflow { declared: usize, attempted: usize },
    #[error("response already finished")]
    Finished,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Serializes one response onto a sink.
///
/// Headers stay pending until [`write_header`](Self::write_header) or the
/// first [`write`](Self::write); from then on the status line, headers and
/// framing are fixed. The connection hands handlers a writer over an
/// in-memory `Vec<u8>` and copies it to the socket once the handler returns.
pub struct ResponseWriter<W: Write = Vec<u8>> {
    sink: W,
    version: Version,
    request_keep_alive: bool,
    pending: HeaderMap,
    sent: Option<(StatusCode, HeaderMap)>,
    framing: Option<Framing>,
    written: usize,
    finished: bool,
}

impl<W: Write> ResponseWriter<W> {
    /// Creates a writer answering a request of the given version.
    ///
    /// `request_keep_alive` only matters for HTTP/1.0, where the response
    /// echoes the client's explicit `Connection: keep-alive`.
    pub fn new(sink: W, version: Version, request_keep_alive: bool) -> Self {
        Self {
            sink,
            version,
            request_keep_alive,
            pending: HeaderMap::new(),
            sent: None,
            framing: None,
            written: 0,
            finished: false,
        }
    }

    pub fn for_request(sink: W, request: &Request) -> Self {
        Self::new(sink, request.version, request.keep_alive())
    }

    /// Response headers still to be sent.
    ///
    /// Once the header block is flushed this hands out a detached map, so
    /// late changes are silently dropped.
    pub fn header(&mut self) -> &mut HeaderMap {
        &mut self.pending
    }

    /// Flushes the status line and header block.
    ///
    /// Only the first successful call writes anything. Codes outside the
    /// status table are refused without touching the sink.
    pub fn write_header(&mut self, code: u16) -> Result<(), WriteError> {
        if self.sent.is_some() {
            debug!(code, "superfluous write_header call");
            return Ok(());
        }
        let Some(status) = StatusCode::from_u16(code) else {
            warn!(code, "refusing to write unsupported status code");
            return Err(WriteError::UnsupportedStatus(code));
        };
        self.flush_head(status)
    }

    fn flush_head(&mut self, status: StatusCode) -> Result<(), WriteError> {
        let headers = &mut self.pending;

        if status.forbids_body() {
            headers.set("content-length", "0");
        }

        let mut framing = None;
        if let Some(value) = headers.get("content-length") {
            let length = parse_content_length(value)
                .ok_or_else(|| WriteError::InvalidContentLength(value.to_string()))?;
            framing = Some(Framing::ContentLength(length));
            headers.remove("transfer-encoding");
        }

        if self.version == Version::Http10 {
            if self.request_keep_alive && !headers.has_token("connection", "close") {
                headers.set("connection", "keep-alive");
            } else {
                headers.set("connection", "close");
            }
        }

        if !headers.contains_key("date") {
            headers.set("date", httpdate::fmt_http_date(SystemTime::now()));
        }

        let framing = match (framing, self.version) {
            (Some(framing), _) => framing,
            (None, Version::Http11) => {
                if !headers.has_token("transfer-encoding", "chunked") {
                    headers.set("transfer-encoding", "chunked");
                }
                Framing::Chunked
            }
            (None, Version::Http10) => {
                // 1.0 clients cannot decode chunks; end the body by closing.
                headers.remove("transfer-encoding");
                headers.set("connection", "close");
                Framing::UntilClose
            }
        };

        let mut head = Vec::with_capacity(256);
        head.extend_from_slice(
            format!(
                "{} {} {}\r\n",
                self.version,
                status.as_u16(),
                status.reason_phrase()
            )
            .as_bytes(),
        );
        headers.for_each(|name, value| {
            head.extend_from_slice(name.as_bytes());
            head.extend_from_slice(b": ");
            head.extend_from_slice(value.as_bytes());
            head.extend_from_slice(b"\r\n");
        });
        head.extend_from_slice(b"\r\n");

        self.framing = Some(framing);
        self.sent = Some((status, std::mem::take(&mut self.pending)));
        self.sink.write_all(&head)?;
        Ok(())
    }

    /// Writes body bytes, flushing a `200 OK` header block first if needed.
    ///
    /// With a declared `Content-Length`, a write that would go past it is
    /// refused whole and nothing reaches the sink.
    pub fn write(&mut self, data: &[u8]) -> Result<usize, WriteError> {
        if self.finished {
            return Err(WriteError::Finished);
        }
        if self.sent.is_none() {
            self.write_header(StatusCode::Ok.as_u16())?;
        }

        match self.framing {
            Some(Framing::ContentLength(declared)) => {
                let attempted = self.written + data.len();
                if attempted > declared {
                    warn!(declared, attempted, "response body exceeds content-length");
                    return Err(WriteError::Overflow { declared, attempted });
                }
                self.sink.write_all(data)?;
            }
            Some(Framing::Chunked) => {
                // A zero-size chunk would terminate the body early.
                if data.is_empty() {
                    return Ok(0);
                }
                self.sink.write_all(format!("{:x}\r\n", data.len()).as_bytes())?;
                self.sink.write_all(data)?;
                self.sink.write_all(b"\r\n")?;
            }
            Some(Framing::UntilClose) | None => self.sink.write_all(data)?,
        }

        self.written += data.len();
        Ok(data.len())
    }

    /// Completes the response after the handler returns.
    ///
    /// Flushes a `200 OK` header block if nothing was written yet and
    /// terminates a chunked body. Returns `false` when fewer body bytes were
    /// written than the declared `Content-Length`, in which case the client
    /// can no longer find the end of the message.
    pub fn finish(&mut self) -> Result<bool, WriteError> {
        if self.sent.is_none() {
            self.write_header(StatusCode::Ok.as_u16())?;
        }
        if !self.finished {
            self.finished = true;
            if self.framing == Some(Framing::Chunked) {
                self.sink.write_all(b"0\r\n\r\n")?;
            }
        }

        Ok(match self.framing {
            Some(Framing::ContentLength(declared)) => self.written == declared,
            _ => true,
        })
    }

    /// Protocol version used on the status line.
    pub fn version(&self) -> Version {
        self.version
    }

    pub fn head_written(&self) -> bool {
        self.sent.is_some()
    }

    /// Status that went out with the header block.
    pub fn status(&self) -> Option<StatusCode> {
        self.sent.as_ref().map(|(status, _)| *status)
    }

    /// Header block as it was sent.
    pub fn sent_headers(&self) -> Option<&HeaderMap> {
        self.sent.as_ref().map(|(_, headers)| headers)
    }

    pub fn framing(&self) -> Option<Framing> {
        self.framing
    }

    /// Body bytes accepted so far, excluding chunk envelopes.
    pub fn bytes_written(&self) -> usize {
        self.written
    }

    /// Whether the sent response requires the connection to close.
    pub fn wants_close(&self) -> bool {
        self.framing == Some(Framing::UntilClose)
            || self
                .sent_headers()
                .is_some_and(|h| h.has_token("connection", "close"))
    }

    pub fn sink(&self) -> &W {
        &self.sink
    }

    /// Gives up on the response and hands back the sink as it stands.
    ///
    /// Unlike [`finish`](Self::finish) this never terminates a chunked
    /// body, so a client can tell the message was cut short once the
    /// connection closes.
    pub fn abandon(self) -> W {
        self.sink
    }

    pub fn into_inner(self) -> W {
        self.sink
    }
}
