use crate::http::headers::HeaderMap;
use crate::http::request::{Method, Request, Version};

const CRLF: &[u8] = b"\r\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("malformed request line")]
    MalformedRequestLine,
    #[error("invalid http version")]
    InvalidVersion,
    #[error("invalid method")]
    InvalidMethod,
    #[error("http method not yet supported")]
    UnsupportedMethod,
    #[error("field/header line is malformed")]
    MalformedHeaderLine,
    #[error("invalid content-length")]
    InvalidContentLength,
    #[error("unsupported transfer-encoding")]
    UnsupportedEncoding,
    #[error("request does not fit in the read buffer")]
    RequestTooLarge,
}

/// Where the parser is in the request. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    RequestLine,
    FieldLines,
    Body,
    Done,
}

/// Result of one [`RequestParser::feed`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// More input is needed. `consumed` bytes were used and must be
    /// discarded before the next call.
    Partial { consumed: usize },
    /// The request is complete; the bytes after `consumed` belong to
    /// whatever comes next on the connection.
    Complete { consumed: usize },
}

impl Status {
    pub fn consumed(&self) -> usize {
        match *self {
            Status::Partial { consumed } | Status::Complete { consumed } => consumed,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Status::Complete { .. })
    }
}

/// Incremental HTTP/1.x request parser.
///
/// Feed it the unconsumed part of the read buffer as often as new bytes
/// arrive. Each call resumes from the last state and reports how many bytes
/// it used; those bytes are never looked at again, so the caller must drop
/// them before the next call.
#[derive(Debug)]
pub struct RequestParser {
    state: ParseState,
    method: Option<Method>,
    target: String,
    version: Option<Version>,
    headers: HeaderMap,
    content_length: Option<usize>,
    body: Vec<u8>,
    failed: Option<ParseError>,
}

impl Default for RequestParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestParser {
    pub fn new() -> Self {
        Self {
            state: ParseState::RequestLine,
            method: None,
            target: String::new(),
            version: None,
            headers: HeaderMap::new(),
            content_length: None,
            body: Vec::new(),
            failed: None,
        }
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    /// Version from the request line, once it has been parsed.
    pub fn version(&self) -> Option<Version> {
        self.version
    }

    /// Consumes as many complete lines (and the body) from `data` as
    /// possible.
    ///
    /// Errors are sticky: once a call fails, every later call returns the
    /// same error.
    pub fn feed(&mut self, data: &[u8]) -> Result<Status, ParseError> {
        if let Some(err) = self.failed {
            return Err(err);
        }
        self.advance(data).inspect_err(|&err| self.failed = Some(err))
    }

    fn advance(&mut self, data: &[u8]) -> Result<Status, ParseError> {
        let mut consumed = 0;

        loop {
            match self.state {
                ParseState::RequestLine => {
                    let Some(end) = find_crlf(&data[consumed..]) else {
                        return Ok(Status::Partial { consumed });
                    };
                    let line = &data[consumed..consumed + end];
                    consumed += end + CRLF.len();
                    self.parse_request_line(line)?;
                    self.state = ParseState::FieldLines;
                }

                ParseState::FieldLines => {
                    let Some(end) = find_crlf(&data[consumed..]) else {
                        return Ok(Status::Partial { consumed });
                    };
                    if end == 0 {
                        consumed += CRLF.len();
                        self.apply_header_semantics()?;
                        self.state = ParseState::Body;
                        continue;
                    }
                    let line = &data[consumed..consumed + end];
                    consumed += end + CRLF.len();
                    self.parse_field_line(line)?;
                }

                ParseState::Body => {
                    // Chunked request bodies are not implemented; refuse
                    // them instead of misreading the framing.
                    if self.headers.contains_key("transfer-encoding") {
                        return Err(ParseError::UnsupportedEncoding);
                    }
                    if let Some(length) = self.content_length {
                        let available = data.len() - consumed;
                        if available < length {
                            return Ok(Status::Partial { consumed });
                        }
                        self.body = data[consumed..consumed + length].to_vec();
                        consumed += length;
                    }
                    self.state = ParseState::Done;
                }

                ParseState::Done => return Ok(Status::Complete { consumed }),
            }
        }
    }

    /// Hands out the parsed request once the parser is done.
    ///
    /// Returns `None` before completion and on every call after the first
    /// successful one.
    pub fn take_request(&mut self) -> Option<Request> {
        if self.state != ParseState::Done {
            return None;
        }
        let method = self.method.take()?;
        let version = self.version.take()?;

        Some(Request {
            method,
            target: std::mem::take(&mut self.target),
            version,
            headers: std::mem::take(&mut self.headers),
            content_length: self.content_length,
            body: std::mem::take(&mut self.body),
        })
    }

    /// `METHOD SP TARGET SP VERSION`, cut on the first two spaces only.
    ///
    /// Anything after a third token therefore ends up in the version field
    /// and fails as an invalid version rather than a malformed line.
    fn parse_request_line(&mut self, line: &[u8]) -> Result<(), ParseError> {
        let line = std::str::from_utf8(line).map_err(|_| ParseError::MalformedRequestLine)?;

        let (method, rest) = line
            .split_once(' ')
            .ok_or(ParseError::MalformedRequestLine)?;
        let (target, version) = rest
            .split_once(' ')
            .ok_or(ParseError::MalformedRequestLine)?;

        self.method = Some(method.parse()?);
        self.version = Some(version.parse()?);
        self.target = target.to_string();
        Ok(())
    }

    fn parse_field_line(&mut self, line: &[u8]) -> Result<(), ParseError> {
        let line = std::str::from_utf8(line).map_err(|_| ParseError::MalformedHeaderLine)?;

        let (name, value) = line
            .split_once(':')
            .ok_or(ParseError::MalformedHeaderLine)?;
        if name.is_empty() {
            return Err(ParseError::MalformedHeaderLine);
        }

        self.headers.add(name, value.trim());
        Ok(())
    }

    /// Resolves headers that change how the rest of the message is read.
    ///
    /// `Content-Length` may repeat, but every occurrence must carry the same
    /// non-negative decimal value.
    fn apply_header_semantics(&mut self) -> Result<(), ParseError> {
        let mut resolved = None;
        for value in self.headers.get_all("content-length") {
            let length = parse_content_length(value).ok_or(ParseError::InvalidContentLength)?;
            if resolved.is_some_and(|prev| prev != length) {
                return Err(ParseError::InvalidContentLength);
            }
            resolved = Some(length);
        }
        self.content_length = resolved;
        Ok(())
    }
}

/// Strict decimal parse: digits only, no sign.
pub(crate) fn parse_content_length(value: &str) -> Option<usize> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(CRLF.len()).position(|w| w == CRLF)
}

/// Parses a whole buffer in one go.
///
/// Returns `Ok(None)` when the buffer holds only part of a request, and
/// otherwise the request together with the number of bytes it occupied.
pub fn parse_http_request(buf: &[u8]) -> Result<Option<(Request, usize)>, ParseError> {
    let mut parser = RequestParser::new();
    match parser.feed(buf)? {
        Status::Complete { consumed } => Ok(parser.take_request().map(|req| (req, consumed))),
        Status::Partial { .. } => Ok(None),
    }
}
