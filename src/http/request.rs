use std::fmt;
use std::str::FromStr;

use crate::http::headers::HeaderMap;
use crate::http::parser::ParseError;

/// HTTP request methods the server implements.
///
/// Other registered method tokens (`HEAD`, `PUT`, `DELETE`, `CONNECT`,
/// `OPTIONS`, `TRACE`) are recognized by the parser but rejected as
/// unsupported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET - Retrieve a resource
    GET,
    /// POST - Create or submit data
    POST,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
        }
    }
}

impl FromStr for Method {
    type Err = ParseError;

    /// Parses a method token (case-sensitive).
    ///
    /// # Example
    ///
    /// ```
    /// # use wicket::http::request::Method;
    /// # use wicket::http::parser::ParseError;
    /// assert_eq!("GET".parse::<Method>(), Ok(Method::GET));
    /// assert_eq!("PUT".parse::<Method>(), Err(ParseError::UnsupportedMethod));
    /// assert_eq!("get".parse::<Method>(), Err(ParseError::InvalidMethod));
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(Method::GET),
            "POST" => Ok(Method::POST),
            "HEAD" | "PUT" | "DELETE" | "CONNECT" | "OPTIONS" | "TRACE" => {
                Err(ParseError::UnsupportedMethod)
            }
            _ => Err(ParseError::InvalidMethod),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Protocol version of a request. Only 1.0 and 1.1 exist on this server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    Http10,
    Http11,
}

impl Version {
    pub fn as_str(&self) -> &'static str {
        match self {
            Version::Http10 => "HTTP/1.0",
            Version::Http11 => "HTTP/1.1",
        }
    }

    /// `(major, minor)` pair.
    pub fn pair(&self) -> (u8, u8) {
        match self {
            Version::Http10 => (1, 0),
            Version::Http11 => (1, 1),
        }
    }
}

impl FromStr for Version {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HTTP/1.1" => Ok(Version::Http11),
            "HTTP/1.0" => Ok(Version::Http10),
            _ => Err(ParseError::InvalidVersion),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Represents a parsed HTTP request from a client.
///
/// Produced by [`RequestParser`](crate::http::parser::RequestParser) once it
/// reaches its terminal state and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// The HTTP method (GET or POST)
    pub method: Method,
    /// The request target exactly as sent (e.g., "/index.html?x=1")
    pub target: String,
    pub version: Version,
    pub headers: HeaderMap,
    /// Resolved `Content-Length`, if the header was present
    pub content_length: Option<usize>,
    pub body: Vec<u8>,
}

impl Request {
    /// Retrieves the first value of a header, case-insensitively.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key)
    }

    /// Declared body length, 0 when no `Content-Length` was sent.
    pub fn content_length(&self) -> usize {
        self.content_length.unwrap_or(0)
    }

    /// Whether the client asked for the connection to stay open.
    ///
    /// HTTP/1.0 closes unless `Connection` lists `keep-alive`; HTTP/1.1
    /// stays open unless `Connection` lists `close`.
    pub fn keep_alive(&self) -> bool {
        match self.version {
            Version::Http10 => self.headers.has_token("connection", "keep-alive"),
            Version::Http11 => !self.headers.has_token("connection", "close"),
        }
    }
}

/// Builder for constructing Request objects outside the parser.
pub struct RequestBuilder {
    method: Option<Method>,
    target: Option<String>,
    version: Version,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self {
            method: None,
            target: None,
            version: Version::Http11,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    pub fn header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.headers.add(key, value);
        self
    }

    /// Sets the body and a matching `Content-Length`.
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn build(mut self) -> Result<Request, &'static str> {
        let content_length = if self.body.is_empty() {
            None
        } else {
            self.headers.set("content-length", self.body.len().to_string());
            Some(self.body.len())
        };

        Ok(Request {
            method: self.method.ok_or("method missing")?,
            target: self.target.ok_or("target missing")?,
            version: self.version,
            headers: self.headers,
            content_length,
            body: self.body,
        })
    }
}
