//! Streaming request description.

use std::{fmt, str::FromStr};

use thiserror::Error;

/// HTTP method of a streaming endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Method {
    /// Parameters go in the query string.
    #[default]
    Get,
    /// Parameters go in a form-encoded body.
    Post,
}

impl Method {
    /// Upper-case method name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Error returned when a method name is not `GET` or `POST`.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unsupported method {0:?}; expected GET or POST")]
pub struct UnknownMethod(String);

impl FromStr for Method {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("get") {
            Ok(Self::Get)
        } else if s.eq_ignore_ascii_case("post") {
            Ok(Self::Post)
        } else {
            Err(UnknownMethod(s.to_owned()))
        }
    }
}

/// A single request header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestHeader {
    /// Header name.
    pub name: String,
    /// Header value.
    pub value: String,
}

impl RequestHeader {
    /// Build a header.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Parse a `Name: value` line.
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let (name, value) = line.split_once(':')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        Some(Self::new(name, value.trim()))
    }
}

impl fmt::Display for RequestHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.value)
    }
}

/// What to stream: URL, method and parameters.
///
/// # Examples
///
/// ```
/// use streamwire::transport::{Method, StreamRequest};
///
/// let request = StreamRequest::post("https://stream.example.com/1.1/statuses/filter.json")
///     .param("track", "rust");
/// assert_eq!(request.method(), Method::Post);
/// assert_eq!(request.params(), &[("track".to_owned(), "rust".to_owned())]);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamRequest {
    url: String,
    method: Method,
    params: Vec<(String, String)>,
}

impl StreamRequest {
    /// Request with an explicit method.
    #[must_use]
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method,
            params: Vec::new(),
        }
    }

    /// `GET` request.
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self { Self::new(Method::Get, url) }

    /// `POST` request.
    #[must_use]
    pub fn post(url: impl Into<String>) -> Self { Self::new(Method::Post, url) }

    /// Append a parameter.
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Target URL.
    #[must_use]
    pub fn url(&self) -> &str { &self.url }

    /// HTTP method.
    #[must_use]
    pub fn method(&self) -> Method { self.method }

    /// Parameters in insertion order.
    #[must_use]
    pub fn params(&self) -> &[(String, String)] { &self.params }
}

/// A request ready for one attempt: freshly signed headers included.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreparedRequest {
    request: StreamRequest,
    headers: Vec<RequestHeader>,
}

impl PreparedRequest {
    /// Combine a request with its per-attempt headers.
    #[must_use]
    pub fn new(request: StreamRequest, headers: Vec<RequestHeader>) -> Self {
        Self { request, headers }
    }

    /// The underlying request.
    #[must_use]
    pub fn request(&self) -> &StreamRequest { &self.request }

    /// Headers to send.
    #[must_use]
    pub fn headers(&self) -> &[RequestHeader] { &self.headers }

    /// Value of the first header named `name`, ignoring case.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }
}
