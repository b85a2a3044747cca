//! HTTP exchange types for the itinerary transport.
//!
//! # Design
//! Requests and responses are plain data. The interception stages are pure
//! functions over these values, and the physical round-trip is delegated to a
//! [`Transport`](crate::transport::Transport) implementation. Keeping the
//! exchange as data lets the retry state machine be driven by a scripted
//! transport in tests, with no sockets involved.

use std::fmt;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
}

impl HttpMethod {
    /// Whether repeating the request has the same effect as sending it once.
    ///
    /// GET, HEAD, PUT, DELETE and OPTIONS are idempotent. POST and PATCH are
    /// not, so a failed attempt that reached the server is never replayed.
    pub fn is_idempotent(self) -> bool {
        matches!(
            self,
            HttpMethod::Get
                | HttpMethod::Head
                | HttpMethod::Put
                | HttpMethod::Delete
                | HttpMethod::Options
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An HTTP request described as plain data.
///
/// `url` is the base URL joined with `path`; `path` is kept separately for
/// diagnostics. Built by [`ItineraryClient::build_request`](crate::ItineraryClient::build_request)
/// and then passed through the outbound stage before every physical attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Set a header, replacing any existing value with the same name.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_ascii_lowercase(), value.into()));
    }
}

/// An HTTP response described as plain data.
///
/// Every received response is represented here regardless of status; the
/// inbound stage decides whether it is a success or a classified error.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Why a physical attempt produced no usable response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportFailure {
    /// DNS failure, refused connection, reset, TLS failure.
    Connect(String),
    /// No response within the configured per-attempt timeout.
    Timeout,
    /// The request could not be built (bad URL, bad header value) and was
    /// never sent.
    Invalid(String),
    /// A status line arrived but the body could not be read. The server has
    /// seen the request.
    Body { status: u16, message: String },
}

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportFailure::Connect(msg) => write!(f, "connection failed: {msg}"),
            TransportFailure::Timeout => write!(f, "timed out waiting for a response"),
            TransportFailure::Invalid(msg) => write!(f, "invalid request: {msg}"),
            TransportFailure::Body { status, message } => {
                write!(f, "failed to read body of {status} response: {message}")
            }
        }
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotent_methods() {
        for method in [
            HttpMethod::Get,
            HttpMethod::Head,
            HttpMethod::Put,
            HttpMethod::Delete,
            HttpMethod::Options,
        ] {
            assert!(method.is_idempotent(), "{method} should be idempotent");
        }
        assert!(!HttpMethod::Post.is_idempotent());
        assert!(!HttpMethod::Patch.is_idempotent());
    }

    #[test]
    fn set_header_replaces_case_insensitively() {
        let mut req = HttpRequest {
            method: HttpMethod::Get,
            url: "http://localhost/api/plan/1".to_string(),
            path: "/plan/1".to_string(),
            headers: vec![("Authorization".to_string(), "Bearer old".to_string())],
            body: None,
        };
        req.set_header("authorization", "Bearer new");
        assert_eq!(req.headers.len(), 1);
        assert_eq!(req.header("AUTHORIZATION"), Some("Bearer new"));
    }

    #[test]
    fn success_range() {
        let mut resp = HttpResponse {
            status: 204,
            headers: Vec::new(),
            body: String::new(),
        };
        assert!(resp.is_success());
        resp.status = 302;
        assert!(!resp.is_success());
    }
}
