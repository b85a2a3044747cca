//! Error types for the itinerary client.
//!
//! # Design
//! Every failure that reaches a caller is an [`ApiError`]: raw transport
//! exceptions never escape the client. The variants mirror the classification
//! the retry policy and UI code care about. "Server unreachable" and "server
//! returned malformed data" are distinct variants so callers can tell them
//! apart without inspecting messages.

use std::fmt;

use thiserror::Error;

use crate::http::{HttpMethod, TransportFailure};

/// Classification tag of an [`ApiError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NetworkError,
    ServerUnavailable,
    ClientError,
    ServerError,
    DecodeError,
    ProtocolError,
    Rejected,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::NetworkError => "NetworkError",
            ErrorKind::ServerUnavailable => "ServerUnavailable",
            ErrorKind::ClientError => "ClientError",
            ErrorKind::ServerError => "ServerError",
            ErrorKind::DecodeError => "DecodeError",
            ErrorKind::ProtocolError => "ProtocolError",
            ErrorKind::Rejected => "Rejected",
        };
        f.write_str(name)
    }
}

/// Classified error returned by every client operation.
#[derive(Error, Debug)]
pub enum ApiError {
    /// No response was received: DNS, refused connection, timeout.
    #[error("network error: {message}")]
    Network { message: String },

    /// The server answered 503.
    #[error("service unavailable: {message}")]
    ServerUnavailable { message: String },

    /// The server answered 4xx.
    #[error("client error {status}: {message}")]
    Client { status: u16, message: String },

    /// The server answered 5xx other than 503.
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },

    /// A 2xx body that does not match the itinerary schema.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// The response envelope contradicts itself, or the status is outside
    /// the ranges the client understands.
    #[error("protocol error: {message}")]
    Protocol { message: String },

    /// The server answered `status` but the body was cut off. The request
    /// reached the server, so replaying it is only safe for idempotent methods.
    #[error("incomplete {status} response: {message}")]
    Truncated { status: u16, message: String },

    /// The request was refused locally before dispatch.
    #[error("request rejected: {message}")]
    Rejected { message: String },
}

/// Reasons a received body fails schema validation.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The body is not JSON, or a required field is missing or mistyped.
    #[error("malformed body: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A field is present and well-typed but violates a value constraint.
    #[error("invalid {field}: {reason}")]
    Invalid { field: String, reason: String },

    /// The budget total does not match the sum of its subtotals.
    #[error("budget total {total} does not match subtotal sum {subtotal}")]
    BudgetMismatch { total: f64, subtotal: f64 },

    /// Day plans are not numbered 0, 1, 2, ... in order.
    #[error("day plan at position {position} has day_index {found}")]
    DayIndex { position: usize, found: u32 },
}

impl DecodeError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Configuration errors raised while resolving [`ClientConfig`](crate::ClientConfig).
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("base URL must not be empty")]
    EmptyBaseUrl,

    #[error("invalid timeout {value:?}: expected a positive number of milliseconds")]
    InvalidTimeout { value: String },

    #[error("invalid base URL {value:?}: expected a path starting with '/' or an http(s) URL")]
    InvalidBaseUrl { value: String },
}

impl ApiError {
    /// Classify a non-success HTTP status, using `detail` as the message when
    /// the body supplied one.
    pub fn from_status(status: u16, detail: Option<String>) -> Self {
        let message = detail.unwrap_or_else(|| default_status_message(status).to_string());
        match status {
            503 => ApiError::ServerUnavailable { message },
            400..=499 => ApiError::Client { status, message },
            500..=599 => ApiError::Server { status, message },
            _ => ApiError::Protocol {
                message: format!("unexpected status {status}: {message}"),
            },
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        ApiError::Protocol {
            message: message.into(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        ApiError::Rejected {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Network { .. } => ErrorKind::NetworkError,
            ApiError::ServerUnavailable { .. } => ErrorKind::ServerUnavailable,
            ApiError::Client { .. } => ErrorKind::ClientError,
            ApiError::Server { .. } => ErrorKind::ServerError,
            ApiError::Decode(_) => ErrorKind::DecodeError,
            ApiError::Protocol { .. } | ApiError::Truncated { .. } => ErrorKind::ProtocolError,
            ApiError::Rejected { .. } => ErrorKind::Rejected,
        }
    }

    /// HTTP status of the response that produced this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::ServerUnavailable { .. } => Some(503),
            ApiError::Client { status, .. }
            | ApiError::Server { status, .. }
            | ApiError::Truncated { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Human-readable message: the backend's `detail`/`message` when it sent
    /// one, a generic text per status otherwise.
    pub fn message(&self) -> String {
        match self {
            ApiError::Network { message }
            | ApiError::ServerUnavailable { message }
            | ApiError::Client { message, .. }
            | ApiError::Server { message, .. }
            | ApiError::Protocol { message }
            | ApiError::Truncated { message, .. }
            | ApiError::Rejected { message } => message.clone(),
            ApiError::Decode(e) => e.to_string(),
        }
    }

    /// Retry predicate for a failed physical attempt made with `method`.
    ///
    /// Network failures and 503 are always eligible. Any other HTTP error,
    /// including a response whose body was cut off, is eligible only for
    /// idempotent methods. Decode, protocol and local rejections are never
    /// eligible.
    pub fn is_retryable(&self, method: HttpMethod) -> bool {
        match self {
            ApiError::Network { .. } | ApiError::ServerUnavailable { .. } => true,
            ApiError::Client { .. } | ApiError::Server { .. } | ApiError::Truncated { .. } => {
                method.is_idempotent()
            }
            ApiError::Decode(_) | ApiError::Protocol { .. } | ApiError::Rejected { .. } => false,
        }
    }

    /// Text suitable for a user-facing notification.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Network { .. } => {
                "Network connection failed. Please check your network or the backend service."
                    .to_string()
            }
            ApiError::ServerUnavailable { .. } => {
                "The planning service is temporarily unavailable. Please try again shortly."
                    .to_string()
            }
            ApiError::Client { status: 400, message } => format!("Invalid parameters: {message}"),
            ApiError::Client { status: 401, .. } => {
                "Not authorized. Please sign in again.".to_string()
            }
            ApiError::Client { status: 403, .. } => "Access denied.".to_string(),
            ApiError::Client { status: 404, .. } => {
                "The requested resource does not exist.".to_string()
            }
            ApiError::Server { status: 500, message } if message == default_status_message(500) => {
                "Server error: please try again later.".to_string()
            }
            ApiError::Server { status: 500, message } => format!("Server error: {message}"),
            ApiError::Client { status, message } | ApiError::Server { status, message } => {
                format!("Request failed ({status}): {message}")
            }
            ApiError::Decode(_) | ApiError::Protocol { .. } | ApiError::Truncated { .. } => {
                "The server returned data the app could not understand.".to_string()
            }
            ApiError::Rejected { message } => message.clone(),
        }
    }
}

impl From<TransportFailure> for ApiError {
    fn from(failure: TransportFailure) -> Self {
        match failure {
            TransportFailure::Invalid(_) => ApiError::Rejected {
                message: failure.to_string(),
            },
            TransportFailure::Body { status, message } => ApiError::Truncated { status, message },
            TransportFailure::Connect(_) | TransportFailure::Timeout => ApiError::Network {
                message: failure.to_string(),
            },
        }
    }
}

fn default_status_message(status: u16) -> &'static str {
    match status {
        400 => "malformed request",
        401 => "unauthenticated",
        403 => "forbidden",
        404 => "not found",
        500 => "server error",
        503 => "service unavailable",
        400..=499 => "request failed",
        _ => "server error",
    }
}
