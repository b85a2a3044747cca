//! The two interception stages around every physical attempt.
//!
//! # Design
//! Both stages are plain functions over [`HttpRequest`] / [`HttpResponse`]
//! values. Either may short-circuit by returning an [`ApiError`].
//!
//! - Outbound runs before each physical attempt, retries included. It stamps
//!   the logical request id, runs the caller's [`OutboundInterceptor`]s in
//!   order, and emits a diagnostic record of what is about to be sent.
//! - Inbound runs once per received response. A 2xx body is unwrapped to its
//!   JSON value; anything else is classified into an [`ApiError`] whose
//!   message comes from the body's `detail` or `message` field when present.

use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{ApiError, DecodeError};
use crate::http::{HttpRequest, HttpResponse};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// A caller-supplied outbound step, e.g. attaching credentials.
pub trait OutboundInterceptor: Send + Sync {
    fn intercept(&self, request: HttpRequest) -> Result<HttpRequest, ApiError>;
}

/// Observes terminal failures, e.g. to show an error toast.
///
/// Called once per failed logical request, after retries are exhausted. It
/// cannot alter the error returned to the caller.
pub trait Notifier: Send + Sync {
    fn notify(&self, error: &ApiError);
}

/// Session credential attached as `Authorization: Bearer <token>` when set.
#[derive(Debug, Clone, Default)]
pub struct SessionToken {
    token: Arc<RwLock<Option<String>>>,
}

impl SessionToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, token: impl Into<String>) {
        *self.token.write() = Some(token.into());
    }

    pub fn clear(&self) {
        *self.token.write() = None;
    }

    pub fn is_set(&self) -> bool {
        self.token.read().is_some()
    }
}

impl OutboundInterceptor for SessionToken {
    fn intercept(&self, mut request: HttpRequest) -> Result<HttpRequest, ApiError> {
        if let Some(token) = self.token.read().as_ref() {
            request.set_header("authorization", format!("Bearer {token}"));
        }
        Ok(request)
    }
}

/// Outbound stage for one physical attempt.
pub fn outbound(
    mut request: HttpRequest,
    request_id: Uuid,
    interceptors: &[Arc<dyn OutboundInterceptor>],
) -> Result<HttpRequest, ApiError> {
    request.set_header(REQUEST_ID_HEADER, request_id.to_string());

    for interceptor in interceptors {
        request = interceptor.intercept(request)?;
    }

    tracing::debug!(
        method = %request.method,
        path = %request.path,
        body = request.body.as_deref().unwrap_or(""),
        "sending request"
    );
    Ok(request)
}

/// Inbound stage for one received response.
pub fn inbound(response: &HttpResponse) -> Result<Value, ApiError> {
    tracing::debug!(status = response.status, bytes = response.body.len(), "received response");

    if response.is_success() {
        if response.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        return serde_json::from_str(&response.body)
            .map_err(|e| ApiError::Decode(DecodeError::Malformed(e)));
    }

    Err(ApiError::from_status(response.status, extract_detail(&response.body)))
}

/// Pull a human-readable message from an error body's `detail` or `message`.
///
/// Validation errors may carry a structured `detail`; those are rendered as
/// compact JSON rather than dropped.
pub fn extract_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["detail", "message"].iter().find_map(|key| match value.get(*key)? {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    })
}
