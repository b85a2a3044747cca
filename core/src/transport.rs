//! Physical I/O seams: executing one attempt, and waiting between attempts.
//!
//! # Design
//! The client core never talks to the network directly. A [`Transport`]
//! executes a single physical attempt and reports either a response (of any
//! status) or a [`TransportFailure`] when nothing came back. Status handling
//! stays in the inbound stage, so every transport behaves identically from
//! the retry policy's point of view.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::http::{HttpMethod, HttpRequest, HttpResponse, TransportFailure};

/// Origin used to resolve a relative base URL such as `/api`.
pub const DEFAULT_ORIGIN: &str = "http://127.0.0.1:8000";

/// Executes one physical HTTP attempt.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportFailure>;
}

/// Waits out a backoff delay.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, delay: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

/// [`Transport`] backed by a pooled `reqwest` client.
///
/// The per-attempt timeout is enforced by the caller, not here, so a single
/// client can serve configurations with different timeouts.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    origin: String,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = Client::builder().pool_max_idle_per_host(10).build()?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            origin: DEFAULT_ORIGIN.to_string(),
        }
    }

    /// Origin prepended to relative request URLs.
    pub fn with_origin(mut self, origin: &str) -> Self {
        self.origin = origin.trim_end_matches('/').to_string();
        self
    }

    fn resolve(&self, url: &str) -> String {
        if url.starts_with('/') {
            format!("{}{url}", self.origin)
        } else {
            url.to_string()
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportFailure> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Options => reqwest::Method::OPTIONS,
        };

        let mut builder = self.client.request(method, self.resolve(&request.url));
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_builder() {
                TransportFailure::Invalid(e.to_string())
            } else if e.is_timeout() {
                TransportFailure::Timeout
            } else {
                TransportFailure::Connect(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();
        let body = response
            .text()
            .await
            .map_err(|e| TransportFailure::Body {
                status,
                message: e.to_string(),
            })?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
