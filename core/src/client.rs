//! Resilient request execution for the planning backend.
//!
//! # Design
//! `ItineraryClient` holds immutable configuration plus the two I/O seams
//! (transport and sleeper). It keeps no mutable state between calls, so
//! concurrent logical requests are independent and need no locking.
//!
//! One logical request runs as follows:
//! 1. `build_request` turns (method, path, body) into an [`HttpRequest`].
//! 2. Each physical attempt passes through the outbound stage, the transport
//!    (bounded by the configured timeout) and, if a response arrived, the
//!    inbound stage.
//! 3. A failed attempt is retried when [`ApiError::is_retryable`] allows it
//!    and attempts remain, after the backoff delay for that attempt.
//! 4. The last failure is returned as-is. There is no fallback value.
//!
//! Dropping the returned future abandons the request. Callers that outlive a
//! view must still check that a resolved result is not stale before using it.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, TransportFailure};
use crate::intercept::{self, Notifier, OutboundInterceptor};
use crate::transport::{ReqwestTransport, Sleeper, TokioSleeper, Transport};
use crate::types::{Envelope, PhotoEnvelope, TripRequest};

/// Client for the itinerary planning API.
#[derive(Clone)]
pub struct ItineraryClient {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    sleeper: Arc<dyn Sleeper>,
    interceptors: Vec<Arc<dyn OutboundInterceptor>>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl ItineraryClient {
    /// Client over the default reqwest transport.
    pub fn new(config: ClientConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::with_transport(config, Arc::new(ReqwestTransport::new()?)))
    }

    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            transport,
            sleeper: Arc::new(TokioSleeper),
            interceptors: Vec::new(),
            notifier: None,
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Append an outbound interceptor. Interceptors run in insertion order.
    pub fn with_interceptor(mut self, interceptor: Arc<dyn OutboundInterceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn build_request<B: Serialize + ?Sized>(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&B>,
    ) -> Result<HttpRequest, ApiError> {
        let body = body
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| ApiError::rejected(format!("request body could not be serialized: {e}")))?;
        Ok(HttpRequest {
            method,
            url: self.config.url_for(path),
            path: path.to_string(),
            headers: vec![("content-type".to_string(), self.config.content_type.clone())],
            body,
        })
    }

    /// Inbound stage for a response obtained outside the retry loop.
    pub fn parse_response(&self, response: &HttpResponse) -> Result<Value, ApiError> {
        intercept::inbound(response)
    }

    /// Issue one logical request and return the decoded response body.
    pub async fn request<B: Serialize + ?Sized>(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&B>,
    ) -> Result<Value, ApiError> {
        let result = self.dispatch(method, path, body).await;
        self.finish(result)
    }

    pub async fn get(&self, path: &str) -> Result<Value, ApiError> {
        self.request(HttpMethod::Get, path, None::<&()>).await
    }

    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value, ApiError> {
        self.request(HttpMethod::Post, path, Some(body)).await
    }

    /// `GET /plan/{id}`.
    pub async fn fetch_plan(&self, id: u64) -> Result<Envelope, ApiError> {
        let path = format!("/plan/{id}");
        let result = match self.dispatch(HttpMethod::Get, &path, None::<&()>).await {
            Ok(value) => Envelope::from_value(value),
            Err(e) => Err(e),
        };
        self.finish(result)
    }

    /// `POST /plan`. The request is validated before anything is sent.
    pub async fn create_plan(&self, trip: &TripRequest) -> Result<Envelope, ApiError> {
        let result = match trip.validate() {
            Ok(()) => match self.dispatch(HttpMethod::Post, "/plan", Some(trip)).await {
                Ok(value) => Envelope::from_value(value),
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };
        self.finish(result)
    }

    /// `GET /poi/photo?name=`. `None` when the backend has no photo service.
    pub async fn poi_photo(&self, name: &str) -> Result<Option<String>, ApiError> {
        let path = format!("/poi/photo?name={}", urlencoding::encode(name));
        let result = match self.dispatch(HttpMethod::Get, &path, None::<&()>).await {
            Ok(value) => PhotoEnvelope::photo_url_from_value(value),
            Err(e) => Err(e),
        };
        self.finish(result)
    }

    async fn dispatch<B: Serialize + ?Sized>(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&B>,
    ) -> Result<Value, ApiError> {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("request", %request_id, %method, path);

        async {
            let request = self.build_request(method, path, body)?;
            self.with_retry(request, request_id).await
        }
        .instrument(span)
        .await
    }

    async fn with_retry(&self, request: HttpRequest, request_id: Uuid) -> Result<Value, ApiError> {
        let retry = &self.config.retry;
        let mut attempt = 1;

        loop {
            match self.attempt(request.clone(), request_id).await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(attempt, "request succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if attempt < retry.max_attempts() && e.is_retryable(request.method) => {
                    let delay = retry.delay_for_attempt(attempt);
                    tracing::warn!(
                        attempt,
                        max_attempts = retry.max_attempts(),
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "attempt failed, retrying"
                    );
                    self.sleeper.sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn attempt(&self, request: HttpRequest, request_id: Uuid) -> Result<Value, ApiError> {
        let request = intercept::outbound(request, request_id, &self.interceptors)?;

        let response =
            match tokio::time::timeout(self.config.timeout, self.transport.execute(&request)).await {
                Ok(Ok(response)) => response,
                Ok(Err(failure)) => return Err(failure.into()),
                Err(_) => return Err(TransportFailure::Timeout.into()),
            };

        intercept::inbound(&response)
    }

    fn finish<T>(&self, result: Result<T, ApiError>) -> Result<T, ApiError> {
        if let Err(e) = &result {
            tracing::error!(kind = %e.kind(), status = ?e.status(), error = %e, "request failed");
            if let Some(notifier) = &self.notifier {
                notifier.notify(e);
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::retry::RetryConfig;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::time::Duration;

    /// Replays a fixed sequence of outcomes and records what it was sent.
    #[derive(Default)]
    struct Scripted {
        outcomes: Mutex<VecDeque<Result<HttpResponse, TransportFailure>>>,
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl Scripted {
        fn new(outcomes: Vec<Result<HttpResponse, TransportFailure>>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.seen.lock().len()
        }
    }

    #[async_trait]
    impl Transport for Scripted {
        async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportFailure> {
            self.seen.lock().push(request.clone());
            self.outcomes
                .lock()
                .pop_front()
                .unwrap_or(Err(TransportFailure::Connect("script exhausted".into())))
        }
    }

    #[derive(Default)]
    struct NoSleep(Mutex<Vec<Duration>>);

    #[async_trait]
    impl Sleeper for NoSleep {
        async fn sleep(&self, delay: Duration) {
            self.0.lock().push(delay);
        }
    }

    #[derive(Default)]
    struct Collect(Mutex<Vec<ErrorKind>>);

    impl Notifier for Collect {
        fn notify(&self, error: &ApiError) {
            self.0.lock().push(error.kind());
        }
    }

    fn ok(body: &str) -> Result<HttpResponse, TransportFailure> {
        Ok(HttpResponse {
            status: 200,
            headers: Vec::new(),
            body: body.to_string(),
        })
    }

    fn status(code: u16) -> Result<HttpResponse, TransportFailure> {
        Ok(HttpResponse {
            status: code,
            headers: Vec::new(),
            body: String::new(),
        })
    }

    fn client(transport: Arc<Scripted>) -> (ItineraryClient, Arc<NoSleep>) {
        let sleeper = Arc::new(NoSleep::default());
        let client = ItineraryClient::with_transport(ClientConfig::new("http://planner"), transport)
            .with_sleeper(sleeper.clone());
        (client, sleeper)
    }

    #[test]
    fn build_request_joins_base_and_sets_content_type() {
        let (client, _) = client(Scripted::new(vec![]));
        let req = client
            .build_request(HttpMethod::Post, "/plan", Some(&serde_json::json!({"city": "Lhasa"})))
            .unwrap();
        assert_eq!(req.url, "http://planner/plan");
        assert_eq!(req.path, "/plan");
        assert_eq!(req.header("content-type"), Some("application/json"));
        assert_eq!(req.body.as_deref(), Some(r#"{"city":"Lhasa"}"#));

        let req = client.build_request(HttpMethod::Get, "/plan/1", None::<&()>).unwrap();
        assert!(req.body.is_none());
    }

    #[tokio::test]
    async fn same_request_id_across_attempts() {
        let transport = Scripted::new(vec![status(503), ok("{}")]);
        let (client, _) = client(transport.clone());
        client.get("/plan/1").await.unwrap();

        let seen = transport.seen.lock();
        assert_eq!(seen.len(), 2);
        let first = seen[0].header("x-request-id").unwrap();
        assert_eq!(seen[1].header("x-request-id"), Some(first));
    }

    #[tokio::test]
    async fn distinct_logical_requests_get_distinct_ids() {
        let transport = Scripted::new(vec![ok("{}"), ok("{}")]);
        let (client, _) = client(transport.clone());
        client.get("/plan/1").await.unwrap();
        client.get("/plan/1").await.unwrap();

        let seen = transport.seen.lock();
        assert_ne!(seen[0].header("x-request-id"), seen[1].header("x-request-id"));
    }

    #[tokio::test]
    async fn decode_failure_is_not_retried() {
        let transport = Scripted::new(vec![ok("not json"), ok("{}")]);
        let (client, sleeper) = client(transport.clone());
        let err = client.get("/plan/1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DecodeError);
        assert_eq!(transport.calls(), 1);
        assert!(sleeper.0.lock().is_empty());
    }

    #[tokio::test]
    async fn retry_none_makes_single_attempt() {
        let transport = Scripted::new(vec![status(503), ok("{}")]);
        let sleeper = Arc::new(NoSleep::default());
        let config = ClientConfig::new("http://planner").with_retry(RetryConfig::none());
        let client =
            ItineraryClient::with_transport(config, transport.clone()).with_sleeper(sleeper);
        let err = client.get("/plan/1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ServerUnavailable);
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn notifier_sees_only_terminal_failure() {
        let transport = Scripted::new(vec![status(503), status(503), status(503)]);
        let notes = Arc::new(Collect::default());
        let (client, _) = client(transport.clone());
        let client = client.with_notifier(notes.clone());

        let err = client.get("/plan/1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ServerUnavailable);
        assert_eq!(transport.calls(), 3);
        assert_eq!(*notes.0.lock(), vec![ErrorKind::ServerUnavailable]);
    }

    #[tokio::test]
    async fn invalid_trip_request_is_rejected_before_dispatch() {
        let transport = Scripted::new(vec![]);
        let (client, _) = client(transport.clone());
        let trip = TripRequest {
            city: "Dali".to_string(),
            start_date: "2025-06-01".parse().unwrap(),
            end_date: "2025-06-02".parse().unwrap(),
            travel_days: 5,
            transportation: "bike".to_string(),
            accommodation: "guesthouse".to_string(),
            preferences: Vec::new(),
            free_text_input: None,
        };
        let err = client.create_plan(&trip).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Rejected);
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn photo_name_is_url_encoded() {
        let transport = Scripted::new(vec![ok(
            r#"{"success":true,"data":{"photo_url":"https://img.example/p.jpg"}}"#,
        )]);
        let (client, _) = client(transport.clone());
        let url = client.poi_photo("West Lake & Su Causeway").await.unwrap();
        assert_eq!(url.as_deref(), Some("https://img.example/p.jpg"));
        assert_eq!(
            transport.seen.lock()[0].url,
            "http://planner/poi/photo?name=West%20Lake%20%26%20Su%20Causeway"
        );
    }

    #[tokio::test]
    async fn slow_transport_times_out_as_network_error() {
        struct Stall;

        #[async_trait]
        impl Transport for Stall {
            async fn execute(&self, _: &HttpRequest) -> Result<HttpResponse, TransportFailure> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Err(TransportFailure::Connect("unreachable".into()))
            }
        }

        let config = ClientConfig::new("http://planner")
            .with_timeout(Duration::from_millis(20))
            .with_retry(RetryConfig::none());
        let client = ItineraryClient::with_transport(config, Arc::new(Stall));
        let err = client.get("/plan/1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NetworkError);
        assert!(err.message().contains("timed out"));
    }
}
