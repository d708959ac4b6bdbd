//! Traffic-controlled HTTP client
//!
//! Every request is scoped `{provider}:{verb}` and goes through the
//! [`TrafficController`] before it leaves the process. A blocked call never reaches
//! the network; an admitted call runs under the retry policy and reports exactly one
//! outcome to the controller, however many attempts it took.

mod blocking;
pub mod types;
pub mod utils;


pub use blocking::{BlockingTrafficClient, BlockingTrafficRequest};
pub use types::{AttemptError, HttpClientConfig};
pub use utils::ClientUtils;

use crate::core::traffic_control::{TrafficController, outbound_scope};
use crate::utils::error::recovery::RetryPolicy;
use crate::utils::error::{GatewayError, Result};
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use reqwest::header::HeaderMap;
use reqwest::{Body, Client, IntoUrl, Method, Request, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Async HTTP client bound to one provider
#[derive(Debug, Clone)]
pub struct TrafficClient {
    provider: String,
    controller: Arc<TrafficController>,
    client: Client,
}

impl TrafficClient {
    /// Create a client for `provider` with its own connection pool
    pub fn new(
        provider: impl Into<String>,
        controller: Arc<TrafficController>,
        config: &HttpClientConfig,
    ) -> Result<Self> {
        let client = ClientUtils::create_http_client(config)?;
        Ok(Self::with_client(provider, controller, client))
    }

    /// Wrap an existing reqwest client
    pub fn with_client(
        provider: impl Into<String>,
        controller: Arc<TrafficController>,
        client: Client,
    ) -> Self {
        Self {
            provider: provider.into(),
            controller,
            client,
        }
    }

    /// Provider name used as the scope prefix
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Shared controller
    pub fn controller(&self) -> &Arc<TrafficController> {
        &self.controller
    }

    pub fn get<U: IntoUrl>(&self, url: U) -> TrafficRequest {
        self.request(Method::GET, url)
    }

    pub fn post<U: IntoUrl>(&self, url: U) -> TrafficRequest {
        self.request(Method::POST, url)
    }

    pub fn put<U: IntoUrl>(&self, url: U) -> TrafficRequest {
        self.request(Method::PUT, url)
    }

    pub fn patch<U: IntoUrl>(&self, url: U) -> TrafficRequest {
        self.request(Method::PATCH, url)
    }

    pub fn delete<U: IntoUrl>(&self, url: U) -> TrafficRequest {
        self.request(Method::DELETE, url)
    }

    pub fn head<U: IntoUrl>(&self, url: U) -> TrafficRequest {
        self.request(Method::HEAD, url)
    }

    /// Start a request with an arbitrary method
    pub fn request<U: IntoUrl>(&self, method: Method, url: U) -> TrafficRequest {
        TrafficRequest {
            scope: outbound_scope(&self.provider, method.as_str()),
            controller: self.controller.clone(),
            client: self.client.clone(),
            builder: self.client.request(method, url),
        }
    }
}

/// A request that has not been sent yet
pub struct TrafficRequest {
    scope: String,
    controller: Arc<TrafficController>,
    client: Client,
    builder: RequestBuilder,
}

impl fmt::Debug for TrafficRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrafficRequest")
            .field("scope", &self.scope)
            .field("builder", &self.builder)
            .finish()
    }
}

impl TrafficRequest {
    /// Traffic-control scope of this request
    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn header(mut self, key: &str, value: &str) -> Self {
        self.builder = self.builder.header(key, value);
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.builder = self.builder.headers(headers);
        self
    }

    pub fn bearer_auth<T: fmt::Display>(mut self, token: T) -> Self {
        self.builder = self.builder.bearer_auth(token);
        self
    }

    pub fn query<T: Serialize + ?Sized>(mut self, query: &T) -> Self {
        self.builder = self.builder.query(query);
        self
    }

    pub fn json<T: Serialize + ?Sized>(mut self, json: &T) -> Self {
        self.builder = self.builder.json(json);
        self
    }

    pub fn body<T: Into<Body>>(mut self, body: T) -> Self {
        self.builder = self.builder.body(body);
        self
    }

    /// Per-attempt timeout; an expired attempt counts as a transient failure
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.builder = self.builder.timeout(timeout);
        self
    }

    /// Send the request, returning once response headers arrive
    ///
    /// Dropping the future abandons the call; a half-open probe abandoned this way is
    /// replaced once it goes stale.
    pub async fn send(self) -> Result<Response> {
        let TrafficRequest {
            scope,
            controller,
            client,
            builder,
        } = self;
        let request = builder.build()?;

        let decision = controller.check_outbound_request(&scope);
        if !decision.is_allowed() {
            return Err(GatewayError::blocked(scope, decision));
        }

        let policy = if request.try_clone().is_some() {
            controller.retry_policy()
        } else {
            debug!(scope = %scope, "Request body is a stream, sending without retries");
            RetryPolicy::new(1, Duration::ZERO, Duration::ZERO, 0.0)
        };

        let started = Instant::now();
        let mut template = Some(request);
        let template = &mut template;
        let client = &client;
        let gate: &TrafficController = &controller;
        let scope_ref = scope.as_str();
        let result = policy
            .execute_with_hook(
                move |_| {
                    let attempt_request = next_attempt(template);
                    async move {
                        let request = attempt_request.ok_or(AttemptError::NotReplayable)?;
                        execute_attempt(client, request, gate, scope_ref).await
                    }
                },
                |attempt, error, delay| {
                    debug!(
                        scope = %scope,
                        attempt = attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Retrying outbound request"
                    );
                    controller.record_retry(&scope);
                },
            )
            .await;

        let latency = started.elapsed();
        match result {
            Ok(response) => {
                controller.record_outbound_outcome(&scope, decision, true, latency);
                Ok(response)
            }
            Err(error) => {
                controller.record_outbound_outcome(&scope, decision, false, latency);
                Err(error.into_gateway_error(&scope))
            }
        }
    }

    /// Send the request and hand back the body as a byte stream
    ///
    /// Retries stop once headers arrive; the outcome is recorded from the status line.
    pub async fn send_streaming(self) -> Result<StreamingResponse> {
        let response = self.send().await?;
        Ok(StreamingResponse::from_response(response))
    }
}

/// Request for the next attempt: a clone while the template is replayable, otherwise the
/// template itself (once)
fn next_attempt(template: &mut Option<Request>) -> Option<Request> {
    match template.as_ref().and_then(Request::try_clone) {
        Some(request) => Some(request),
        None => template.take(),
    }
}

async fn execute_attempt(
    client: &Client,
    request: Request,
    controller: &TrafficController,
    scope: &str,
) -> std::result::Result<Response, AttemptError> {
    match client.execute(request).await {
        Ok(response) => {
            let status = response.status();
            controller.record_status(scope, status.as_u16());
            if ClientUtils::is_success_status(status.as_u16()) {
                return Ok(response);
            }
            let retry_after = ClientUtils::extract_retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            Err(AttemptError::Status {
                status: status.as_u16(),
                retry_after,
                message: ClientUtils::error_message(status, &body),
            })
        }
        Err(error) => {
            controller.record_transport_error(scope);
            Err(AttemptError::Transport(error))
        }
    }
}

/// Successful response whose body is consumed as a stream
pub struct StreamingResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: BoxStream<'static, Result<Bytes>>,
}

impl StreamingResponse {
    fn from_response(response: Response) -> Self {
        Self {
            status: response.status(),
            headers: response.headers().clone(),
            body: response
                .bytes_stream()
                .map(|chunk| chunk.map_err(GatewayError::from))
                .boxed(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Body chunks as they arrive
    pub fn into_stream(self) -> BoxStream<'static, Result<Bytes>> {
        self.body
    }

    /// Drain the stream into one buffer
    pub async fn collect_bytes(self) -> Result<Vec<u8>> {
        let mut body = self.body;
        let mut buffer = Vec::new();
        while let Some(chunk) = body.next().await {
            buffer.extend_from_slice(&chunk?);
        }
        Ok(buffer)
    }
}

impl fmt::Debug for StreamingResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}
