//! Synchronous variant of the traffic-controlled client
//!
//! Same gate, retry and recording semantics as the async client; backoff sleeps the
//! calling thread. Must not be used from inside an async runtime.

use super::types::{AttemptError, HttpClientConfig};
use super::utils::ClientUtils;
use crate::core::traffic_control::{TrafficController, outbound_scope};
use crate::utils::error::recovery::RetryPolicy;
use crate::utils::error::{GatewayError, Result};
use reqwest::Method;
use reqwest::blocking::{Body, Client, Request, RequestBuilder, Response};
use reqwest::header::HeaderMap;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Blocking HTTP client bound to one provider
#[derive(Debug, Clone)]
pub struct BlockingTrafficClient {
    provider: String,
    controller: Arc<TrafficController>,
    client: Client,
}

impl BlockingTrafficClient {
    pub fn new(
        provider: impl Into<String>,
        controller: Arc<TrafficController>,
        config: &HttpClientConfig,
    ) -> Result<Self> {
        let client = ClientUtils::create_blocking_client(config)?;
        Ok(Self::with_client(provider, controller, client))
    }

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

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn get(&self, url: &str) -> BlockingTrafficRequest {
        self.request(Method::GET, url)
    }

    pub fn post(&self, url: &str) -> BlockingTrafficRequest {
        self.request(Method::POST, url)
    }

    pub fn put(&self, url: &str) -> BlockingTrafficRequest {
        self.request(Method::PUT, url)
    }

    pub fn delete(&self, url: &str) -> BlockingTrafficRequest {
        self.request(Method::DELETE, url)
    }

    pub fn request(&self, method: Method, url: &str) -> BlockingTrafficRequest {
        BlockingTrafficRequest {
            scope: outbound_scope(&self.provider, method.as_str()),
            controller: self.controller.clone(),
            client: self.client.clone(),
            builder: self.client.request(method, url),
        }
    }
}

/// Blocking request that has not been sent yet
pub struct BlockingTrafficRequest {
    scope: String,
    controller: Arc<TrafficController>,
    client: Client,
    builder: RequestBuilder,
}

impl fmt::Debug for BlockingTrafficRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingTrafficRequest")
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

impl BlockingTrafficRequest {
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

    pub fn json<T: Serialize + ?Sized>(mut self, json: &T) -> Self {
        self.builder = self.builder.json(json);
        self
    }

    pub fn body<T: Into<Body>>(mut self, body: T) -> Self {
        self.builder = self.builder.body(body);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.builder = self.builder.timeout(timeout);
        self
    }

    /// Send the request on the calling thread
    pub fn send(self) -> Result<Response> {
        let request = self.builder.build()?;
        let scope = self.scope;
        let controller = self.controller;
        let client = self.client;

        let decision = controller.check_outbound_request(&scope);
        if !decision.is_allowed() {
            return Err(GatewayError::blocked(scope, decision));
        }

        let policy = if request.try_clone().is_some() {
            controller.retry_policy()
        } else {
            RetryPolicy::new(1, Duration::ZERO, Duration::ZERO, 0.0)
        };

        let started = Instant::now();
        let mut template = Some(request);
        let result = policy.execute_blocking(
            |_| {
                let request = match template.as_ref().and_then(Request::try_clone) {
                    Some(request) => request,
                    None => template.take().ok_or(AttemptError::NotReplayable)?,
                };
                execute_attempt(&client, request, &controller, &scope)
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
        );

        let latency = started.elapsed();
        controller.record_outbound_outcome(&scope, decision, result.is_ok(), latency);
        result.map_err(|error| error.into_gateway_error(&scope))
    }
}

fn execute_attempt(
    client: &Client,
    request: Request,
    controller: &TrafficController,
    scope: &str,
) -> std::result::Result<Response, AttemptError> {
    match client.execute(request) {
        Ok(response) => {
            let status = response.status();
            controller.record_status(scope, status.as_u16());
            if ClientUtils::is_success_status(status.as_u16()) {
                return Ok(response);
            }
            let retry_after = ClientUtils::extract_retry_after(response.headers());
            let body = response.text().unwrap_or_default();
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
