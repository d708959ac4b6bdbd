use super::types::HttpClientConfig;
use crate::utils::error::{GatewayError, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};
use std::time::Duration;

/// Longest upstream error body kept in error messages
const MAX_ERROR_BODY: usize = 512;

/// Utility functions for HTTP client operations
pub struct ClientUtils;

impl ClientUtils {
    /// Creates an async HTTP client with the specified configuration
    pub fn create_http_client(config: &HttpClientConfig) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .default_headers(Self::default_headers(config)?);

        if let Some(proxy_url) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| GatewayError::Config(format!("Invalid proxy configuration: {}", e)))?;
            builder = builder.proxy(proxy);
        }

        builder
            .build()
            .map_err(|e| GatewayError::Config(format!("Failed to build HTTP client: {}", e)))
    }

    /// Creates a blocking HTTP client with the specified configuration
    pub fn create_blocking_client(config: &HttpClientConfig) -> Result<reqwest::blocking::Client> {
        let mut builder = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .default_headers(Self::default_headers(config)?);

        if let Some(proxy_url) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| GatewayError::Config(format!("Invalid proxy configuration: {}", e)))?;
            builder = builder.proxy(proxy);
        }

        builder
            .build()
            .map_err(|e| GatewayError::Config(format!("Failed to build HTTP client: {}", e)))
    }

    fn default_headers(config: &HttpClientConfig) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        for (key, value) in &config.default_headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| GatewayError::Config(format!("Invalid header name '{}': {}", key, e)))?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                GatewayError::Config(format!("Invalid header value for '{}': {}", key, e))
            })?;
            headers.insert(name, value);
        }
        Ok(headers)
    }

    /// Whether a status is worth retrying: 408, 429 and every 5xx
    pub fn is_retryable_status(status: u16) -> bool {
        matches!(status, 408 | 429 | 500..=599)
    }

    /// Whether a status counts as a successful call (2xx and 3xx)
    pub fn is_success_status(status: u16) -> bool {
        (200..400).contains(&status)
    }

    /// Timeouts and connection-level failures are transient; builder or decode errors are not
    pub fn is_transient_transport(error: &reqwest::Error) -> bool {
        error.is_timeout() || error.is_connect() || error.is_request()
    }

    /// Extracts `Retry-After` (delta seconds) from response headers
    pub fn extract_retry_after(headers: &HeaderMap) -> Option<Duration> {
        headers
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    }

    /// Builds an error message from an upstream body, falling back to the reason phrase
    pub fn error_message(status: reqwest::StatusCode, body: &str) -> String {
        let body = body.trim();
        if body.is_empty() {
            return status
                .canonical_reason()
                .unwrap_or("Unknown status")
                .to_string();
        }
        if body.len() <= MAX_ERROR_BODY {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    }
}
