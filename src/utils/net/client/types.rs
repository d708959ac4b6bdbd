use crate::utils::error::GatewayError;
use crate::utils::error::recovery::Retryable;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Configuration for HTTP client behavior
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub proxy: Option<String>,
    pub user_agent: String,
    pub default_headers: HashMap<String, String>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
            proxy: None,
            user_agent: concat!("venom-traffic/", env!("CARGO_PKG_VERSION")).to_string(),
            default_headers: HashMap::new(),
        }
    }
}

/// Failure of a single upstream attempt
#[derive(Debug)]
pub enum AttemptError {
    /// Upstream answered with a non-success status
    Status {
        status: u16,
        retry_after: Option<Duration>,
        message: String,
    },
    /// No response (timeout, connection failure, ...)
    Transport(reqwest::Error),
    /// The request body cannot be replayed for another attempt
    NotReplayable,
}

impl AttemptError {
    /// Convert into the error returned to callers of the client
    pub fn into_gateway_error(self, scope: &str) -> GatewayError {
        let transient = self.is_transient();
        match self {
            AttemptError::Status {
                status, message, ..
            } if transient => GatewayError::UpstreamTransient {
                scope: scope.to_string(),
                status: Some(status),
                message,
            },
            AttemptError::Status {
                status, message, ..
            } => GatewayError::UpstreamPermanent {
                scope: scope.to_string(),
                status,
                message,
            },
            AttemptError::Transport(e) if transient => GatewayError::UpstreamTransient {
                scope: scope.to_string(),
                status: None,
                message: e.to_string(),
            },
            AttemptError::Transport(e) => GatewayError::HttpClient(e),
            AttemptError::NotReplayable => GatewayError::Internal(format!(
                "request on {} could not be replayed",
                scope
            )),
        }
    }
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptError::Status {
                status, message, ..
            } => write!(f, "status {}: {}", status, message),
            AttemptError::Transport(e) => write!(f, "transport error: {}", e),
            AttemptError::NotReplayable => f.write_str("request body is not replayable"),
        }
    }
}

impl Retryable for AttemptError {
    fn is_transient(&self) -> bool {
        match self {
            AttemptError::Status { status, .. } => super::utils::ClientUtils::is_retryable_status(*status),
            AttemptError::Transport(e) => super::utils::ClientUtils::is_transient_transport(e),
            AttemptError::NotReplayable => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            AttemptError::Status { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}
