//! Error types

use crate::core::traffic_control::Decision;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Main error type
#[derive(Error, Debug)]
pub enum GatewayError {
    /// A traffic-control gate refused the call before it was sent
    #[error("Traffic control blocked {scope}: {decision}")]
    TrafficControlBlocked { scope: String, decision: Decision },

    /// Upstream kept failing with a retryable error until attempts ran out
    #[error("Upstream transient failure on {scope}: {message}")]
    UpstreamTransient {
        scope: String,
        status: Option<u16>,
        message: String,
    },

    /// Upstream rejected the call with a non-retryable status
    #[error("Upstream rejected request on {scope} (status {status}): {message}")]
    UpstreamPermanent {
        scope: String,
        status: u16,
        message: String,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// HTTP client errors
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    /// Server startup and runtime errors
    #[error("Server error: {0}")]
    Server(String),
}
