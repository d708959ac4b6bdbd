//! HTTP response handling for errors

use super::types::GatewayError;
use crate::core::traffic_control::Decision;
use actix_web::http::StatusCode;
use actix_web::http::header::RETRY_AFTER;
use actix_web::{HttpResponse, ResponseError};

impl GatewayError {
    fn classify(&self) -> (StatusCode, &'static str, String) {
        match self {
            GatewayError::TrafficControlBlocked { decision, .. } => {
                let code = match decision {
                    Decision::RateLimited { .. } => "RATE_LIMITED",
                    Decision::CircuitOpen { .. } => "CIRCUIT_OPEN",
                    Decision::Degraded { .. } => "DEGRADED",
                    Decision::Allowed | Decision::Probe { .. } => "TRAFFIC_CONTROL",
                };
                (StatusCode::TOO_MANY_REQUESTS, code, self.to_string())
            }
            GatewayError::UpstreamTransient { .. } => {
                (StatusCode::BAD_GATEWAY, "UPSTREAM_UNAVAILABLE", self.to_string())
            }
            GatewayError::UpstreamPermanent { .. } => {
                (StatusCode::FAILED_DEPENDENCY, "UPSTREAM_REJECTED", self.to_string())
            }
            GatewayError::Validation(_) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", self.to_string())
            }
            GatewayError::Yaml(_) | GatewayError::Serialization(_) => {
                (StatusCode::BAD_REQUEST, "PARSING_ERROR", self.to_string())
            }
            GatewayError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", self.to_string()),
            GatewayError::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CONFIG_ERROR",
                self.to_string(),
            ),
            GatewayError::HttpClient(_) => (
                StatusCode::BAD_GATEWAY,
                "HTTP_CLIENT_ERROR",
                "Upstream request failed".to_string(),
            ),
            GatewayError::Io(_) | GatewayError::Internal(_) | GatewayError::Server(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            ),
        }
    }
}

impl ResponseError for GatewayError {
    fn status_code(&self) -> StatusCode {
        self.classify().0
    }

    fn error_response(&self) -> HttpResponse {
        let (status_code, error_code, message) = self.classify();
        let retry_after = self.decision().and_then(Decision::retry_after_secs);

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: error_code.to_string(),
                message,
                timestamp: chrono::Utc::now().timestamp(),
                retry_after,
            },
        };

        let mut builder = HttpResponse::build(status_code);
        if let Some(secs) = retry_after {
            builder.insert_header((RETRY_AFTER, secs.to_string()));
        }
        builder.json(error_response)
    }
}

/// Standard error response format
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

/// Error detail structure
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    pub timestamp: i64,
    /// Seconds to wait, for traffic-control rejections
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}
