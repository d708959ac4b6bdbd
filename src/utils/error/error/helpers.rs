//! Helper functions for creating and inspecting errors

use super::types::GatewayError;
use crate::core::traffic_control::Decision;
use std::time::Duration;

impl GatewayError {
    pub fn blocked<S: Into<String>>(scope: S, decision: Decision) -> Self {
        Self::TrafficControlBlocked {
            scope: scope.into(),
            decision,
        }
    }

    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Self::NotFound(message.into())
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    pub fn server<S: Into<String>>(message: S) -> Self {
        Self::Server(message.into())
    }

    /// Whether a traffic-control gate produced this error
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::TrafficControlBlocked { .. })
    }

    /// Gate decision behind a blocked error
    pub fn decision(&self) -> Option<&Decision> {
        match self {
            Self::TrafficControlBlocked { decision, .. } => Some(decision),
            _ => None,
        }
    }

    /// Wait suggested by a blocked error
    pub fn retry_after(&self) -> Option<Duration> {
        self.decision().and_then(Decision::retry_after)
    }

    /// Upstream HTTP status, when the error came from a response
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            Self::UpstreamTransient { status, .. } => *status,
            Self::UpstreamPermanent { status, .. } => Some(*status),
            _ => None,
        }
    }
}
