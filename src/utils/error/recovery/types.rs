//! Types for error recovery patterns

use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Circuit is closed, requests flow normally
    #[default]
    Closed,
    /// Circuit is open, requests are rejected
    Open,
    /// Circuit is half-open, a single probe is allowed through
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        })
    }
}

/// Mutable breaker state for one scope
#[derive(Debug, Clone, Default)]
pub(super) struct BreakerState {
    pub(super) state: CircuitState,
    pub(super) consecutive_failures: u32,
    pub(super) opened_at: Option<Instant>,
    /// Current cooldown; grows while probes keep failing
    pub(super) cooldown: Duration,
    pub(super) probe_started: Option<Instant>,
    /// Id of the most recently admitted probe
    pub(super) probe_seq: u64,
    pub(super) trips: u64,
}

/// Read-only view of a breaker
#[derive(Debug, Clone, Serialize)]
pub struct CircuitBreakerSnapshot {
    /// Current state
    pub state: CircuitState,
    /// Failures since the last success
    pub consecutive_failures: u32,
    /// Current cooldown in seconds
    pub cooldown_secs: f64,
    /// Remaining cooldown while open
    pub retry_after_ms: Option<u64>,
    /// Whether a half-open probe is outstanding
    pub probe_in_flight: bool,
    /// Number of times the breaker has opened
    pub trips: u64,
}

/// Errors that know whether retrying can help
pub trait Retryable {
    /// Timeouts, connection failures, 5xx, 408 and 429
    fn is_transient(&self) -> bool;

    /// Server-provided wait (`Retry-After`), if any
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circuit_state_default_is_closed() {
        assert_eq!(CircuitState::default(), CircuitState::Closed);
    }

    #[test]
    fn test_circuit_state_display() {
        assert_eq!(CircuitState::Closed.to_string(), "CLOSED");
        assert_eq!(CircuitState::Open.to_string(), "OPEN");
        assert_eq!(CircuitState::HalfOpen.to_string(), "HALF_OPEN");
    }

    #[test]
    fn test_circuit_state_serialization() {
        assert_eq!(
            serde_json::to_string(&CircuitState::HalfOpen).unwrap(),
            "\"HALF_OPEN\""
        );
    }
}
