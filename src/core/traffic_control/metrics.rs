//! Per-scope traffic counters

use super::types::Decision;
use crate::core::rate_limiter::BucketSnapshot;
use crate::utils::error::recovery::CircuitBreakerSnapshot;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Lock-free counters for one scope
#[derive(Debug, Default)]
pub struct ScopeMetrics {
    allowed: AtomicU64,
    rate_limited: AtomicU64,
    circuit_open: AtomicU64,
    degraded: AtomicU64,
    status_2xx: AtomicU64,
    status_3xx: AtomicU64,
    status_4xx: AtomicU64,
    status_429: AtomicU64,
    status_5xx: AtomicU64,
    transport_errors: AtomicU64,
    retries: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    latency_total_us: AtomicU64,
    latency_max_us: AtomicU64,
}

impl ScopeMetrics {
    /// Count a gate decision
    pub fn record_decision(&self, decision: &Decision) {
        let counter = match decision {
            Decision::Allowed | Decision::Probe { .. } => &self.allowed,
            Decision::RateLimited { .. } => &self.rate_limited,
            Decision::CircuitOpen { .. } => &self.circuit_open,
            Decision::Degraded { .. } => &self.degraded,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one upstream attempt by status code
    ///
    /// 429 is tracked on its own and not included in the 4xx counter.
    pub fn record_status(&self, status: u16) {
        let counter = match status {
            429 => &self.status_429,
            200..=299 => &self.status_2xx,
            300..=399 => &self.status_3xx,
            400..=499 => &self.status_4xx,
            _ => &self.status_5xx,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Count an attempt that failed before a status line arrived
    pub fn record_transport_error(&self) {
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a retry
    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the final outcome of one logical call
    pub fn record_outcome(&self, success: bool, latency: Duration) {
        if success {
            self.successes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
        let micros = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);
        self.latency_total_us.fetch_add(micros, Ordering::Relaxed);
        self.latency_max_us.fetch_max(micros, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters
    pub fn snapshot(&self, scope: &str) -> ScopeMetricsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        let completed = load(&self.successes) + load(&self.failures);
        let avg_latency_ms = if completed == 0 {
            0.0
        } else {
            load(&self.latency_total_us) as f64 / completed as f64 / 1000.0
        };

        ScopeMetricsSnapshot {
            scope: scope.to_string(),
            decisions: DecisionCounts {
                allowed: load(&self.allowed),
                rate_limited: load(&self.rate_limited),
                circuit_open: load(&self.circuit_open),
                degraded: load(&self.degraded),
            },
            responses: ResponseCounts {
                status_2xx: load(&self.status_2xx),
                status_3xx: load(&self.status_3xx),
                status_4xx: load(&self.status_4xx),
                status_429: load(&self.status_429),
                status_5xx: load(&self.status_5xx),
                transport_errors: load(&self.transport_errors),
            },
            retries: load(&self.retries),
            successes: load(&self.successes),
            failures: load(&self.failures),
            avg_latency_ms,
            max_latency_ms: load(&self.latency_max_us) as f64 / 1000.0,
            circuit_breaker: None,
            bucket: None,
        }
    }
}

/// Gate decision counters
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct DecisionCounts {
    pub allowed: u64,
    pub rate_limited: u64,
    pub circuit_open: u64,
    pub degraded: u64,
}

impl DecisionCounts {
    /// All rejections
    pub fn blocked(&self) -> u64 {
        self.rate_limited + self.circuit_open + self.degraded
    }
}

/// Upstream response counters (one per attempt)
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ResponseCounts {
    pub status_2xx: u64,
    pub status_3xx: u64,
    pub status_4xx: u64,
    pub status_429: u64,
    pub status_5xx: u64,
    pub transport_errors: u64,
}

/// Metrics for one scope as served by the metrics endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ScopeMetricsSnapshot {
    pub scope: String,
    pub decisions: DecisionCounts,
    pub responses: ResponseCounts,
    pub retries: u64,
    pub successes: u64,
    pub failures: u64,
    pub avg_latency_ms: f64,
    pub max_latency_ms: f64,
    /// Breaker state, for outbound scopes that have one
    pub circuit_breaker: Option<CircuitBreakerSnapshot>,
    /// Bucket state, for outbound scopes that have one
    pub bucket: Option<BucketSnapshot>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_buckets() {
        let metrics = ScopeMetrics::default();
        for status in [200, 204, 302, 404, 429, 429, 500, 503] {
            metrics.record_status(status);
        }

        let snapshot = metrics.snapshot("github:get");
        assert_eq!(snapshot.responses.status_2xx, 2);
        assert_eq!(snapshot.responses.status_3xx, 1);
        assert_eq!(snapshot.responses.status_4xx, 1);
        assert_eq!(snapshot.responses.status_429, 2);
        assert_eq!(snapshot.responses.status_5xx, 2);
    }

    #[test]
    fn test_decision_counts() {
        let metrics = ScopeMetrics::default();
        metrics.record_decision(&Decision::Allowed);
        metrics.record_decision(&Decision::RateLimited {
            retry_after: Duration::from_secs(1),
        });
        metrics.record_decision(&Decision::Degraded {
            retry_after: Duration::from_secs(1),
        });

        let decisions = metrics.snapshot("s").decisions;
        assert_eq!(decisions.allowed, 1);
        assert_eq!(decisions.blocked(), 2);
    }

    #[test]
    fn test_latency_aggregation() {
        let metrics = ScopeMetrics::default();
        metrics.record_outcome(true, Duration::from_millis(10));
        metrics.record_outcome(false, Duration::from_millis(30));

        let snapshot = metrics.snapshot("s");
        assert_eq!(snapshot.successes, 1);
        assert_eq!(snapshot.failures, 1);
        assert!((snapshot.avg_latency_ms - 20.0).abs() < 1e-9);
        assert!((snapshot.max_latency_ms - 30.0).abs() < 1e-9);
    }
}
