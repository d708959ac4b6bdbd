//! Traffic controller facade
//!
//! Composes the anti-loop guard, the per-scope circuit breakers and the token-bucket
//! limiter. Outbound checks run the gates in that order and the first rejection wins.

use super::anti_loop::{AntiLoopGuard, AntiLoopSnapshot};
use super::clock::{SharedClock, SystemClock};
use super::metrics::{ScopeMetrics, ScopeMetricsSnapshot};
use super::types::{Decision, Direction, INBOUND_BUCKET_PREFIX, InboundKey};
use crate::config::models::TrafficControlConfig;
use crate::config::validation::Validate;
use crate::core::rate_limiter::RateLimiter;
use crate::utils::error::recovery::{Admission, CircuitBreaker, CircuitState, RetryPolicy};
use crate::utils::error::{GatewayError, Result};
use crate::utils::logging::decision_log::{DecisionEvent, DecisionLogger};
use arc_swap::ArcSwap;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Process-wide traffic controller
///
/// Construct once at startup and share as `Arc<TrafficController>`.
#[derive(Debug)]
pub struct TrafficController {
    config: ArcSwap<TrafficControlConfig>,
    clock: SharedClock,
    started_at: Instant,
    limiter: RateLimiter,
    breaker: CircuitBreaker,
    anti_loop: AntiLoopGuard,
    metrics: DashMap<String, Arc<ScopeMetrics>>,
    decision_log: Option<DecisionLogger>,
}

/// Controller-wide status
#[derive(Debug, Clone, Serialize)]
pub struct TrafficStatus {
    pub degraded: bool,
    pub anti_loop: AntiLoopSnapshot,
    pub active_scopes: Vec<String>,
    pub circuit_breakers: BTreeMap<String, CircuitState>,
    pub open_circuits: usize,
    pub tracked_buckets: usize,
    pub decision_log_enabled: bool,
    pub decision_log_dropped: u64,
    pub uptime_secs: u64,
}

impl TrafficController {
    /// Create a controller on the system clock
    pub fn new(config: TrafficControlConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a controller on an explicit clock
    pub fn with_clock(config: TrafficControlConfig, clock: SharedClock) -> Result<Self> {
        config.validate().map_err(GatewayError::Config)?;

        let decision_log = if config.logging.enabled {
            Some(DecisionLogger::start(&config.logging)?)
        } else {
            None
        };

        info!(
            outbound_capacity = config.outbound.default.capacity,
            inbound_capacity = config.inbound.default.capacity,
            failure_threshold = config.circuit_breaker.failure_threshold,
            anti_loop_cap = config.anti_loop.hard_cap,
            decision_log = decision_log.is_some(),
            "Traffic controller initialized"
        );

        Ok(Self {
            started_at: clock.now(),
            limiter: RateLimiter::new(clock.clone()),
            breaker: CircuitBreaker::new(clock.clone()),
            anti_loop: AntiLoopGuard::new(clock.clone()),
            config: ArcSwap::from_pointee(config),
            clock,
            metrics: DashMap::new(),
            decision_log,
        })
    }

    /// Gate an outbound call on `scope`: anti-loop guard, then breaker, then bucket
    pub fn check_outbound_request(&self, scope: &str) -> Decision {
        let config = self.config.load();

        let decision = if let Some(retry_after) = self.anti_loop.admit(scope, &config.anti_loop) {
            Decision::Degraded { retry_after }
        } else {
            match self.breaker.acquire(scope, &config.circuit_breaker) {
                Err(retry_after) => Decision::CircuitOpen { retry_after },
                Ok(admission) => {
                    let policy = config.outbound.policy_for(scope);
                    let result = self.limiter.check(scope, &policy);
                    match (result.allowed, admission) {
                        (true, Admission::Normal) => Decision::Allowed,
                        (true, Admission::Probe(id)) => Decision::Probe { id },
                        (false, admission) => {
                            if admission != Admission::Normal {
                                self.breaker.release_probe(scope);
                            }
                            Decision::RateLimited {
                                retry_after: result.retry_after.unwrap_or_default(),
                            }
                        }
                    }
                }
            }
        };

        self.scope_counters(scope).record_decision(&decision);
        if !decision.is_allowed() {
            debug!(scope = scope, decision = %decision, "Outbound request blocked");
        }
        self.log_event(|| DecisionEvent::decision(Direction::Outbound, scope, &decision));
        decision
    }

    /// Record the final outcome of an outbound call admitted as [`Decision::Allowed`]
    ///
    /// A call admitted as [`Decision::Probe`] must report through
    /// [`record_outbound_outcome`](Self::record_outbound_outcome) instead, otherwise the
    /// breaker keeps waiting for its probe.
    pub fn record_outbound_response(&self, scope: &str, success: bool, latency: Duration) {
        self.record_outbound_outcome(scope, Decision::Allowed, success, latency);
    }

    /// Record the final outcome of an outbound call, given the decision that admitted it
    pub fn record_outbound_outcome(
        &self,
        scope: &str,
        admitted_as: Decision,
        success: bool,
        latency: Duration,
    ) {
        let admission = match admitted_as {
            Decision::Probe { id } => Admission::Probe(id),
            _ => Admission::Normal,
        };
        let config = self.config.load();
        self.breaker
            .record_outcome(scope, admission, success, &config.circuit_breaker);
        self.scope_counters(scope).record_outcome(success, latency);
        self.log_event(|| DecisionEvent::outcome(scope, success, latency));
    }

    /// Count one upstream attempt by HTTP status
    pub fn record_status(&self, scope: &str, status: u16) {
        self.scope_counters(scope).record_status(status);
    }

    /// Count an attempt that failed without a response
    pub fn record_transport_error(&self, scope: &str) {
        self.scope_counters(scope).record_transport_error();
    }

    /// Count a retry on `scope`
    pub fn record_retry(&self, scope: &str) {
        self.scope_counters(scope).record_retry();
    }

    /// Gate an inbound request
    ///
    /// The bucket is keyed by endpoint group and the first present identifier
    /// (actor, then session, then client IP).
    pub fn check_inbound_request(
        &self,
        endpoint_group: &str,
        actor_id: Option<&str>,
        session_id: Option<&str>,
        client_ip: Option<&str>,
    ) -> Decision {
        let key = InboundKey::resolve(endpoint_group, actor_id, session_id, client_ip);
        self.check_inbound_key(&key)
    }

    /// Gate an inbound request for an already resolved key
    pub fn check_inbound_key(&self, key: &InboundKey) -> Decision {
        let config = self.config.load();
        let policy = config.inbound.policy_for(&key.group);
        let result = self.limiter.check(&key.bucket_key(), &policy);

        let decision = if result.allowed {
            Decision::Allowed
        } else {
            Decision::RateLimited {
                retry_after: result.retry_after.unwrap_or_default(),
            }
        };

        let scope = key.group_scope();
        self.scope_counters(&scope).record_decision(&decision);
        if !decision.is_allowed() {
            debug!(
                group = %key.group,
                identifier = key.identity.kind(),
                decision = %decision,
                "Inbound request throttled"
            );
        }
        self.log_event(|| {
            DecisionEvent::decision(Direction::Inbound, &scope, &decision)
                .with_identifier_kind(key.identity.kind())
        });
        decision
    }

    /// Retry policy for the current configuration
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from_config(&self.config.load().retry)
    }

    /// Current configuration snapshot
    pub fn config(&self) -> Arc<TrafficControlConfig> {
        self.config.load_full()
    }

    /// Validate and atomically install a new configuration
    ///
    /// Buckets adopt changed capacities on their next check. Decision-log settings
    /// are fixed at construction.
    pub fn update_config(&self, config: TrafficControlConfig) -> Result<()> {
        config.validate().map_err(GatewayError::Validation)?;
        info!(
            outbound_scopes = config.outbound.scopes.len(),
            inbound_groups = config.inbound.groups.len(),
            "Installing new traffic control configuration"
        );
        self.config.store(Arc::new(config));
        Ok(())
    }

    /// Controller-wide status
    pub fn status(&self) -> TrafficStatus {
        let config = self.config.load();
        let anti_loop = self.anti_loop.snapshot(&config.anti_loop);

        let mut active_scopes: Vec<String> = self.metrics.iter().map(|e| e.key().clone()).collect();
        active_scopes.sort();

        let circuit_breakers: BTreeMap<String, CircuitState> = self
            .breaker
            .scopes()
            .into_iter()
            .map(|scope| {
                let state = self.breaker.state(&scope);
                (scope, state)
            })
            .collect();
        let open_circuits = circuit_breakers
            .values()
            .filter(|state| **state != CircuitState::Closed)
            .count();

        TrafficStatus {
            degraded: anti_loop.degraded,
            anti_loop,
            active_scopes,
            circuit_breakers,
            open_circuits,
            tracked_buckets: self.limiter.len(),
            decision_log_enabled: self.decision_log.is_some(),
            decision_log_dropped: self.decision_log.as_ref().map_or(0, DecisionLogger::dropped),
            uptime_secs: self
                .clock
                .now()
                .saturating_duration_since(self.started_at)
                .as_secs(),
        }
    }

    /// Metrics for one scope, `None` if the scope has never been seen
    pub fn scope_metrics(&self, scope: &str) -> Option<ScopeMetricsSnapshot> {
        let counters = self.metrics.get(scope).map(|m| m.value().clone())?;
        let mut snapshot = counters.snapshot(scope);
        snapshot.circuit_breaker = self.breaker.snapshot(scope);
        snapshot.bucket = self.limiter.snapshot(scope);
        Some(snapshot)
    }

    /// Breaker state for a scope
    pub fn circuit_state(&self, scope: &str) -> CircuitState {
        self.breaker.state(scope)
    }

    /// Whether the anti-loop guard is in degraded mode
    pub fn is_degraded(&self) -> bool {
        self.anti_loop.is_degraded(&self.config.load().anti_loop)
    }

    /// Refill the bucket and close the breaker for `scope`
    pub fn reset_scope(&self, scope: &str) -> bool {
        let bucket = self.limiter.reset(scope);
        let breaker = self.breaker.reset(scope);
        if bucket || breaker {
            info!(scope = scope, "Traffic control scope reset");
        }
        bucket || breaker
    }

    /// Leave degraded mode immediately
    pub fn reset_anti_loop(&self) {
        self.anti_loop.reset();
        info!("Anti-loop guard reset");
    }

    /// Forget inbound callers whose bucket has refilled to capacity
    ///
    /// Outbound scopes are bounded by configuration and keep their buckets for the
    /// metrics endpoint.
    pub fn evict_idle_buckets(&self) -> usize {
        let removed = self
            .limiter
            .evict_full(|key| key.starts_with(INBOUND_BUCKET_PREFIX));
        if removed > 0 {
            debug!(
                removed = removed,
                tracked = self.limiter.len(),
                "Evicted idle inbound buckets"
            );
        }
        removed
    }

    /// Start background eviction of idle inbound buckets
    pub fn start_cleanup_task(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                self.evict_idle_buckets();
            }
        })
    }

    fn scope_counters(&self, scope: &str) -> Arc<ScopeMetrics> {
        if let Some(metrics) = self.metrics.get(scope) {
            return metrics.value().clone();
        }
        self.metrics
            .entry(scope.to_string())
            .or_default()
            .value()
            .clone()
    }

    fn log_event<F: FnOnce() -> DecisionEvent>(&self, event: F) {
        if let Some(logger) = &self.decision_log {
            logger.log(event());
        }
    }
}
