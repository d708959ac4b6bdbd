//! Circuit breaker implementation for fault tolerance
//!
//! One breaker per scope. CLOSED counts consecutive failures; reaching the threshold
//! opens the circuit. After the cooldown the next caller becomes the single HALF_OPEN
//! probe: success closes the circuit, failure reopens it with the cooldown doubled
//! (up to the configured maximum).

use super::types::{BreakerState, CircuitBreakerSnapshot, CircuitState};
use crate::config::models::CircuitBreakerConfig;
use crate::core::traffic_control::clock::SharedClock;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How a call got past the breaker
///
/// Hand it back to [`CircuitBreaker::record_outcome`]: while HALF_OPEN only the
/// outcome of the current probe moves the circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Circuit is closed
    Normal,
    /// Caller holds the half-open probe slot with this id
    Probe(u64),
}

/// Circuit breakers keyed by scope
#[derive(Debug)]
pub struct CircuitBreaker {
    breakers: DashMap<String, Arc<Mutex<BreakerState>>>,
    clock: SharedClock,
}

impl CircuitBreaker {
    /// Create a new circuit breaker registry
    pub fn new(clock: SharedClock) -> Self {
        Self {
            breakers: DashMap::new(),
            clock,
        }
    }

    /// Whether a call on `scope` may proceed right now
    ///
    /// An OPEN circuit whose cooldown has elapsed moves to HALF_OPEN and admits the caller
    /// as its probe.
    pub fn is_call_allowed(&self, scope: &str, config: &CircuitBreakerConfig) -> bool {
        self.acquire(scope, config).is_ok()
    }

    /// Admit a call, or return how long the caller should wait
    pub fn acquire(
        &self,
        scope: &str,
        config: &CircuitBreakerConfig,
    ) -> Result<Admission, Duration> {
        let breaker = self.breaker(scope);
        let now = self.clock.now();
        let mut state = breaker.lock();

        match state.state {
            CircuitState::Closed => Ok(Admission::Normal),
            CircuitState::Open => {
                let elapsed = state
                    .opened_at
                    .map(|opened| now.saturating_duration_since(opened))
                    .unwrap_or(state.cooldown);
                if elapsed >= state.cooldown {
                    debug!(scope = scope, "Circuit breaker transitioning from Open to HalfOpen");
                    state.state = CircuitState::HalfOpen;
                    Ok(start_probe(&mut state, now))
                } else {
                    Err(state.cooldown - elapsed)
                }
            }
            CircuitState::HalfOpen => match state.probe_started {
                Some(started) => {
                    let age = now.saturating_duration_since(started);
                    // A probe that never reported back is treated as lost.
                    if age >= config.cooldown() {
                        warn!(scope = scope, "Half-open probe timed out, admitting a new probe");
                        Ok(start_probe(&mut state, now))
                    } else {
                        Err(config.cooldown() - age)
                    }
                }
                None => Ok(start_probe(&mut state, now)),
            },
        }
    }

    /// Hand back a probe slot that was admitted but never used
    pub fn release_probe(&self, scope: &str) {
        if let Some(breaker) = self.existing(scope) {
            let mut state = breaker.lock();
            if state.state == CircuitState::HalfOpen {
                state.probe_started = None;
            }
        }
    }

    /// Record the outcome of a call on `scope` that was admitted as `admission`
    ///
    /// While HALF_OPEN, outcomes of anything but the current probe are dropped: calls
    /// admitted before the circuit opened, and probes that were already replaced.
    pub fn record_outcome(
        &self,
        scope: &str,
        admission: Admission,
        success: bool,
        config: &CircuitBreakerConfig,
    ) {
        let breaker = self.breaker(scope);
        let now = self.clock.now();
        let mut state = breaker.lock();

        if state.state == CircuitState::HalfOpen && admission != Admission::Probe(state.probe_seq) {
            debug!(
                scope = scope,
                success = success,
                "Ignoring outcome of a non-probe call while half-open"
            );
            return;
        }

        match (state.state, success) {
            (CircuitState::Closed, true) => {
                state.consecutive_failures = 0;
            }
            (CircuitState::Closed, false) => {
                state.consecutive_failures = state.consecutive_failures.saturating_add(1);
                if state.consecutive_failures >= config.failure_threshold {
                    warn!(
                        scope = scope,
                        failures = state.consecutive_failures,
                        cooldown_secs = config.cooldown_secs,
                        "Circuit breaker opening"
                    );
                    state.state = CircuitState::Open;
                    state.opened_at = Some(now);
                    state.cooldown = config.cooldown();
                    state.trips += 1;
                }
            }
            (CircuitState::HalfOpen, true) => {
                info!(scope = scope, "Circuit breaker probe succeeded, closing");
                state.state = CircuitState::Closed;
                state.consecutive_failures = 0;
                state.opened_at = None;
                state.probe_started = None;
                state.cooldown = config.cooldown();
            }
            (CircuitState::HalfOpen, false) => {
                let cooldown = state
                    .cooldown
                    .max(config.cooldown())
                    .saturating_mul(2)
                    .min(config.max_cooldown());
                warn!(
                    scope = scope,
                    cooldown_secs = cooldown.as_secs(),
                    "Circuit breaker probe failed, reopening"
                );
                state.state = CircuitState::Open;
                state.consecutive_failures = state.consecutive_failures.saturating_add(1);
                state.opened_at = Some(now);
                state.probe_started = None;
                state.cooldown = cooldown;
                state.trips += 1;
            }
            // Late results from calls admitted before the circuit opened.
            (CircuitState::Open, _) => {}
        }
    }

    /// Remaining cooldown while OPEN
    pub fn retry_after(&self, scope: &str) -> Option<Duration> {
        let breaker = self.existing(scope)?;
        let state = breaker.lock();
        remaining_cooldown(&state, self.clock.now())
    }

    /// Current state, CLOSED for unknown scopes
    pub fn state(&self, scope: &str) -> CircuitState {
        self.existing(scope)
            .map(|b| b.lock().state)
            .unwrap_or_default()
    }

    /// Read-only view of a breaker, `None` for unknown scopes
    pub fn snapshot(&self, scope: &str) -> Option<CircuitBreakerSnapshot> {
        let breaker = self.existing(scope)?;
        let state = breaker.lock();
        Some(CircuitBreakerSnapshot {
            state: state.state,
            consecutive_failures: state.consecutive_failures,
            cooldown_secs: state.cooldown.as_secs_f64(),
            retry_after_ms: remaining_cooldown(&state, self.clock.now())
                .map(|d| d.as_millis() as u64),
            probe_in_flight: state.probe_started.is_some(),
            trips: state.trips,
        })
    }

    /// Force a breaker back to CLOSED
    pub fn reset(&self, scope: &str) -> bool {
        let Some(breaker) = self.existing(scope) else {
            return false;
        };
        let mut state = breaker.lock();
        // Keep probe ids monotonic so an outstanding probe cannot match a later one.
        *state = BreakerState {
            probe_seq: state.probe_seq,
            ..BreakerState::default()
        };
        drop(state);
        debug!(scope = scope, "Circuit breaker reset");
        true
    }

    /// Scopes with a breaker, sorted
    pub fn scopes(&self) -> Vec<String> {
        let mut scopes: Vec<String> = self.breakers.iter().map(|e| e.key().clone()).collect();
        scopes.sort();
        scopes
    }

    fn existing(&self, scope: &str) -> Option<Arc<Mutex<BreakerState>>> {
        self.breakers.get(scope).map(|b| b.value().clone())
    }

    fn breaker(&self, scope: &str) -> Arc<Mutex<BreakerState>> {
        if let Some(breaker) = self.existing(scope) {
            return breaker;
        }
        self.breakers
            .entry(scope.to_string())
            .or_default()
            .value()
            .clone()
    }
}

fn start_probe(state: &mut BreakerState, now: Instant) -> Admission {
    state.probe_seq = state.probe_seq.wrapping_add(1);
    state.probe_started = Some(now);
    Admission::Probe(state.probe_seq)
}

fn remaining_cooldown(state: &BreakerState, now: Instant) -> Option<Duration> {
    if state.state != CircuitState::Open {
        return None;
    }
    let opened = state.opened_at?;
    Some(state.cooldown.saturating_sub(now.saturating_duration_since(opened)))
}
