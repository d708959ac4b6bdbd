//! Global anti-loop guard
//!
//! Counts every outbound request in a fixed window. Once the count passes the hard
//! cap the guard enters degraded mode for `degraded_cooldown`: critical scopes keep
//! flowing, everything else shares a small allowance. All state is atomic so the
//! guard never serializes the hot path.

use super::clock::SharedClock;
use crate::config::models::AntiLoopConfig;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Fixed-window request counter with degraded mode
#[derive(Debug)]
pub struct AntiLoopGuard {
    clock: SharedClock,
    epoch: Instant,
    window_start_ns: AtomicU64,
    window_count: AtomicU64,
    /// 0 while not degraded
    degraded_until_ns: AtomicU64,
    degraded_used: AtomicU64,
    trips: AtomicU64,
}

/// Read-only view of the guard
#[derive(Debug, Clone, Serialize)]
pub struct AntiLoopSnapshot {
    /// Whether degraded mode is active
    pub degraded: bool,
    /// Remaining degraded time
    pub degraded_remaining_ms: Option<u64>,
    /// Requests counted in the current window
    pub window_count: u64,
    /// Configured cap per window
    pub hard_cap: u64,
    /// Window length in seconds
    pub window_secs: u64,
    /// How many times degraded mode was entered
    pub trips: u64,
}

impl AntiLoopGuard {
    /// Create a new guard
    pub fn new(clock: SharedClock) -> Self {
        let epoch = clock.now();
        Self {
            clock,
            epoch,
            window_start_ns: AtomicU64::new(0),
            window_count: AtomicU64::new(0),
            degraded_until_ns: AtomicU64::new(0),
            degraded_used: AtomicU64::new(0),
            trips: AtomicU64::new(0),
        }
    }

    /// Count one request in the current window and return the new count
    pub fn record_request(&self, config: &AntiLoopConfig) -> u64 {
        let now = self.now_ns();
        self.roll_window(now, config);
        self.window_count.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Whether the guard is degraded, entering degraded mode if the cap was exceeded
    pub fn is_degraded(&self, config: &AntiLoopConfig) -> bool {
        let now = self.now_ns();
        if self.degraded_remaining_at(now, config).is_some() {
            return true;
        }
        self.roll_window(now, config);
        if self.window_count.load(Ordering::Acquire) > config.hard_cap {
            self.enter_degraded(now, config);
            return true;
        }
        false
    }

    /// Admit or reject an outbound request on `scope`
    ///
    /// Returns the wait for a rejected request. The request that pushes the window
    /// past the cap is itself rejected.
    pub fn admit(&self, scope: &str, config: &AntiLoopConfig) -> Option<Duration> {
        let critical = config.is_critical(scope);
        let now = self.now_ns();

        if let Some(remaining) = self.degraded_remaining_at(now, config) {
            if critical {
                return None;
            }
            let used = self.degraded_used.fetch_add(1, Ordering::AcqRel);
            if used < config.degraded_allowance {
                return None;
            }
            return Some(remaining);
        }

        let count = self.record_request(config);
        if count > config.hard_cap {
            self.enter_degraded(now, config);
            if critical {
                return None;
            }
            return Some(config.degraded_cooldown());
        }
        None
    }

    /// Read-only view
    pub fn snapshot(&self, config: &AntiLoopConfig) -> AntiLoopSnapshot {
        let now = self.now_ns();
        let remaining = self.degraded_remaining_at(now, config);
        let window_expired =
            now.saturating_sub(self.window_start_ns.load(Ordering::Acquire)) >= window_ns(config);
        AntiLoopSnapshot {
            degraded: remaining.is_some(),
            degraded_remaining_ms: remaining.map(|d| d.as_millis() as u64),
            window_count: if window_expired {
                0
            } else {
                self.window_count.load(Ordering::Acquire)
            },
            hard_cap: config.hard_cap,
            window_secs: config.window_secs,
            trips: self.trips.load(Ordering::Relaxed),
        }
    }

    /// Leave degraded mode and clear the window
    pub fn reset(&self) {
        self.degraded_until_ns.store(0, Ordering::Release);
        self.degraded_used.store(0, Ordering::Release);
        self.window_start_ns.store(self.now_ns(), Ordering::Release);
        self.window_count.store(0, Ordering::Release);
    }

    fn now_ns(&self) -> u64 {
        let elapsed = self.clock.now().saturating_duration_since(self.epoch);
        u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX)
    }

    fn roll_window(&self, now: u64, config: &AntiLoopConfig) {
        let start = self.window_start_ns.load(Ordering::Acquire);
        if now.saturating_sub(start) < window_ns(config) {
            return;
        }
        // Read before the swap: anything counted afterwards belongs to the new window.
        let stale = self.window_count.load(Ordering::Acquire);
        if self
            .window_start_ns
            .compare_exchange(start, now, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            let _ = self
                .window_count
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                    Some(count.saturating_sub(stale))
                });
        }
    }

    fn enter_degraded(&self, now: u64, config: &AntiLoopConfig) {
        let until = now.saturating_add(duration_ns(config.degraded_cooldown())).max(1);
        if self
            .degraded_until_ns
            .compare_exchange(0, until, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.degraded_used.store(0, Ordering::Release);
            self.trips.fetch_add(1, Ordering::Relaxed);
            warn!(
                hard_cap = config.hard_cap,
                window_secs = config.window_secs,
                degraded_secs = config.degraded_cooldown_secs,
                "Anti-loop guard tripped, entering degraded mode"
            );
        }
    }

    /// Remaining degraded time, leaving degraded mode once it has expired
    fn degraded_remaining_at(&self, now: u64, config: &AntiLoopConfig) -> Option<Duration> {
        let until = self.degraded_until_ns.load(Ordering::Acquire);
        if until == 0 {
            return None;
        }
        if now < until {
            return Some(Duration::from_nanos(until - now));
        }
        if self
            .degraded_until_ns
            .compare_exchange(until, 0, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.degraded_used.store(0, Ordering::Release);
            self.window_start_ns.store(now, Ordering::Release);
            self.window_count.store(0, Ordering::Release);
            info!(
                window_secs = config.window_secs,
                "Anti-loop guard leaving degraded mode"
            );
        }
        None
    }
}

fn window_ns(config: &AntiLoopConfig) -> u64 {
    duration_ns(config.window())
}

fn duration_ns(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}
