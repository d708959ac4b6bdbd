//! Rate limiter types and data structures

use crate::config::models::BucketPolicy;
use serde::Serialize;
use std::time::{Duration, Instant};

/// Rate limit result
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitResult {
    /// Whether the request is allowed
    pub allowed: bool,
    /// Bucket capacity
    pub limit: u32,
    /// Whole tokens left after this check
    pub remaining: u32,
    /// Time until one token is available (only set when not allowed)
    pub retry_after: Option<Duration>,
}

/// Token bucket state for one scope
///
/// Invariant: `0 <= tokens <= capacity`.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: f64,
    refill_per_sec: f64,
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// A full bucket for the given policy
    pub fn full(policy: &BucketPolicy, now: Instant) -> Self {
        let capacity = f64::from(policy.capacity);
        Self {
            capacity,
            refill_per_sec: policy.refill_per_sec,
            tokens: capacity,
            last_refill: now,
        }
    }

    /// Adopt a changed policy, clamping stored tokens to the new capacity
    pub(super) fn apply_policy(&mut self, policy: &BucketPolicy) {
        let capacity = f64::from(policy.capacity);
        if capacity != self.capacity {
            self.capacity = capacity;
            self.tokens = self.tokens.min(capacity);
        }
        self.refill_per_sec = policy.refill_per_sec;
    }

    /// Add tokens accrued since the last refill
    pub(super) fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        if elapsed > 0.0 {
            self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
            self.last_refill = now;
        }
    }

    /// Refill, then take one token if available
    pub(super) fn try_acquire(&mut self, policy: &BucketPolicy, now: Instant) -> RateLimitResult {
        self.apply_policy(policy);
        self.refill(now);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            RateLimitResult {
                allowed: true,
                limit: policy.capacity,
                remaining: self.tokens.floor() as u32,
                retry_after: None,
            }
        } else {
            RateLimitResult {
                allowed: false,
                limit: policy.capacity,
                remaining: 0,
                retry_after: Some(self.time_to_next_token()),
            }
        }
    }

    /// `(1 - tokens) / refill_rate`
    pub fn time_to_next_token(&self) -> Duration {
        if self.tokens >= 1.0 {
            return Duration::ZERO;
        }
        Duration::try_from_secs_f64((1.0 - self.tokens) / self.refill_per_sec)
            .unwrap_or(Duration::MAX)
    }

    /// Tokens currently stored
    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    /// Bucket capacity
    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Whether the bucket would be at capacity after refilling to `now`
    ///
    /// Such a bucket is indistinguishable from a freshly created one.
    pub(super) fn is_full_at(&self, now: Instant) -> bool {
        let mut view = self.clone();
        view.refill(now);
        view.tokens >= view.capacity
    }

    /// Refill back to full
    pub(super) fn reset(&mut self, now: Instant) {
        self.tokens = self.capacity;
        self.last_refill = now;
    }

    pub(super) fn snapshot(&self, now: Instant) -> BucketSnapshot {
        let mut view = self.clone();
        view.refill(now);
        BucketSnapshot {
            capacity: view.capacity as u32,
            tokens_remaining: view.tokens,
            refill_per_sec: view.refill_per_sec,
            retry_after_ms: (view.tokens < 1.0)
                .then(|| view.time_to_next_token().as_millis() as u64),
        }
    }
}

/// Read-only view of a bucket
#[derive(Debug, Clone, Serialize)]
pub struct BucketSnapshot {
    /// Bucket capacity
    pub capacity: u32,
    /// Tokens available right now
    pub tokens_remaining: f64,
    /// Tokens added per second
    pub refill_per_sec: f64,
    /// Wait until the next token, when the bucket is empty
    pub retry_after_ms: Option<u64>,
}
