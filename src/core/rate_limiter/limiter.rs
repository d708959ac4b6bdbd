//! Core rate limiter implementation

use super::types::{BucketSnapshot, RateLimitResult, TokenBucket};
use crate::config::models::BucketPolicy;
use crate::core::traffic_control::clock::SharedClock;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// Token bucket rate limiter keyed by scope
#[derive(Debug)]
pub struct RateLimiter {
    /// Buckets by scope, each behind its own lock
    buckets: DashMap<String, Arc<Mutex<TokenBucket>>>,
    clock: SharedClock,
}

impl RateLimiter {
    /// Create a new rate limiter
    pub fn new(clock: SharedClock) -> Self {
        Self {
            buckets: DashMap::new(),
            clock,
        }
    }

    /// Consume one token from the scope's bucket if available
    pub fn allow(&self, scope: &str, policy: &BucketPolicy) -> bool {
        self.check(scope, policy).allowed
    }

    /// Like [`allow`](Self::allow) but reports remaining tokens and the wait on rejection
    pub fn check(&self, scope: &str, policy: &BucketPolicy) -> RateLimitResult {
        let bucket = self.bucket(scope, policy);
        let now = self.clock.now();
        let result = bucket.lock().try_acquire(policy, now);

        if !result.allowed {
            debug!(
                scope = scope,
                capacity = policy.capacity,
                retry_after_ms = result.retry_after.map(|d| d.as_millis() as u64),
                "Rate limit exceeded"
            );
        }

        result
    }

    /// Refill the scope's bucket to full capacity
    ///
    /// Returns `false` when the scope has never been seen.
    pub fn reset(&self, scope: &str) -> bool {
        let Some(bucket) = self.buckets.get(scope).map(|b| b.value().clone()) else {
            return false;
        };
        bucket.lock().reset(self.clock.now());
        true
    }

    /// Read-only view of a bucket, `None` for unknown scopes
    pub fn snapshot(&self, scope: &str) -> Option<BucketSnapshot> {
        let bucket = self.buckets.get(scope).map(|b| b.value().clone())?;
        let now = self.clock.now();
        let snapshot = bucket.lock().snapshot(now);
        Some(snapshot)
    }

    /// Drop buckets that have refilled to capacity and whose key passes `include`
    ///
    /// A full bucket is recreated identically on its next check, so dropping it never
    /// changes a decision. Buckets currently handed out to a check are kept. Returns the
    /// number of buckets removed.
    pub fn evict_full<F>(&self, include: F) -> usize
    where
        F: Fn(&str) -> bool,
    {
        let now = self.clock.now();
        let mut removed = 0;
        self.buckets.retain(|key, bucket| {
            let keep =
                !include(key) || Arc::strong_count(bucket) > 1 || !bucket.lock().is_full_at(now);
            if !keep {
                removed += 1;
            }
            keep
        });
        if removed > 0 {
            debug!(removed = removed, remaining = self.buckets.len(), "Evicted full buckets");
        }
        removed
    }

    /// Number of tracked buckets
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Whether no bucket has been created yet
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    fn bucket(&self, scope: &str, policy: &BucketPolicy) -> Arc<Mutex<TokenBucket>> {
        // Clone the handle out so the map shard is released before the bucket is locked.
        if let Some(bucket) = self.buckets.get(scope) {
            return bucket.value().clone();
        }
        self.buckets
            .entry(scope.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(TokenBucket::full(policy, self.clock.now()))))
            .value()
            .clone()
    }
}
