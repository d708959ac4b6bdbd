//! Tests for rate limiter

use super::limiter::RateLimiter;
use crate::config::models::BucketPolicy;
use crate::core::traffic_control::clock::{ManualClock, SharedClock};
use std::sync::Arc;
use std::time::Duration;

fn limiter() -> (RateLimiter, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let shared: SharedClock = clock.clone();
    (RateLimiter::new(shared), clock)
}

#[test]
fn test_allows_up_to_capacity() {
    let (limiter, _clock) = limiter();
    let policy = BucketPolicy::new(5, 1.0);

    for i in 0..5 {
        assert!(limiter.allow("github:get", &policy), "request {} should pass", i);
    }
    assert!(!limiter.allow("github:get", &policy));
}

#[test]
fn test_rejection_reports_time_to_next_token() {
    let (limiter, _clock) = limiter();
    let policy = BucketPolicy::new(1, 0.5);

    assert!(limiter.check("openai:post", &policy).allowed);
    let result = limiter.check("openai:post", &policy);
    assert!(!result.allowed);
    assert_eq!(result.remaining, 0);
    assert_eq!(result.retry_after, Some(Duration::from_secs(2)));
}

#[test]
fn test_lazy_refill() {
    let (limiter, clock) = limiter();
    let policy = BucketPolicy::new(2, 1.0);

    assert!(limiter.allow("s", &policy));
    assert!(limiter.allow("s", &policy));
    assert!(!limiter.allow("s", &policy));

    clock.advance(Duration::from_millis(500));
    assert!(!limiter.allow("s", &policy));

    clock.advance(Duration::from_millis(500));
    assert!(limiter.allow("s", &policy));
    assert!(!limiter.allow("s", &policy));
}

#[test]
fn test_refill_is_capped_at_capacity() {
    let (limiter, clock) = limiter();
    let policy = BucketPolicy::new(3, 10.0);

    assert!(limiter.allow("s", &policy));
    clock.advance(Duration::from_secs(3600));

    let snapshot = limiter.snapshot("s").unwrap();
    assert!((snapshot.tokens_remaining - 3.0).abs() < f64::EPSILON);

    let allowed = (0..10).filter(|_| limiter.allow("s", &policy)).count();
    assert_eq!(allowed, 3);
}

#[test]
fn test_token_conservation_over_interval() {
    let (limiter, clock) = limiter();
    let policy = BucketPolicy::new(10, 2.0);

    let mut allowed = 0;
    // 5 simulated seconds at 100 attempts per second
    for _ in 0..500 {
        if limiter.allow("s", &policy) {
            allowed += 1;
        }
        clock.advance(Duration::from_millis(10));
    }

    // capacity + refill * elapsed
    assert!(allowed <= 10 + 10, "allowed {} requests", allowed);
    assert!(allowed >= 18);
}

#[test]
fn test_scopes_are_isolated() {
    let (limiter, _clock) = limiter();
    let policy = BucketPolicy::new(1, 0.01);

    assert!(limiter.allow("github:get", &policy));
    assert!(!limiter.allow("github:get", &policy));
    assert!(limiter.allow("github:post", &policy));
    assert_eq!(limiter.len(), 2);
}

#[test]
fn test_evict_full_drops_only_refilled_buckets() {
    let (limiter, clock) = limiter();
    let policy = BucketPolicy::new(2, 1.0);

    assert!(limiter.allow("idle", &policy));
    assert!(limiter.allow("busy", &policy));
    assert!(limiter.allow("busy", &policy));
    assert_eq!(limiter.evict_full(|_| true), 0);

    clock.advance(Duration::from_secs(1));
    assert_eq!(limiter.evict_full(|_| true), 1);
    assert_eq!(limiter.len(), 1);

    // The drained bucket keeps its state.
    let snapshot = limiter.snapshot("busy").unwrap();
    assert!((snapshot.tokens_remaining - 1.0).abs() < f64::EPSILON);

    // An evicted key starts over with a full bucket, which it had anyway.
    assert!(limiter.snapshot("idle").is_none());
    assert!(limiter.allow("idle", &policy));
    assert!(limiter.allow("idle", &policy));
    assert!(!limiter.allow("idle", &policy));
}

#[test]
fn test_evict_full_honours_key_filter() {
    let (limiter, _clock) = limiter();
    let policy = BucketPolicy::new(3, 1.0);

    assert!(limiter.allow("inbound:chat:ip:10.0.0.1", &policy));
    assert!(limiter.allow("github:get", &policy));
    limiter.reset("inbound:chat:ip:10.0.0.1");
    limiter.reset("github:get");

    assert_eq!(limiter.evict_full(|key| key.starts_with("inbound:")), 1);
    assert!(limiter.snapshot("github:get").is_some());
    assert!(limiter.snapshot("inbound:chat:ip:10.0.0.1").is_none());
}

#[test]
fn test_reset_refills_bucket() {
    let (limiter, _clock) = limiter();
    let policy = BucketPolicy::new(2, 0.01);

    assert!(!limiter.reset("s"));

    limiter.allow("s", &policy);
    limiter.allow("s", &policy);
    assert!(!limiter.allow("s", &policy));

    assert!(limiter.reset("s"));
    assert!(limiter.allow("s", &policy));
}

#[test]
fn test_policy_change_clamps_tokens() {
    let (limiter, _clock) = limiter();

    assert!(limiter.allow("s", &BucketPolicy::new(100, 1.0)));
    let smaller = BucketPolicy::new(3, 1.0);
    let allowed = (0..10).filter(|_| limiter.allow("s", &smaller)).count();
    assert_eq!(allowed, 3);
}

#[test]
fn test_snapshot_does_not_consume() {
    let (limiter, _clock) = limiter();
    let policy = BucketPolicy::new(1, 1.0);

    assert!(limiter.snapshot("s").is_none());
    limiter.allow("s", &policy);

    let snapshot = limiter.snapshot("s").unwrap();
    assert_eq!(snapshot.capacity, 1);
    assert_eq!(snapshot.retry_after_ms, Some(1000));
    assert!(limiter.snapshot("s").is_some());
}

#[test]
fn test_concurrent_access_respects_capacity() {
    let clock = Arc::new(ManualClock::new());
    let limiter = Arc::new(RateLimiter::new(clock));
    let policy = BucketPolicy::new(1000, 0.000_001);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let limiter = limiter.clone();
            std::thread::spawn(move || (0..500).filter(|_| limiter.allow("shared", &policy)).count())
        })
        .collect();

    let allowed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(allowed, 1000);
}
