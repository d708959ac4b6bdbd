//! Concurrency regression tests
//!
//! Eight threads hammer the controller; checks must stay fast and never over-admit.

#[cfg(test)]
mod tests {
    use crate::common::{base_config, config_with_scope, manual_controller};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::{Duration, Instant};
    use venom_traffic::config::models::BucketPolicy;
    use venom_traffic::{Decision, RateLimiter, SystemClock, TrafficController};

    const THREADS: usize = 8;

    /// Order of magnitude below the shared-scope reference of ~22k checks/s
    const SHARED_SCOPE_FLOOR_OPS: f64 = 2_200.0;

    fn run_threads<F>(f: F) -> Vec<u64>
    where
        F: Fn(usize) -> u64 + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        let barrier = Arc::new(Barrier::new(THREADS));
        let handles: Vec<_> = (0..THREADS)
            .map(|i| {
                let f = f.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    f(i)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    }

    #[test]
    fn test_shared_scope_throughput_floor() {
        let mut config = base_config();
        config.anti_loop.hard_cap = u64::MAX / 2;
        config.outbound.default = BucketPolicy::new(u32::MAX, 1_000_000.0);
        let controller = Arc::new(TrafficController::new(config).unwrap());
        let per_thread = 5_000u64;

        let started = Instant::now();
        let c = controller.clone();
        let allowed: u64 = run_threads(move |_| {
            (0..per_thread)
                .filter(|_| c.check_outbound_request("github:get").is_allowed())
                .count() as u64
        })
        .into_iter()
        .sum();
        let elapsed = started.elapsed().as_secs_f64();

        let total = per_thread * THREADS as u64;
        assert_eq!(allowed, total);
        let ops_per_sec = total as f64 / elapsed;
        assert!(
            ops_per_sec >= SHARED_SCOPE_FLOOR_OPS,
            "throughput collapsed: {:.0} ops/s",
            ops_per_sec
        );
    }

    #[test]
    fn test_tokens_conserved_under_contention() {
        let (controller, _clock) = manual_controller(config_with_scope("github:get", 1000, 1.0));

        let c = controller.clone();
        let allowed: u64 = run_threads(move |_| {
            (0..500)
                .filter(|_| c.check_outbound_request("github:get").is_allowed())
                .count() as u64
        })
        .into_iter()
        .sum();

        // The clock never moves, so exactly the initial tokens are handed out.
        assert_eq!(allowed, 1000);
        let bucket = controller
            .scope_metrics("github:get")
            .and_then(|m| m.bucket)
            .unwrap();
        assert!(bucket.tokens_remaining >= 0.0);
        assert!(bucket.tokens_remaining < 1.0);
    }

    #[test]
    fn test_distinct_scopes_do_not_contend_for_tokens() {
        let limiter = Arc::new(RateLimiter::new(Arc::new(SystemClock)));
        let policy = BucketPolicy::new(100, 0.001);

        let l = limiter.clone();
        let per_scope = run_threads(move |i| {
            let scope = format!("provider{}:get", i);
            (0..150).filter(|_| l.allow(&scope, &policy)).count() as u64
        });

        // Each thread owns its scope; refill during the test adds at most one token.
        for allowed in per_scope {
            assert!((100..=101).contains(&allowed), "allowed {}", allowed);
        }
        assert_eq!(limiter.len(), THREADS);
    }

    #[test]
    fn test_single_half_open_probe_under_race() {
        let mut config = base_config();
        config.circuit_breaker.failure_threshold = 1;
        config.circuit_breaker.cooldown_secs = 10;
        let (controller, clock) = manual_controller(config);

        controller.check_outbound_request("openai:post");
        controller.record_outbound_response("openai:post", false, Duration::ZERO);
        clock.advance(Duration::from_secs(10));

        let probes = Arc::new(AtomicU64::new(0));
        let c = controller.clone();
        let p = probes.clone();
        let outcomes = run_threads(move |_| {
            let decision = c.check_outbound_request("openai:post");
            if matches!(decision, Decision::Probe { .. }) {
                p.fetch_add(1, Ordering::SeqCst);
                1
            } else {
                assert!(matches!(decision, Decision::CircuitOpen { .. }));
                0
            }
        });

        assert_eq!(outcomes.iter().sum::<u64>(), 1);
        assert_eq!(probes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_async_callers_share_inbound_bucket() {
        let mut config = base_config();
        config
            .inbound
            .groups
            .insert("chat".to_string(), BucketPolicy::new(50, 0.001));
        let controller = Arc::new(TrafficController::new(config).unwrap());

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let controller = controller.clone();
                tokio::spawn(async move {
                    (0..10)
                        .filter(|_| {
                            controller
                                .check_inbound_request("chat", Some("u1"), None, None)
                                .is_allowed()
                        })
                        .count()
                })
            })
            .collect();

        let mut allowed = 0;
        for task in tasks {
            allowed += task.await.unwrap();
        }
        assert!((50..=51).contains(&allowed), "allowed {}", allowed);
    }
}
