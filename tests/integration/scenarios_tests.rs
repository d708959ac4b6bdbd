//! End-to-end traffic control scenarios

#[cfg(test)]
mod tests {
    use crate::common::{base_config, config_with_scope, manual_controller};
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};
    use venom_traffic::config::models::BucketPolicy;
    use venom_traffic::utils::net::AttemptError;
    use venom_traffic::{CircuitState, Decision, HttpClientConfig, RetryPolicy, TrafficClient};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Burst of ten drains the bucket; the eleventh waits one refill interval
    #[test]
    fn test_outbound_burst_then_rate_limited() {
        let (controller, _clock) = manual_controller(config_with_scope("github:get", 10, 1.0));

        for i in 0..10 {
            assert_eq!(
                controller.check_outbound_request("github:get"),
                Decision::Allowed,
                "call {} should pass",
                i + 1
            );
        }

        match controller.check_outbound_request("github:get") {
            Decision::RateLimited { retry_after } => {
                assert!((retry_after.as_secs_f64() - 1.0).abs() < 1e-6);
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    /// Five failures open the circuit; after the cooldown one probe closes it again
    #[test]
    fn test_circuit_opens_probes_and_recovers() {
        let mut config = base_config();
        config.circuit_breaker.failure_threshold = 5;
        config.circuit_breaker.cooldown_secs = 30;
        let (controller, clock) = manual_controller(config);
        let scope = "openai:post";

        for _ in 0..5 {
            assert!(controller.check_outbound_request(scope).is_allowed());
            controller.record_outbound_response(scope, false, Duration::from_millis(20));
        }

        match controller.check_outbound_request(scope) {
            Decision::CircuitOpen { retry_after } => assert_eq!(retry_after, Duration::from_secs(30)),
            other => panic!("expected CircuitOpen, got {other:?}"),
        }

        clock.advance(Duration::from_secs(30));
        let probe = controller.check_outbound_request(scope);
        assert!(matches!(probe, Decision::Probe { .. }));
        assert_eq!(controller.circuit_state(scope), CircuitState::HalfOpen);
        // Only one probe at a time.
        assert!(matches!(
            controller.check_outbound_request(scope),
            Decision::CircuitOpen { .. }
        ));

        controller.record_outbound_outcome(scope, probe, true, Duration::from_millis(20));
        assert_eq!(controller.circuit_state(scope), CircuitState::Closed);
        for _ in 0..3 {
            assert!(controller.check_outbound_request(scope).is_allowed());
        }

        let metrics = controller.scope_metrics(scope).unwrap();
        assert_eq!(metrics.circuit_breaker.unwrap().consecutive_failures, 0);
    }

    /// A failed probe reopens the circuit with a doubled cooldown
    #[test]
    fn test_failed_probe_doubles_cooldown() {
        let mut config = base_config();
        config.circuit_breaker.failure_threshold = 5;
        config.circuit_breaker.cooldown_secs = 30;
        config.circuit_breaker.max_cooldown_secs = 300;
        let (controller, clock) = manual_controller(config);
        let scope = "openai:post";

        for _ in 0..5 {
            controller.check_outbound_request(scope);
            controller.record_outbound_response(scope, false, Duration::ZERO);
        }
        clock.advance(Duration::from_secs(30));
        let probe = controller.check_outbound_request(scope);
        assert!(probe.is_allowed());
        controller.record_outbound_outcome(scope, probe, false, Duration::ZERO);

        assert_eq!(controller.circuit_state(scope), CircuitState::Open);
        assert_eq!(
            controller.check_outbound_request(scope).retry_after(),
            Some(Duration::from_secs(60))
        );
    }

    /// A slow call admitted before the circuit opened cannot close it while the probe runs
    #[test]
    fn test_stale_success_does_not_close_half_open_circuit() {
        let mut config = base_config();
        config.circuit_breaker.failure_threshold = 2;
        config.circuit_breaker.cooldown_secs = 30;
        let (controller, clock) = manual_controller(config);
        let scope = "openai:post";

        let slow_call = controller.check_outbound_request(scope);
        for _ in 0..2 {
            controller.check_outbound_request(scope);
            controller.record_outbound_response(scope, false, Duration::ZERO);
        }
        clock.advance(Duration::from_secs(30));
        let trial = controller.check_outbound_request(scope);
        assert!(matches!(trial, Decision::Probe { .. }));

        controller.record_outbound_outcome(scope, slow_call, true, Duration::from_secs(31));
        assert_eq!(controller.circuit_state(scope), CircuitState::HalfOpen);
        assert!(matches!(
            controller.check_outbound_request(scope),
            Decision::CircuitOpen { .. }
        ));

        controller.record_outbound_outcome(scope, trial, false, Duration::ZERO);
        assert_eq!(controller.circuit_state(scope), CircuitState::Open);
        assert!(matches!(
            controller.check_outbound_request(scope),
            Decision::CircuitOpen { .. }
        ));
    }

    /// The 101st request in one window, across any scopes, is degraded
    #[test]
    fn test_anti_loop_cap_across_scopes() {
        let mut config = base_config();
        config.anti_loop.hard_cap = 100;
        config.anti_loop.window_secs = 60;
        config.outbound.default = BucketPolicy::new(1000, 1.0);
        let (controller, _clock) = manual_controller(config);

        let scopes = ["github:get", "openai:post", "jira:put", "slack:post"];
        for i in 0..100 {
            assert!(
                controller.check_outbound_request(scopes[i % scopes.len()]).is_allowed(),
                "request {} should pass",
                i + 1
            );
        }

        let decision = controller.check_outbound_request("github:get");
        assert!(matches!(decision, Decision::Degraded { .. }));
        assert!(controller.is_degraded());
        assert_eq!(controller.status().anti_loop.trips, 1);
    }

    /// Degraded mode ends after its cooldown and a fresh window starts
    #[test]
    fn test_degraded_mode_expires() {
        let mut config = base_config();
        config.anti_loop.hard_cap = 5;
        config.anti_loop.degraded_cooldown_secs = 60;
        config.anti_loop.degraded_allowance = 0;
        let (controller, clock) = manual_controller(config);

        for _ in 0..5 {
            controller.check_outbound_request("github:get");
        }
        assert!(!controller.check_outbound_request("github:get").is_allowed());

        clock.advance(Duration::from_secs(61));
        assert!(!controller.is_degraded());
        assert!(controller.check_outbound_request("github:get").is_allowed());
    }

    /// Actors on the same endpoint group never share a bucket
    #[test]
    fn test_inbound_actors_do_not_bleed() {
        let mut config = base_config();
        config
            .inbound
            .groups
            .insert("chat".to_string(), BucketPolicy::new(3, 0.1));
        let (controller, _clock) = manual_controller(config);

        for _ in 0..3 {
            assert!(controller
                .check_inbound_request("chat", Some("u1"), Some("s1"), Some("10.0.0.1"))
                .is_allowed());
        }
        let rejected = controller.check_inbound_request("chat", Some("u1"), Some("s9"), Some("10.0.0.9"));
        assert!(matches!(rejected, Decision::RateLimited { .. }));

        assert!(controller
            .check_inbound_request("chat", Some("u2"), Some("s2"), Some("10.0.0.2"))
            .is_allowed());
    }

    /// Backoff grows base, then twice base
    #[tokio::test]
    async fn test_retry_backoff_sequence() {
        let policy = RetryPolicy::new(3, Duration::from_millis(10), Duration::from_secs(1), 0.0);
        let delays = Arc::new(Mutex::new(Vec::new()));
        let attempts = Arc::new(Mutex::new(0u32));

        let result: Result<&str, AttemptError> = policy
            .execute_with_hook(
                |_| {
                    let attempts = attempts.clone();
                    async move {
                        let mut n = attempts.lock().unwrap();
                        *n += 1;
                        if *n < 3 {
                            Err(AttemptError::Status {
                                status: 503,
                                retry_after: None,
                                message: "unavailable".to_string(),
                            })
                        } else {
                            Ok("done")
                        }
                    }
                },
                |_, _, delay| delays.lock().unwrap().push(delay),
            )
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(*attempts.lock().unwrap(), 3);
        assert_eq!(
            *delays.lock().unwrap(),
            vec![Duration::from_millis(10), Duration::from_millis(20)]
        );
    }

    /// Two 503s then a 200: three attempts, one successful outcome for the breaker
    #[tokio::test]
    async fn test_transient_503_retried_to_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .mount(&server)
            .await;

        let mut config = base_config();
        config.retry.max_attempts = 3;
        config.retry.base_delay_ms = 20;
        config.retry.max_delay_ms = 1000;
        config.retry.jitter_fraction = 0.0;
        config.circuit_breaker.failure_threshold = 1;
        let controller = Arc::new(venom_traffic::TrafficController::new(config).unwrap());
        let client =
            TrafficClient::new("openai", controller.clone(), &HttpClientConfig::default()).unwrap();

        let started = Instant::now();
        let response = client
            .post(format!("{}/v1/chat/completions", server.uri()))
            .json(&serde_json::json!({"model": "gpt-4o"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);
        assert!(started.elapsed() >= Duration::from_millis(60));

        let received = server.received_requests().await.unwrap();
        assert_eq!(received.len(), 3);

        // Threshold is one failure, yet the circuit stays closed: only the final
        // outcome reaches the breaker.
        assert_eq!(controller.circuit_state("openai:post"), CircuitState::Closed);
        let metrics = controller.scope_metrics("openai:post").unwrap();
        assert_eq!(metrics.retries, 2);
        assert_eq!(metrics.successes, 1);
        assert_eq!(metrics.failures, 0);
        assert_eq!(metrics.responses.status_5xx, 2);
    }

    /// An always-failing transient call makes exactly max_attempts attempts
    #[tokio::test]
    async fn test_retry_bound() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let mut config = base_config();
        config.retry.max_attempts = 4;
        config.retry.base_delay_ms = 1;
        config.retry.max_delay_ms = 2;
        let controller = Arc::new(venom_traffic::TrafficController::new(config).unwrap());
        let client =
            TrafficClient::new("github", controller.clone(), &HttpClientConfig::default()).unwrap();

        let err = client.get(server.uri()).send().await.unwrap_err();
        assert_eq!(err.upstream_status(), Some(502));
        assert_eq!(server.received_requests().await.unwrap().len(), 4);
    }
}
