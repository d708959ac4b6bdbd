//! Configuration loading feeding a live controller

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;
    use venom_traffic::config::models::BucketPolicy;
    use venom_traffic::{Config, Decision, GatewayError, TrafficController};

    const FULL_CONFIG: &str = r#"
server:
  host: "127.0.0.1"
  port: 8100
traffic_control:
  outbound:
    default: { capacity: 60, refill_per_sec: 1.0 }
    scopes:
      "github:get": { capacity: 2, refill_per_sec: 0.5 }
      "openai:*": { capacity: 1, refill_per_sec: 0.1 }
  inbound:
    default: { capacity: 30, refill_per_sec: 0.5 }
    groups:
      chat: { capacity: 5, refill_per_sec: 1.0 }
    routes:
      - { prefix: "/api/v1/chat", group: chat }
  circuit_breaker:
    failure_threshold: 2
    cooldown_secs: 15
    max_cooldown_secs: 120
  retry:
    max_attempts: 2
    base_delay_ms: 50
    max_delay_ms: 400
    jitter_fraction: 0.0
  anti_loop:
    hard_cap: 50
    window_secs: 30
    critical_scopes: ["ops:*"]
"#;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_file_limits_drive_decisions() {
        let file = write_config(FULL_CONFIG);
        let config = Config::from_file(file.path()).await.unwrap();
        let tc = config.traffic_control();

        assert_eq!(tc.outbound.policy_for("github:get"), BucketPolicy::new(2, 0.5));
        assert_eq!(tc.outbound.policy_for("openai:post"), BucketPolicy::new(1, 0.1));
        assert_eq!(tc.outbound.policy_for("jira:get"), BucketPolicy::new(60, 1.0));
        assert_eq!(tc.inbound.group_for_path("/api/v1/chat/send"), "chat");
        assert_eq!(tc.anti_loop.critical_scopes, vec!["ops:*".to_string()]);

        let controller = TrafficController::new(tc.clone()).unwrap();
        assert!(controller.check_outbound_request("openai:post").is_allowed());
        assert!(matches!(
            controller.check_outbound_request("openai:post"),
            Decision::RateLimited { .. }
        ));

        let policy = controller.retry_policy();
        assert_eq!(policy.max_attempts(), 2);
        assert_eq!(policy.base_delay_for(0), Duration::from_millis(50));
        assert_eq!(policy.base_delay_for(5), Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_unknown_fields_keep_defaults() {
        let file = write_config("traffic_control:\n  retry:\n    max_attempts: 5\n");
        let config = Config::from_file(file.path()).await.unwrap();

        assert_eq!(config.traffic_control.retry.max_attempts, 5);
        assert_eq!(config.traffic_control.circuit_breaker.failure_threshold, 5);
        assert_eq!(config.traffic_control.anti_loop.hard_cap, 100);
        assert_eq!(config.server.port, 8000);
    }

    #[tokio::test]
    async fn test_invalid_bucket_rejected_at_load() {
        let file = write_config(
            "traffic_control:\n  outbound:\n    scopes:\n      \"github:get\": { capacity: 0, refill_per_sec: 1.0 }\n",
        );
        match Config::from_file(file.path()).await {
            Err(GatewayError::Config(message)) => assert!(message.contains("github:get")),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_yaml_rejected() {
        let file = write_config("traffic_control: [not, a, map\n");
        assert!(matches!(
            Config::from_file(file.path()).await,
            Err(GatewayError::Config(_))
        ));
    }

    #[test]
    fn test_env_overrides_beat_file_values() {
        let mut config = Config::from_yaml_str(FULL_CONFIG).unwrap();
        config
            .apply_overrides_from(|key| match key {
                "TRAFFIC_CONTROL_ANTI_LOOP_CAP" => Some("7".to_string()),
                "VENOM_PORT" => Some("9100".to_string()),
                _ => None,
            })
            .unwrap();

        assert_eq!(config.traffic_control.anti_loop.hard_cap, 7);
        assert_eq!(config.server.port, 9100);
        // Untouched keys keep the file value.
        assert_eq!(config.traffic_control.circuit_breaker.cooldown_secs, 15);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_hot_reload_applies_new_limits() {
        let config = Config::from_yaml_str(FULL_CONFIG).unwrap();
        let controller = TrafficController::new(config.traffic_control.clone()).unwrap();

        for _ in 0..2 {
            assert!(controller.check_outbound_request("github:get").is_allowed());
        }
        assert!(!controller.check_outbound_request("github:get").is_allowed());

        let mut updated = config.traffic_control.clone();
        updated.anti_loop.hard_cap = 0;
        assert!(controller.update_config(updated).is_err());
        assert_eq!(controller.config().anti_loop.hard_cap, 50);

        let mut updated = config.traffic_control.clone();
        updated.circuit_breaker.failure_threshold = 9;
        controller.update_config(updated).unwrap();
        assert_eq!(controller.config().circuit_breaker.failure_threshold, 9);
    }
}
