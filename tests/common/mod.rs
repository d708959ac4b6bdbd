//! Common test utilities for venom-traffic

use std::sync::Arc;
use venom_traffic::config::models::{BucketPolicy, TrafficControlConfig};
use venom_traffic::{ManualClock, TrafficController};

/// Controller on a manual clock, with the clock handle for advancing time
pub fn manual_controller(config: TrafficControlConfig) -> (Arc<TrafficController>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let controller = TrafficController::with_clock(config, clock.clone())
        .expect("test configuration should be valid");
    (Arc::new(controller), clock)
}

/// Default configuration with a roomy anti-loop cap so it never interferes
pub fn base_config() -> TrafficControlConfig {
    let mut config = TrafficControlConfig::default();
    config.anti_loop.hard_cap = 1_000_000;
    config
}

/// Configuration with one outbound scope policy
pub fn config_with_scope(scope: &str, capacity: u32, refill_per_sec: f64) -> TrafficControlConfig {
    let mut config = base_config();
    config
        .outbound
        .scopes
        .insert(scope.to_string(), BucketPolicy::new(capacity, refill_per_sec));
    config
}
