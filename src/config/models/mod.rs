//! Configuration data models
//!
//! This module defines all configuration structures used by the traffic-control service.

#![allow(missing_docs)]

pub mod server;
pub mod traffic_control;

// Re-export all configuration types
pub use server::*;
pub use traffic_control::*;

/// Default values for configuration
pub fn default_host() -> String {
    "0.0.0.0".to_string()
}

/// Default server port
pub fn default_port() -> u16 {
    8000
}

/// Default request timeout in seconds
pub fn default_timeout() -> u64 {
    30
}

/// Default outbound bucket capacity
pub fn default_outbound_capacity() -> u32 {
    60
}

/// Default outbound refill rate (tokens per second)
pub fn default_outbound_refill() -> f64 {
    1.0
}

/// Default inbound bucket capacity
pub fn default_inbound_capacity() -> u32 {
    120
}

/// Default inbound refill rate (tokens per second)
pub fn default_inbound_refill() -> f64 {
    2.0
}

/// Default consecutive failures before a breaker opens
pub fn default_failure_threshold() -> u32 {
    5
}

/// Default breaker cooldown in seconds
pub fn default_cooldown_secs() -> u64 {
    30
}

/// Default ceiling for the doubled breaker cooldown in seconds
pub fn default_max_cooldown_secs() -> u64 {
    300
}

/// Default maximum retry attempts
pub fn default_max_attempts() -> u32 {
    3
}

/// Default base retry delay in milliseconds
pub fn default_base_delay_ms() -> u64 {
    500
}

/// Default maximum retry delay in milliseconds
pub fn default_max_delay_ms() -> u64 {
    10_000
}

/// Default jitter fraction applied on top of the backoff delay
pub fn default_jitter_fraction() -> f64 {
    0.1
}

/// Default anti-loop hard cap (requests per window)
pub fn default_hard_cap() -> u64 {
    100
}

/// Default anti-loop window in seconds
pub fn default_window_secs() -> u64 {
    60
}

/// Default degraded-mode duration in seconds
pub fn default_degraded_cooldown_secs() -> u64 {
    60
}

/// Default allowance for non-critical scopes while degraded
pub fn default_degraded_allowance() -> u64 {
    10
}

/// Default decision-log rotation period in hours
pub fn default_rotation_hours() -> u64 {
    24
}

/// Default decision-log retention in days
pub fn default_retention_days() -> u64 {
    3
}

/// Default decision-log directory size budget in bytes
pub fn default_max_total_bytes() -> u64 {
    50 * 1024 * 1024 // 50MB
}

/// Default decision-log channel capacity
pub fn default_channel_capacity() -> usize {
    4096
}

/// Paths that bypass inbound throttling by default
pub fn default_exempt_prefixes() -> Vec<String> {
    vec!["/health".to_string(), "/api/v1/traffic-control".to_string()]
}
