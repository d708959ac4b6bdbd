//! Traffic control validators
//!
//! A configuration that fails here is never installed, neither at startup nor through
//! the governance endpoint.

use super::trait_def::Validate;
use crate::config::models::*;
use tracing::debug;

impl Validate for TrafficControlConfig {
    fn validate(&self) -> Result<(), String> {
        debug!("Validating traffic control configuration");

        self.outbound.validate()?;
        self.inbound.validate()?;
        self.circuit_breaker.validate()?;
        self.retry.validate()?;
        self.anti_loop.validate()?;
        self.logging.validate()?;

        Ok(())
    }
}

impl Validate for BucketPolicy {
    fn validate(&self) -> Result<(), String> {
        if self.capacity == 0 {
            return Err("Bucket capacity must be greater than 0".to_string());
        }

        if !self.refill_per_sec.is_finite() || self.refill_per_sec <= 0.0 {
            return Err(format!(
                "Bucket refill rate must be a positive number, got {}",
                self.refill_per_sec
            ));
        }

        Ok(())
    }
}

impl Validate for OutboundLimits {
    fn validate(&self) -> Result<(), String> {
        self.default
            .validate()
            .map_err(|e| format!("outbound default: {}", e))?;

        for (scope, policy) in &self.scopes {
            if scope.is_empty() {
                return Err("Outbound scope name cannot be empty".to_string());
            }
            policy
                .validate()
                .map_err(|e| format!("outbound scope '{}': {}", scope, e))?;
        }

        Ok(())
    }
}

impl Validate for InboundLimits {
    fn validate(&self) -> Result<(), String> {
        self.default
            .validate()
            .map_err(|e| format!("inbound default: {}", e))?;

        for (group, policy) in &self.groups {
            policy
                .validate()
                .map_err(|e| format!("inbound group '{}': {}", group, e))?;
        }

        for route in &self.routes {
            if !route.prefix.starts_with('/') {
                return Err(format!(
                    "Route prefix '{}' must start with '/'",
                    route.prefix
                ));
            }
            if route.group.is_empty() {
                return Err(format!("Route '{}' has an empty group", route.prefix));
            }
        }

        Ok(())
    }
}

impl Validate for CircuitBreakerConfig {
    fn validate(&self) -> Result<(), String> {
        if self.failure_threshold == 0 {
            return Err("Circuit breaker failure threshold must be greater than 0".to_string());
        }

        if self.cooldown_secs == 0 {
            return Err("Circuit breaker cooldown must be greater than 0".to_string());
        }

        if self.max_cooldown_secs < self.cooldown_secs {
            return Err("Circuit breaker max cooldown must be at least the cooldown".to_string());
        }

        Ok(())
    }
}

impl Validate for RetryConfig {
    fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("Retry max attempts must be greater than 0".to_string());
        }

        if self.max_delay_ms < self.base_delay_ms {
            return Err("Retry max delay must be at least the base delay".to_string());
        }

        if !(0.0..=1.0).contains(&self.jitter_fraction) {
            return Err("Retry jitter fraction must be between 0 and 1".to_string());
        }

        Ok(())
    }
}

impl Validate for AntiLoopConfig {
    fn validate(&self) -> Result<(), String> {
        if self.hard_cap == 0 {
            return Err("Anti-loop hard cap must be greater than 0".to_string());
        }

        if self.window_secs == 0 {
            return Err("Anti-loop window must be greater than 0".to_string());
        }

        if self.degraded_cooldown_secs == 0 {
            return Err("Anti-loop degraded cooldown must be greater than 0".to_string());
        }

        Ok(())
    }
}

impl Validate for DecisionLogConfig {
    fn validate(&self) -> Result<(), String> {
        if !self.enabled {
            return Ok(());
        }

        if self.log_dir.is_none() {
            return Err("Decision logging is enabled but no log directory is set".to_string());
        }

        if self.rotation_hours == 0 {
            return Err("Decision log rotation must be at least 1 hour".to_string());
        }

        if self.retention_days == 0 {
            return Err("Decision log retention must be at least 1 day".to_string());
        }

        if self.channel_capacity == 0 {
            return Err("Decision log channel capacity must be greater than 0".to_string());
        }

        Ok(())
    }
}
