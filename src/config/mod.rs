//! Configuration management for the traffic-control service
//!
//! This module handles loading, validation, and management of all configuration.
//! Values come from a YAML file (every field has a serde default), are then overridden by
//! environment variables, and are validated before anything uses them.

pub mod models;
pub mod validation;

pub use models::*;
pub use validation::Validate;

use crate::utils::error::{GatewayError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

/// Enables the on-disk decision log
pub const ENV_ENABLE_LOGGING: &str = "ENABLE_TRAFFIC_CONTROL_LOGGING";
/// Directory for the decision log
pub const ENV_LOG_DIR: &str = "TRAFFIC_CONTROL_LOG_DIR";
/// Default outbound bucket capacity
pub const ENV_OUTBOUND_CAPACITY: &str = "TRAFFIC_CONTROL_OUTBOUND_CAPACITY";
/// Default outbound refill rate
pub const ENV_OUTBOUND_REFILL: &str = "TRAFFIC_CONTROL_OUTBOUND_REFILL_PER_SEC";
/// Circuit breaker failure threshold
pub const ENV_FAILURE_THRESHOLD: &str = "TRAFFIC_CONTROL_FAILURE_THRESHOLD";
/// Circuit breaker cooldown
pub const ENV_COOLDOWN_SECS: &str = "TRAFFIC_CONTROL_COOLDOWN_SECS";
/// Circuit breaker cooldown ceiling
pub const ENV_MAX_COOLDOWN_SECS: &str = "TRAFFIC_CONTROL_MAX_COOLDOWN_SECS";
/// Anti-loop hard cap
pub const ENV_ANTI_LOOP_CAP: &str = "TRAFFIC_CONTROL_ANTI_LOOP_CAP";
/// Server bind host
pub const ENV_HOST: &str = "VENOM_HOST";
/// Server bind port
pub const ENV_PORT: &str = "VENOM_PORT";

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Traffic control configuration
    #[serde(default)]
    pub traffic_control: TrafficControlConfig,
}

impl Config {
    /// Load configuration from file, apply environment overrides and validate
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {:?}", path);

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| GatewayError::Config(format!("Failed to read config file: {}", e)))?;

        let mut config = Self::from_yaml_str(&content)?;
        config.apply_env_overrides()?;
        config.validate()?;

        debug!("Configuration loaded successfully");
        Ok(config)
    }

    /// Build configuration from defaults and environment variables only
    pub fn from_env() -> Result<Self> {
        info!("Loading configuration from environment variables");

        let mut config = Self::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML document without validating it
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
            .map_err(|e| GatewayError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup (the process environment in production)
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let tc = &mut self.traffic_control;

        if let Some(value) = lookup(ENV_ENABLE_LOGGING) {
            tc.logging.enabled = parse_flag(ENV_ENABLE_LOGGING, &value)?;
        }
        if let Some(value) = lookup(ENV_LOG_DIR) {
            if !value.trim().is_empty() {
                tc.logging.log_dir = Some(PathBuf::from(value.trim()));
            }
        }
        if let Some(value) = lookup(ENV_OUTBOUND_CAPACITY) {
            tc.outbound.default.capacity = parse_value(ENV_OUTBOUND_CAPACITY, &value)?;
        }
        if let Some(value) = lookup(ENV_OUTBOUND_REFILL) {
            tc.outbound.default.refill_per_sec = parse_value(ENV_OUTBOUND_REFILL, &value)?;
        }
        if let Some(value) = lookup(ENV_FAILURE_THRESHOLD) {
            tc.circuit_breaker.failure_threshold = parse_value(ENV_FAILURE_THRESHOLD, &value)?;
        }
        if let Some(value) = lookup(ENV_COOLDOWN_SECS) {
            tc.circuit_breaker.cooldown_secs = parse_value(ENV_COOLDOWN_SECS, &value)?;
        }
        if let Some(value) = lookup(ENV_MAX_COOLDOWN_SECS) {
            tc.circuit_breaker.max_cooldown_secs = parse_value(ENV_MAX_COOLDOWN_SECS, &value)?;
        }
        if let Some(value) = lookup(ENV_ANTI_LOOP_CAP) {
            tc.anti_loop.hard_cap = parse_value(ENV_ANTI_LOOP_CAP, &value)?;
        }
        if let Some(value) = lookup(ENV_HOST) {
            self.server.host = value;
        }
        if let Some(value) = lookup(ENV_PORT) {
            self.server.port = parse_value(ENV_PORT, &value)?;
        }

        Ok(())
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(GatewayError::Config)
    }

    /// Get server configuration
    pub fn server(&self) -> &ServerConfig {
        &self.server
    }

    /// Get traffic control configuration
    pub fn traffic_control(&self) -> &TrafficControlConfig {
        &self.traffic_control
    }

    /// Convert to YAML string
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| GatewayError::Config(format!("Failed to serialize config to YAML: {}", e)))
    }
}

fn parse_value<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| GatewayError::Config(format!("Invalid value for {}: {}", key, e)))
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(GatewayError::Config(format!(
            "Invalid value for {}: expected a boolean, got '{}'",
            key, other
        ))),
    }
}
