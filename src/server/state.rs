//! Application state shared across HTTP handlers

use crate::config::Config;
use crate::core::traffic_control::TrafficController;
use crate::utils::error::Result;
use std::sync::Arc;

/// HTTP server state shared across handlers
///
/// Cloning is cheap; every field is behind an `Arc`. Traffic limits live in the
/// controller, which swaps them atomically; `config` is the startup snapshot.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Startup configuration (read-only)
    pub config: Arc<Config>,
    /// Process-wide traffic controller
    pub controller: Arc<TrafficController>,
}

impl AppState {
    /// Build state from a validated configuration
    pub fn new(config: Config) -> Result<Self> {
        let controller = TrafficController::new(config.traffic_control.clone())?;
        Ok(Self::with_controller(config, Arc::new(controller)))
    }

    /// Build state around an existing controller
    pub fn with_controller(config: Config, controller: Arc<TrafficController>) -> Self {
        Self {
            config: Arc::new(config),
            controller,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
