//! Server builder and run_server function

use crate::config::Config;
use crate::core::traffic_control::TrafficController;
use crate::server::server::HttpServer;
use crate::server::state::AppState;
use crate::utils::error::{GatewayError, Result};
use std::sync::Arc;
use tracing::info;

/// Server builder for easier configuration
#[derive(Default)]
pub struct ServerBuilder {
    config: Option<Config>,
    controller: Option<Arc<TrafficController>>,
}

impl ServerBuilder {
    /// Create a new server builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set configuration
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Share a controller that outbound clients already use
    pub fn with_controller(mut self, controller: Arc<TrafficController>) -> Self {
        self.controller = Some(controller);
        self
    }

    /// Build the HTTP server
    pub fn build(self) -> Result<HttpServer> {
        let config = self
            .config
            .ok_or_else(|| GatewayError::Config("Configuration is required".to_string()))?;
        config.validate()?;

        match self.controller {
            Some(controller) => Ok(HttpServer::with_state(AppState::with_controller(
                config, controller,
            ))),
            None => HttpServer::new(&config),
        }
    }
}

/// Run the server with a loaded configuration
pub async fn run_server(config: Config) -> Result<()> {
    info!("Starting Venom traffic control service");

    let server = ServerBuilder::new().with_config(config).build()?;
    let server_config = server.config();
    info!(
        "Server starting at: http://{}:{}",
        server_config.host, server_config.port
    );
    info!("API Endpoints:");
    info!("   GET  /health - Health check");
    info!("   GET  /api/v1/traffic-control/status - Controller status");
    info!("   GET  /api/v1/traffic-control/metrics/{{scope}} - Per-scope metrics");
    info!("   POST /api/v1/traffic-control/reset/{{scope}} - Reset a scope");
    info!("   GET  /api/v1/governance/limits - Current limits");
    info!("   POST /api/v1/governance/limits - Replace limits");

    server.start().await
}
