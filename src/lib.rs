//! # Venom Traffic
//!
//! API traffic control for the Venom agent platform.
//!
//! ## Features
//!
//! - **Token buckets**: one bucket per outbound scope (`{provider}:{verb}`) and per inbound
//!   caller (endpoint group plus actor, session or client IP)
//! - **Circuit breakers**: CLOSED / OPEN / HALF_OPEN per scope with a single probe and a
//!   cooldown that doubles up to a ceiling
//! - **Retry**: transient failures only, exponential backoff with jitter, server
//!   `Retry-After` honoured
//! - **Anti-loop guard**: a global cap on outbound requests per window that switches the
//!   process into a degraded mode
//! - **HTTP surface**: status and metrics endpoints, runtime limit updates, and `429` with
//!   `Retry-After` for throttled inbound requests
//!
//! ## Outbound calls
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use venom_traffic::{HttpClientConfig, TrafficClient, TrafficControlConfig, TrafficController};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let controller = Arc::new(TrafficController::new(TrafficControlConfig::default())?);
//!     let github = TrafficClient::new("github", controller, &HttpClientConfig::default())?;
//!
//!     match github.get("https://api.github.com/zen").send().await {
//!         Ok(response) => println!("{}", response.text().await?),
//!         Err(e) if e.is_blocked() => println!("retry in {:?}", e.retry_after()),
//!         Err(e) => return Err(e.into()),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Service mode
//!
//! ```rust,no_run
//! use venom_traffic::{Config, server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_file("config/venom.yaml").await?;
//!     server::run_server(config).await?;
//!     Ok(())
//! }
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod config;
pub mod core;
pub mod server;
pub mod utils;

// Re-export main types
pub use config::{Config, TrafficControlConfig};
pub use core::rate_limiter::RateLimiter;
pub use core::traffic_control::{
    Decision, InboundKey, ManualClock, SystemClock, TrafficController, TrafficStatus,
};
pub use utils::error::recovery::{CircuitBreaker, CircuitState, RetryPolicy};
pub use utils::error::{GatewayError, Result};
pub use utils::net::{BlockingTrafficClient, HttpClientConfig, TrafficClient};

// Version information
/// Current version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Name of the crate
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Build information embedded at compile time
#[derive(Debug, Clone, serde::Serialize)]
pub struct BuildInfo {
    /// Version number
    pub version: &'static str,
    /// Seconds since the Unix epoch at build time
    pub build_time: &'static str,
    /// Git commit hash
    pub git_hash: &'static str,
    /// Rust version
    pub rust_version: &'static str,
}

impl Default for BuildInfo {
    fn default() -> Self {
        Self {
            version: VERSION,
            build_time: env!("BUILD_TIME"),
            git_hash: env!("GIT_HASH"),
            rust_version: env!("RUST_VERSION"),
        }
    }
}

/// Build information for this binary
pub fn build_info() -> BuildInfo {
    BuildInfo::default()
}
