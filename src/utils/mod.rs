//! Utility modules for the traffic control layer
//!
//! - **error**: error type, HTTP error mapping, circuit breaker and retry
//! - **logging**: tracing setup and the decision log
//! - **net**: traffic-controlled HTTP clients

pub mod error; // Error handling & recovery
pub mod logging;
pub mod net; // Outbound HTTP

pub use error::{GatewayError, Result};
pub use net::{BlockingTrafficClient, ClientUtils, HttpClientConfig, TrafficClient};
