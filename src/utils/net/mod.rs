//! Network and Client utilities
//!
//! The traffic-controlled HTTP client is the only sanctioned path for outbound calls.

pub mod client;

pub use client::{
    AttemptError, BlockingTrafficClient, ClientUtils, HttpClientConfig, StreamingResponse,
    TrafficClient, TrafficRequest,
};
