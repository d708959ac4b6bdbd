//! Core traffic control logic
//!
//! - **rate_limiter**: per-scope token buckets
//! - **traffic_control**: the controller facade, anti-loop guard and per-scope metrics

pub mod rate_limiter;
pub mod traffic_control;
