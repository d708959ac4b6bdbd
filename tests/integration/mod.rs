//! Integration tests for venom-traffic
//!
//! These tests drive the public API the way agents and the HTTP layer do.

pub mod concurrency_tests;
pub mod config_tests;
pub mod inbound_http_tests;
pub mod scenarios_tests;
