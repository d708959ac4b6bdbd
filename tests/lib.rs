//! Test suite for venom-traffic
//!
//! ## Test Categories
//!
//! ### 1. Common Utilities (`common/`)
//! Controller fixtures on a manual clock and config builders.
//!
//! ### 2. Integration Tests (`integration/`)
//! - End-to-end traffic control scenarios
//! - Concurrency regression (throughput floor, token conservation, single probe)
//! - Inbound HTTP throttling through the actix application
//! - Configuration loading
//!
//! ## Running Tests
//!
//! ```bash
//! # Run only unit tests
//! cargo test --lib
//!
//! # Run integration tests
//! cargo test --test lib
//! ```

pub mod common;
pub mod integration;
