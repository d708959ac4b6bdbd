//! Configuration validation
//!
//! This module provides validation logic for all configuration structures.
//!
//! The validation is organized into several submodules:
//! - `trait_def`: Core Validate trait definition
//! - `config_validators`: Top-level and server configuration validators
//! - `traffic_validators`: Traffic control validators (buckets, breaker, retry, anti-loop, logging)
//! - `tests`: Test suite for all validators

mod config_validators;
mod trait_def;
mod traffic_validators;

pub use trait_def::Validate;
