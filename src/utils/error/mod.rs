//! Error Handling utilities
//!
//! Error types, their HTTP mapping, and the recovery primitives (circuit breaker,
//! retry policy) used on the outbound path.

pub mod error;
pub mod recovery;

pub use error::*;
