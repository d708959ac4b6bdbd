//! Error recovery and resilience utilities
//!
//! Per-scope circuit breakers and the transient-only retry policy used by the
//! outbound client.

mod circuit_breaker;
mod retry;
mod types;

pub use circuit_breaker::{Admission, CircuitBreaker};
pub use retry::RetryPolicy;
pub use types::{CircuitBreakerSnapshot, CircuitState, Retryable};
