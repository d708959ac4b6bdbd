//! Rate Limiting Implementation
//!
//! Per-scope token buckets with lazy refill. Each scope owns its own lock, so
//! unrelated scopes never contend.

mod limiter;
mod types;

#[cfg(test)]
mod tests;

// Re-export public types
pub use limiter::RateLimiter;
pub use types::{BucketSnapshot, RateLimitResult, TokenBucket};
