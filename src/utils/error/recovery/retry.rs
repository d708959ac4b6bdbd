//! Retry mechanism with exponential backoff
//!
//! `delay(n) = min(max_delay, base_delay * 2^n) + uniform(0, jitter * that)` for the
//! zero-based retry `n`. Only errors whose [`Retryable::is_transient`] is true are retried.

use super::types::Retryable;
use crate::config::models::RetryConfig;
use rand::Rng;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error};

/// Retry policy with exponential backoff and jitter
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    jitter_fraction: f64,
}

impl RetryPolicy {
    /// Create a new retry policy
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
        jitter_fraction: f64,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
            jitter_fraction: jitter_fraction.clamp(0.0, 1.0),
        }
    }

    /// Build a policy from the retry configuration section
    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.base_delay_ms),
            Duration::from_millis(config.max_delay_ms),
            config.jitter_fraction,
        )
    }

    /// Maximum number of attempts, including the first
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Backoff before retry `attempt` (zero-based), without jitter
    pub fn base_delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Backoff before retry `attempt` (zero-based), with jitter
    pub fn delay(&self, attempt: u32) -> Duration {
        let delay = self.base_delay_for(attempt);
        if self.jitter_fraction <= 0.0 || delay.is_zero() {
            return delay;
        }
        let jitter = rand::thread_rng().gen_range(0.0..=self.jitter_fraction);
        delay + delay.mul_f64(jitter)
    }

    /// Delay to use after a failed attempt; a server hint wins but is capped
    pub fn next_delay(&self, attempt: u32, server_hint: Option<Duration>) -> Duration {
        match server_hint {
            Some(hint) => hint.min(self.max_delay),
            None => self.delay(attempt),
        }
    }

    /// Run `op` until it succeeds, fails permanently or attempts run out
    pub async fn execute<T, E, F, Fut>(&self, op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + fmt::Display,
    {
        self.execute_with_hook(op, |_, _, _| {}).await
    }

    /// Same as [`execute`](Self::execute), calling `on_retry(next_attempt, error, delay)`
    /// before each backoff
    pub async fn execute_with_hook<T, E, F, Fut, H>(&self, mut op: F, mut on_retry: H) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + fmt::Display,
        H: FnMut(u32, &E, Duration),
    {
        let mut attempt = 0;
        loop {
            match op(attempt).await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!("Retry succeeded on attempt {}", attempt + 1);
                    }
                    return Ok(value);
                }
                Err(err) => {
                    let Some(delay) = self.should_retry(attempt, &err) else {
                        return Err(err);
                    };
                    on_retry(attempt + 1, &err, delay);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Thread-blocking variant for the synchronous client
    pub fn execute_blocking<T, E, F, H>(&self, mut op: F, mut on_retry: H) -> Result<T, E>
    where
        F: FnMut(u32) -> Result<T, E>,
        E: Retryable + fmt::Display,
        H: FnMut(u32, &E, Duration),
    {
        let mut attempt = 0;
        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let Some(delay) = self.should_retry(attempt, &err) else {
                        return Err(err);
                    };
                    on_retry(attempt + 1, &err, delay);
                    std::thread::sleep(delay);
                    attempt += 1;
                }
            }
        }
    }

    fn should_retry<E: Retryable + fmt::Display>(&self, attempt: u32, err: &E) -> Option<Duration> {
        if !err.is_transient() {
            debug!("Attempt {} failed permanently: {}", attempt + 1, err);
            return None;
        }
        if attempt + 1 >= self.max_attempts {
            error!("Retry failed after {} attempts: {}", attempt + 1, err);
            return None;
        }
        let delay = self.next_delay(attempt, err.retry_after());
        debug!(
            "Attempt {} failed: {}, retrying in {:?}",
            attempt + 1,
            err,
            delay
        );
        Some(delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}
