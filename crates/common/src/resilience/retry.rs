//! Retry policy and exponential backoff shared by the breaker and by the
//! recovery orchestrator's action runner.
//!
//! The delay for attempt `n` (1-based) is
//! `min(base_delay * multiplier^(n - 1), max_delay)`, optionally spread with
//! equal jitter so synchronized callers do not stampede a recovering
//! subsystem.

use std::time::{Duration, Instant};

use rand::Rng;

use super::constants::{
    DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY, DEFAULT_MAX_RETRIES,
    MAX_BACKOFF_EXPONENT, MAX_RETRIES_LIMIT,
};
use super::{ConfigError, ConfigResult};

/// Configuration for bounded retry with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries allowed after the first attempt. Zero disables retry.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Cap applied to every computed delay.
    pub max_delay: Duration,
    /// Exponential growth factor between attempts.
    pub multiplier: f64,
    /// Whether to apply equal jitter to computed delays.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// A policy that never retries.
    pub fn disabled() -> Self {
        Self { max_retries: 0, ..Default::default() }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_retries > MAX_RETRIES_LIMIT {
            return Err(ConfigError::Invalid {
                message: format!("max_retries must be at most {MAX_RETRIES_LIMIT}"),
            });
        }
        if self.multiplier < 1.0 {
            return Err(ConfigError::Invalid {
                message: "multiplier must be at least 1.0".to_string(),
            });
        }
        if self.base_delay > self.max_delay {
            return Err(ConfigError::Invalid {
                message: format!(
                    "base_delay ({:?}) cannot be greater than max_delay ({:?})",
                    self.base_delay, self.max_delay
                ),
            });
        }
        Ok(())
    }

    /// Compute the backoff delay for the given 1-based attempt number,
    /// including jitter when enabled.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = backoff_delay(self.base_delay, self.multiplier, self.max_delay, attempt);
        if self.jitter {
            apply_equal_jitter(delay)
        } else {
            delay
        }
    }
}

/// Raw exponential backoff: `min(base * multiplier^(attempt - 1), max)`.
///
/// The exponent is clamped so pathological attempt counts cannot overflow
/// the intermediate float math.
pub fn backoff_delay(base: Duration, multiplier: f64, max: Duration, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
    let delay_ms = base.as_millis() as f64 * multiplier.powi(exponent as i32);
    let capped_ms = delay_ms.min(max.as_millis() as f64);
    Duration::from_millis(capped_ms as u64)
}

/// Equal jitter: the final delay lands in `[delay/2, delay]`.
fn apply_equal_jitter(delay: Duration) -> Duration {
    let millis = delay.as_millis() as u64;
    if millis < 2 {
        return delay;
    }
    let half = millis / 2;
    let jittered = half + rand::thread_rng().gen_range(0..=half);
    Duration::from_millis(jittered)
}

/// Bookkeeping for one in-flight retried operation.
///
/// Keyed by operation id in the breaker that owns it; created on the first
/// retry and removed on every exit path so entries never outlive the call.
#[derive(Debug, Clone)]
pub struct RetryContext {
    /// Attempts completed so far (1-based; the first failure sets this to 1).
    pub attempt: u32,
    /// Human-readable rendering of the most recent failure.
    pub last_error: Option<String>,
    /// Time elapsed since the operation was first started.
    pub total_elapsed: Duration,
    /// Delay scheduled before the next attempt.
    pub next_retry_delay: Duration,
    pub(crate) started_at: Instant,
}

impl RetryContext {
    pub(crate) fn new(started_at: Instant) -> Self {
        Self {
            attempt: 0,
            last_error: None,
            total_elapsed: Duration::ZERO,
            next_retry_delay: Duration::ZERO,
            started_at,
        }
    }

    pub(crate) fn record_failure(&mut self, now: Instant, error: String, next_delay: Duration) {
        self.attempt += 1;
        self.last_error = Some(error);
        self.total_elapsed = now.duration_since(self.started_at);
        self.next_retry_delay = next_delay;
    }
}
