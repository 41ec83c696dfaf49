//! Circuit breaker with per-call timeout and bounded retry.
//!
//! The breaker wraps a single fallible async operation. Each call races the
//! operation against the configured timeout, retries retryable failures with
//! exponential backoff, and feeds every observed failure into the breaker
//! state machine so breaker health reflects the operation's overall
//! degradation rather than only the final attempt of each call.
//!
//! State machine:
//! - **Closed**: calls run normally; failures accumulate. Successes do not
//!   reset the failure count, so a slow trickle of failures across many
//!   calls still trips the breaker.
//! - **Open**: calls are rejected without running the operation until the
//!   recovery timeout (minus a small tolerance window that absorbs scheduler
//!   jitter) has elapsed.
//! - **HalfOpen**: probe calls run one attempt each, never retried. The
//!   first failed probe re-opens the breaker and re-arms the recovery
//!   timeout; enough successful probes close it and zero the failure count.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::ClassifiedError;

use super::clock::{Clock, SystemClock};
use super::constants::{
    DEFAULT_FAILURE_THRESHOLD, DEFAULT_OPERATION_TIMEOUT, DEFAULT_RECOVERY_TIMEOUT,
    DEFAULT_SUCCESS_THRESHOLD, DEFAULT_TOLERANCE_CAP, DEFAULT_TOLERANCE_FRACTION,
    MIN_FAILURE_THRESHOLD,
};
use super::retry::{RetryConfig, RetryContext};

/// Simple configuration error for validation
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

/// Configuration result type using simple config errors
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Outcome of a protected call that did not succeed.
///
/// Every way a call can fail is a distinct variant, and the variants that
/// originate in the operation keep the original error value, so callers
/// branch on structure instead of matching message strings.
#[derive(Debug, Error)]
pub enum ResilienceError<E>
where
    E: std::error::Error + 'static,
{
    /// The breaker is open; the operation was never invoked.
    #[error("circuit breaker is open, rejecting calls")]
    CircuitOpen {
        /// Time remaining until the breaker will admit a probe.
        retry_after: Option<Duration>,
    },

    /// The operation exceeded the per-attempt timeout.
    #[error("operation timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    /// Every allowed attempt failed; the final failure is attached.
    #[error("retry attempts exhausted after {attempts} tries")]
    Exhausted {
        attempts: u32,
        #[source]
        source: E,
    },

    /// The error's classification forbids retrying.
    #[error("operation failed with non-retryable error")]
    NonRetryable {
        #[source]
        source: E,
    },

    /// The operation failed and the breaker state forbade further attempts
    /// (a failed half-open probe, or the breaker opened mid-sequence).
    #[error("operation failed")]
    OperationFailed {
        #[source]
        source: E,
    },
}

impl<E> ResilienceError<E>
where
    E: std::error::Error + 'static,
{
    /// The original operation error, when this outcome carries one.
    pub fn into_source(self) -> Option<E> {
        match self {
            Self::Exhausted { source, .. }
            | Self::NonRetryable { source }
            | Self::OperationFailed { source } => Some(source),
            Self::CircuitOpen { .. } | Self::Timeout { .. } => None,
        }
    }

    /// Whether this outcome is an open-circuit rejection.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }
}

/// Result type for protected calls
pub type ResilienceResult<T, E> = Result<T, ResilienceError<E>>;

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Circuit is closed, allowing requests
    Closed,
    /// Circuit is open, rejecting requests
    Open,
    /// Circuit is half-open, probing for recovery
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "CLOSED"),
            Self::Open => write!(f, "OPEN"),
            Self::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Accumulated failures that trip the breaker open.
    pub failure_threshold: u32,
    /// Half-open successes needed to close the breaker.
    pub success_threshold: u32,
    /// Time an open breaker waits before admitting a probe.
    pub recovery_timeout: Duration,
    /// Per-attempt timeout for the wrapped operation.
    pub operation_timeout: Duration,
    /// Upper bound on the early-probe tolerance window.
    pub tolerance_cap: Duration,
    /// Fraction of `recovery_timeout` used for the tolerance window.
    pub tolerance_fraction: f64,
    /// Retry policy applied while the breaker is closed.
    pub retry: RetryConfig,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            success_threshold: DEFAULT_SUCCESS_THRESHOLD,
            recovery_timeout: DEFAULT_RECOVERY_TIMEOUT,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
            tolerance_cap: DEFAULT_TOLERANCE_CAP,
            tolerance_fraction: DEFAULT_TOLERANCE_FRACTION,
            retry: RetryConfig::default(),
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a configuration builder.
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.failure_threshold < MIN_FAILURE_THRESHOLD {
            return Err(ConfigError::Invalid {
                message: format!("failure_threshold must be at least {MIN_FAILURE_THRESHOLD}"),
            });
        }
        if self.success_threshold == 0 {
            return Err(ConfigError::Invalid {
                message: "success_threshold must be greater than 0".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.tolerance_fraction) {
            return Err(ConfigError::Invalid {
                message: "tolerance_fraction must be between 0.0 and 1.0".to_string(),
            });
        }
        if self.operation_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                message: "operation_timeout must be non-zero".to_string(),
            });
        }
        self.retry.validate()
    }

    /// Tolerance window allowing a probe slightly before the recovery
    /// timeout elapses, absorbing scheduler jitter.
    pub fn tolerance(&self) -> Duration {
        self.recovery_timeout.mul_f64(self.tolerance_fraction).min(self.tolerance_cap)
    }
}

/// Builder for CircuitBreakerConfig
#[derive(Debug, Default)]
pub struct CircuitBreakerConfigBuilder {
    config: CircuitBreakerConfig,
}

impl CircuitBreakerConfigBuilder {
    pub fn new() -> Self {
        Self { config: CircuitBreakerConfig::default() }
    }

    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.config.failure_threshold = threshold;
        self
    }

    pub fn success_threshold(mut self, threshold: u32) -> Self {
        self.config.success_threshold = threshold;
        self
    }

    pub fn recovery_timeout(mut self, timeout: Duration) -> Self {
        self.config.recovery_timeout = timeout;
        self
    }

    pub fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.config.operation_timeout = timeout;
        self
    }

    pub fn tolerance(mut self, cap: Duration, fraction: f64) -> Self {
        self.config.tolerance_cap = cap;
        self.config.tolerance_fraction = fraction;
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    pub fn build(self) -> ConfigResult<CircuitBreakerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Point-in-time breaker metrics for dashboards and logs.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CircuitBreakerMetrics {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub rejected_count: u64,
    pub total_requests: u64,
    /// Percentage of requests that were not rejected (100 with no traffic).
    pub uptime_percent: f64,
    /// Mean response time of successful calls over all requests.
    pub average_response_time: Duration,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    rejected_count: u64,
    total_requests: u64,
    response_time_sum: Duration,
    last_failure_at: Option<Instant>,
    last_success_at: Option<Instant>,
    next_open_at: Option<Instant>,
}

impl BreakerState {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            rejected_count: 0,
            total_requests: 0,
            response_time_sum: Duration::ZERO,
            last_failure_at: None,
            last_success_at: None,
            next_open_at: None,
        }
    }
}

enum Admission {
    Proceed { half_open: bool },
    Rejected { retry_after: Option<Duration> },
}

/// Circuit breaker protecting one logical operation category.
///
/// All mutation of the breaker state happens behind a single mutex so that
/// concurrent callers observe transitions in the order failures and
/// successes were recorded.
pub struct CircuitBreaker<C: Clock = SystemClock> {
    name: String,
    config: CircuitBreakerConfig,
    state: Mutex<BreakerState>,
    retry_contexts: Mutex<HashMap<String, RetryContext>>,
    clock: C,
}

impl<C: Clock> fmt::Debug for CircuitBreaker<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("config", &self.config)
            .finish()
    }
}

impl CircuitBreaker<SystemClock> {
    /// Create a breaker with the given name and configuration using the
    /// system clock.
    pub fn new<S: Into<String>>(name: S, config: CircuitBreakerConfig) -> ConfigResult<Self> {
        Self::with_clock(name, config, SystemClock)
    }

    /// Create a breaker with default configuration.
    pub fn with_defaults<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            config: CircuitBreakerConfig::default(),
            state: Mutex::new(BreakerState::new()),
            retry_contexts: Mutex::new(HashMap::new()),
            clock: SystemClock,
        }
    }
}

impl<C: Clock> CircuitBreaker<C> {
    /// Create a breaker with a custom clock (useful for testing).
    pub fn with_clock<S: Into<String>>(
        name: S,
        config: CircuitBreakerConfig,
        clock: C,
    ) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self {
            name: name.into(),
            config,
            state: Mutex::new(BreakerState::new()),
            retry_contexts: Mutex::new(HashMap::new()),
            clock,
        })
    }

    /// Breaker name (usually the operation category it protects).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Execute an operation under breaker protection with a generated
    /// operation id.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> ResilienceResult<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: ClassifiedError + 'static,
    {
        let operation_id = Uuid::new_v4().to_string();
        self.execute_keyed(&operation_id, operation).await
    }

    /// Execute an operation under breaker protection.
    ///
    /// The operation id keys this call's retry bookkeeping; unrelated
    /// operations sharing the breaker must use distinct ids.
    #[instrument(skip(self, operation), fields(breaker = %self.name))]
    pub async fn execute_keyed<F, Fut, T, E>(
        &self,
        operation_id: &str,
        mut operation: F,
    ) -> ResilienceResult<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: ClassifiedError + 'static,
    {
        let half_open = match self.try_admit() {
            Admission::Rejected { retry_after } => {
                debug!("circuit breaker '{}' rejecting call", self.name);
                return Err(ResilienceError::CircuitOpen { retry_after });
            }
            Admission::Proceed { half_open } => half_open,
        };

        let started = self.clock.now();
        let max_attempts = if half_open { 1 } else { self.config.retry.max_retries + 1 };
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            // The timeout future owns the timer; dropping it on either
            // branch cancels the timer, so no exit path can leak one.
            match tokio::time::timeout(self.config.operation_timeout, operation()).await {
                Ok(Ok(value)) => {
                    let elapsed = self.clock.now().duration_since(started);
                    self.record_success(elapsed);
                    self.drop_retry_context(operation_id);
                    return Ok(value);
                }
                Ok(Err(error)) => {
                    // Count the failure before deciding on a retry so the
                    // breaker sees every bad attempt, not just the last.
                    self.record_failure();
                    if !error.is_retryable() {
                        self.drop_retry_context(operation_id);
                        return Err(ResilienceError::NonRetryable { source: error });
                    }
                    if half_open {
                        // A single bad probe is enough to re-open.
                        self.drop_retry_context(operation_id);
                        return Err(ResilienceError::OperationFailed { source: error });
                    }
                    if attempt >= max_attempts {
                        self.drop_retry_context(operation_id);
                        return Err(ResilienceError::Exhausted { attempts: attempt, source: error });
                    }
                    if self.state() == CircuitState::Open {
                        // Opened mid-sequence; stop retrying immediately.
                        self.drop_retry_context(operation_id);
                        return Err(ResilienceError::OperationFailed { source: error });
                    }
                    let delay = self.config.retry.delay_for_attempt(attempt);
                    self.note_retry(operation_id, started, error.to_string(), delay);
                    warn!(
                        "operation on '{}' failed (attempt {attempt}), retrying after {delay:?}",
                        self.name
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(_) => {
                    self.record_failure();
                    let timeout = self.config.operation_timeout;
                    if half_open || attempt >= max_attempts || self.state() == CircuitState::Open {
                        self.drop_retry_context(operation_id);
                        return Err(ResilienceError::Timeout { timeout });
                    }
                    let delay = self.config.retry.delay_for_attempt(attempt);
                    self.note_retry(
                        operation_id,
                        started,
                        format!("timed out after {timeout:?}"),
                        delay,
                    );
                    warn!(
                        "operation on '{}' timed out (attempt {attempt}), retrying after {delay:?}",
                        self.name
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Record an externally observed success (for callers that manage their
    /// own execution).
    pub fn record_success(&self, elapsed: Duration) {
        let now = self.clock.now();
        let mut state = self.lock_state();
        state.success_count += 1;
        state.response_time_sum += elapsed;
        state.last_success_at = Some(now);

        if state.state == CircuitState::HalfOpen
            && state.success_count >= self.config.success_threshold
        {
            state.state = CircuitState::Closed;
            state.failure_count = 0;
            state.next_open_at = None;
            info!(
                "circuit breaker '{}' closed after {} successful probes",
                self.name, state.success_count
            );
        }
    }

    /// Record an externally observed failure.
    pub fn record_failure(&self) {
        let now = self.clock.now();
        let mut state = self.lock_state();
        state.failure_count += 1;
        state.last_failure_at = Some(now);

        match state.state {
            CircuitState::Closed if state.failure_count >= self.config.failure_threshold => {
                state.state = CircuitState::Open;
                state.next_open_at = Some(now + self.config.recovery_timeout);
                warn!(
                    "circuit breaker '{}' opened after {} failures",
                    self.name, state.failure_count
                );
            }
            CircuitState::HalfOpen => {
                state.state = CircuitState::Open;
                state.next_open_at = Some(now + self.config.recovery_timeout);
                warn!("circuit breaker '{}' re-opened by failed probe", self.name);
            }
            _ => {}
        }
    }

    /// Get the current state of the circuit breaker
    pub fn state(&self) -> CircuitState {
        self.lock_state().state
    }

    /// Point-in-time metrics snapshot.
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let state = self.lock_state();
        let uptime_percent = if state.total_requests == 0 {
            100.0
        } else {
            (state.total_requests - state.rejected_count) as f64 / state.total_requests as f64
                * 100.0
        };
        let average_response_time = if state.total_requests == 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(
                (state.response_time_sum.as_nanos() / u128::from(state.total_requests)) as u64,
            )
        };
        CircuitBreakerMetrics {
            name: self.name.clone(),
            state: state.state,
            failure_count: state.failure_count,
            success_count: state.success_count,
            rejected_count: state.rejected_count,
            total_requests: state.total_requests,
            uptime_percent,
            average_response_time,
        }
    }

    /// Reset to closed with all counters zeroed and retry bookkeeping
    /// cleared.
    pub fn reset(&self) {
        *self.lock_state() = BreakerState::new();
        self.lock_contexts().clear();
        info!("circuit breaker '{}' manually reset", self.name);
    }

    /// Operator escape hatch: trip the breaker open immediately.
    pub fn force_open(&self) {
        let now = self.clock.now();
        let mut state = self.lock_state();
        state.state = CircuitState::Open;
        state.next_open_at = Some(now + self.config.recovery_timeout);
        warn!("circuit breaker '{}' forced open", self.name);
    }

    /// Retry bookkeeping for an in-flight operation, if any.
    pub fn retry_context(&self, operation_id: &str) -> Option<RetryContext> {
        self.lock_contexts().get(operation_id).cloned()
    }

    /// Number of in-flight retry contexts (empty once all calls settle).
    pub fn retry_context_count(&self) -> usize {
        self.lock_contexts().len()
    }

    fn try_admit(&self) -> Admission {
        let now = self.clock.now();
        let mut state = self.lock_state();
        state.total_requests += 1;

        match state.state {
            CircuitState::Closed => Admission::Proceed { half_open: false },
            CircuitState::HalfOpen => Admission::Proceed { half_open: true },
            CircuitState::Open => {
                let ready = match state.next_open_at {
                    Some(at) => now + self.config.tolerance() >= at,
                    None => true,
                };
                if ready {
                    state.state = CircuitState::HalfOpen;
                    state.success_count = 0;
                    info!("circuit breaker '{}' admitting probe (half-open)", self.name);
                    Admission::Proceed { half_open: true }
                } else {
                    state.rejected_count += 1;
                    let retry_after =
                        state.next_open_at.map(|at| at.saturating_duration_since(now));
                    Admission::Rejected { retry_after }
                }
            }
        }
    }

    fn note_retry(&self, operation_id: &str, started: Instant, error: String, delay: Duration) {
        let now = self.clock.now();
        let mut contexts = self.lock_contexts();
        contexts
            .entry(operation_id.to_string())
            .or_insert_with(|| RetryContext::new(started))
            .record_failure(now, error, delay);
    }

    fn drop_retry_context(&self, operation_id: &str) {
        self.lock_contexts().remove(operation_id);
    }

    fn lock_state(&self) -> MutexGuard<'_, BreakerState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("circuit breaker '{}' state lock poisoned", self.name);
                poisoned.into_inner()
            }
        }
    }

    fn lock_contexts(&self) -> MutexGuard<'_, HashMap<String, RetryContext>> {
        match self.retry_contexts.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("circuit breaker '{}' retry-context lock poisoned", self.name);
                poisoned.into_inner()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ClientError, ErrorSeverity};
    use crate::resilience::clock::MockClock;

    fn retryable_error() -> ClientError {
        ClientError::network(ErrorSeverity::Medium, "connection reset")
    }

    fn non_retryable_error() -> ClientError {
        ClientError::network(ErrorSeverity::Medium, "bad request").retryable(false)
    }

    fn fast_config(failure_threshold: u32) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold,
            success_threshold: 2,
            recovery_timeout: Duration::from_secs(1),
            operation_timeout: Duration::from_millis(50),
            retry: RetryConfig {
                max_retries: 0,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(5),
                multiplier: 2.0,
                jitter: false,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_breaker_starts_closed() {
        let cb = CircuitBreaker::with_defaults("test");
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    /// Validates that the breaker opens once failures reach the threshold.
    ///
    /// Assertions:
    /// - Two failures leave the breaker closed with threshold 3.
    /// - The third failure transitions it to OPEN.
    #[tokio::test]
    async fn test_breaker_opens_at_failure_threshold() {
        let cb = CircuitBreaker::new("test", fast_config(3)).expect("valid config");

        for _ in 0..2 {
            let result: ResilienceResult<(), _> =
                cb.execute(|| async { Err(retryable_error()) }).await;
            assert!(result.is_err());
        }
        assert_eq!(cb.state(), CircuitState::Closed);

        let _: ResilienceResult<(), _> = cb.execute(|| async { Err(retryable_error()) }).await;
        assert_eq!(cb.state(), CircuitState::Open);
    }

    /// Validates that successes never reset the closed-state failure count,
    /// so a slow trickle of failures still trips the breaker.
    #[tokio::test]
    async fn test_success_does_not_reset_failure_count_when_closed() {
        let cb = CircuitBreaker::new("test", fast_config(3)).expect("valid config");

        let _: ResilienceResult<(), _> = cb.execute(|| async { Err(retryable_error()) }).await;
        let _ = cb.execute(|| async { Ok::<_, ClientError>(1) }).await;
        let _: ResilienceResult<(), _> = cb.execute(|| async { Err(retryable_error()) }).await;
        let _ = cb.execute(|| async { Ok::<_, ClientError>(2) }).await;
        assert_eq!(cb.state(), CircuitState::Closed);

        let _: ResilienceResult<(), _> = cb.execute(|| async { Err(retryable_error()) }).await;
        assert_eq!(cb.state(), CircuitState::Open);
    }

    /// Validates rejection while open: the operation must not run and the
    /// rejection must be counted.
    #[tokio::test]
    async fn test_open_breaker_rejects_without_running_operation() {
        let clock = MockClock::new();
        let cb = CircuitBreaker::with_clock("test", fast_config(1), clock).expect("valid config");

        let _: ResilienceResult<(), _> = cb.execute(|| async { Err(retryable_error()) }).await;
        assert_eq!(cb.state(), CircuitState::Open);

        let mut ran = false;
        let result = cb
            .execute(|| {
                ran = true;
                async { Ok::<_, ClientError>(42) }
            })
            .await;

        assert!(matches!(result, Err(ResilienceError::CircuitOpen { .. })));
        assert!(!ran, "rejected call must not invoke the operation");
        assert_eq!(cb.metrics().rejected_count, 1);
    }

    /// Validates the open -> half-open transition through the tolerance
    /// window using a mock clock.
    ///
    /// Assertions:
    /// - Before `recovery_timeout - tolerance`, calls are rejected.
    /// - Within the tolerance window, a probe is admitted and runs.
    #[tokio::test]
    async fn test_half_open_transition_respects_tolerance_window() {
        let clock = MockClock::new();
        // recovery 1s, tolerance = min(50ms, 5% of 1s) = 50ms
        let cb = CircuitBreaker::with_clock("test", fast_config(1), clock.clone())
            .expect("valid config");

        let _: ResilienceResult<(), _> = cb.execute(|| async { Err(retryable_error()) }).await;
        assert_eq!(cb.state(), CircuitState::Open);

        clock.advance_millis(900);
        let result = cb.execute(|| async { Ok::<_, ClientError>(1) }).await;
        assert!(matches!(result, Err(ResilienceError::CircuitOpen { .. })));

        clock.advance_millis(60); // 960ms elapsed, within the 50ms tolerance
        let result = cb.execute(|| async { Ok::<_, ClientError>(1) }).await;
        assert!(result.is_ok());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
    }

    /// Validates that a half-open probe failure re-opens immediately and is
    /// never retried, even with retries configured.
    #[tokio::test]
    async fn test_half_open_failure_reopens_without_retry() {
        let clock = MockClock::new();
        let mut config = fast_config(1);
        config.retry.max_retries = 5;
        let cb = CircuitBreaker::with_clock("test", config, clock.clone()).expect("valid config");

        let _: ResilienceResult<(), _> = cb.execute(|| async { Err(retryable_error()) }).await;
        clock.advance(Duration::from_secs(2));

        let mut invocations = 0u32;
        let result: ResilienceResult<(), _> = cb
            .execute(|| {
                invocations += 1;
                async { Err(retryable_error()) }
            })
            .await;

        assert!(matches!(result, Err(ResilienceError::OperationFailed { .. })));
        assert_eq!(invocations, 1, "half-open probes are never retried");
        assert_eq!(cb.state(), CircuitState::Open);
    }

    /// Validates that enough half-open successes close the breaker and zero
    /// the failure count.
    #[tokio::test]
    async fn test_half_open_successes_close_breaker() {
        let clock = MockClock::new();
        let cb = CircuitBreaker::with_clock("test", fast_config(1), clock.clone())
            .expect("valid config");

        let _: ResilienceResult<(), _> = cb.execute(|| async { Err(retryable_error()) }).await;
        clock.advance(Duration::from_secs(2));

        let _ = cb.execute(|| async { Ok::<_, ClientError>(1) }).await;
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        let _ = cb.execute(|| async { Ok::<_, ClientError>(2) }).await;
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.metrics().failure_count, 0);
    }

    /// Validates the retry loop: retryable failures are retried up to the
    /// limit, every attempt is counted against the breaker, and the final
    /// outcome is the distinct exhausted variant carrying the last error.
    #[tokio::test]
    async fn test_retryable_failures_exhaust_with_distinct_outcome() {
        let mut config = fast_config(10);
        config.retry.max_retries = 2;
        let cb = CircuitBreaker::new("test", config).expect("valid config");

        let mut invocations = 0u32;
        let result: ResilienceResult<(), _> = cb
            .execute(|| {
                invocations += 1;
                async { Err(retryable_error()) }
            })
            .await;

        assert_eq!(invocations, 3, "first attempt plus two retries");
        match result {
            Err(ResilienceError::Exhausted { attempts, source }) => {
                assert_eq!(attempts, 3);
                assert_eq!(source.message(), "connection reset");
            }
            other => panic!("expected Exhausted, got {other:?}"),
        }
        assert_eq!(cb.metrics().failure_count, 3);
        assert_eq!(cb.retry_context_count(), 0, "retry bookkeeping must be cleared");
    }

    /// Validates that non-retryable errors return immediately with the
    /// original error attached.
    #[tokio::test]
    async fn test_non_retryable_error_is_not_retried() {
        let mut config = fast_config(10);
        config.retry.max_retries = 5;
        let cb = CircuitBreaker::new("test", config).expect("valid config");

        let mut invocations = 0u32;
        let result: ResilienceResult<(), _> = cb
            .execute(|| {
                invocations += 1;
                async { Err(non_retryable_error()) }
            })
            .await;

        assert_eq!(invocations, 1);
        match result {
            Err(ResilienceError::NonRetryable { source }) => {
                assert_eq!(source.message(), "bad request");
            }
            other => panic!("expected NonRetryable, got {other:?}"),
        }
        assert_eq!(cb.retry_context_count(), 0);
    }

    /// Validates that retrying stops as soon as the breaker opens
    /// mid-sequence.
    #[tokio::test]
    async fn test_retry_stops_when_breaker_opens_mid_sequence() {
        let mut config = fast_config(2);
        config.retry.max_retries = 10;
        let cb = CircuitBreaker::new("test", config).expect("valid config");

        let mut invocations = 0u32;
        let result: ResilienceResult<(), _> = cb
            .execute(|| {
                invocations += 1;
                async { Err(retryable_error()) }
            })
            .await;

        assert_eq!(invocations, 2, "second failure tripped the breaker");
        assert!(matches!(result, Err(ResilienceError::OperationFailed { .. })));
        assert_eq!(cb.state(), CircuitState::Open);
    }

    /// Validates the timeout race: a hanging operation is cut off, counted
    /// as a failure, and reported with the distinct timeout variant.
    #[tokio::test]
    async fn test_operation_timeout_is_counted_and_reported() {
        let cb = CircuitBreaker::new("test", fast_config(5)).expect("valid config");

        let result: ResilienceResult<u32, ClientError> = cb
            .execute(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(1)
            })
            .await;

        match result {
            Err(ResilienceError::Timeout { timeout }) => {
                assert_eq!(timeout, Duration::from_millis(50));
            }
            other => panic!("expected Timeout, got {other:?}"),
        }
        assert_eq!(cb.metrics().failure_count, 1);
    }

    #[tokio::test]
    async fn test_metrics_uptime_and_average() {
        let cb = CircuitBreaker::new("test", fast_config(1)).expect("valid config");
        assert_eq!(cb.metrics().uptime_percent, 100.0);

        let _: ResilienceResult<(), _> = cb.execute(|| async { Err(retryable_error()) }).await;
        let _ = cb.execute(|| async { Ok::<_, ClientError>(()) }).await; // rejected

        let metrics = cb.metrics();
        assert_eq!(metrics.total_requests, 2);
        assert_eq!(metrics.rejected_count, 1);
        assert!((metrics.uptime_percent - 50.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_reset_returns_to_closed_and_clears_counters() {
        let cb = CircuitBreaker::new("test", fast_config(1)).expect("valid config");
        let _: ResilienceResult<(), _> = cb.execute(|| async { Err(retryable_error()) }).await;
        assert_eq!(cb.state(), CircuitState::Open);

        cb.reset();
        let metrics = cb.metrics();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(metrics.failure_count, 0);
        assert_eq!(metrics.total_requests, 0);
        assert_eq!(cb.retry_context_count(), 0);
    }

    #[tokio::test]
    async fn test_force_open_rejects_next_call() {
        let cb = CircuitBreaker::with_defaults("test");
        cb.force_open();

        let result = cb.execute(|| async { Ok::<_, ClientError>(1) }).await;
        assert!(matches!(result, Err(ResilienceError::CircuitOpen { .. })));
    }

    #[test]
    fn test_config_validation() {
        let config = CircuitBreakerConfig { failure_threshold: 0, ..Default::default() };
        assert!(config.validate().is_err());

        let config = CircuitBreakerConfig { success_threshold: 0, ..Default::default() };
        assert!(config.validate().is_err());

        let config = CircuitBreakerConfig { tolerance_fraction: 1.5, ..Default::default() };
        assert!(config.validate().is_err());

        let config = CircuitBreakerConfig::builder()
            .failure_threshold(6)
            .recovery_timeout(Duration::from_secs(120))
            .build()
            .expect("valid config");
        assert_eq!(config.failure_threshold, 6);
    }

    #[test]
    fn test_tolerance_is_capped() {
        let config = CircuitBreakerConfig {
            recovery_timeout: Duration::from_secs(120),
            ..Default::default()
        };
        // 5% of 120s is far above the 50ms cap
        assert_eq!(config.tolerance(), Duration::from_millis(50));

        let config = CircuitBreakerConfig {
            recovery_timeout: Duration::from_millis(200),
            ..Default::default()
        };
        // 5% of 200ms is below the cap
        assert_eq!(config.tolerance(), Duration::from_millis(10));
    }
}
