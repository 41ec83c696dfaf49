//! Shared resilience primitives for the Auralis client.
//!
//! This crate is the generic leaf of the workspace: it knows nothing about
//! degradation strategies or recovery orchestration. It provides:
//! - `error`: the error taxonomy (categories, severities, recovery actions)
//!   and the `ClassifiedError` trait every fallible collaborator implements
//! - `resilience`: circuit breaker with timeout and bounded retry, backoff
//!   policy, and a registry of named breaker instances

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod error;
pub mod resilience;

// Re-export commonly used types and traits for convenience
// ------------------------
pub use error::{
    ClassifiedError, ClientError, ErrorCategory, ErrorSeverity, RecoveryAction, RecoveryActionKind,
};
pub use resilience::{
    backoff_delay, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerConfigBuilder,
    CircuitBreakerMetrics, CircuitBreakerRegistry, CircuitState, Clock, ConfigError, ConfigResult,
    MockClock, ResilienceError, ResilienceResult, RetryConfig, RetryContext, SystemClock,
};
