//! Resilience primitives for fault tolerance
//!
//! This module provides the generic building blocks the recovery layer is
//! assembled from:
//! - **Circuit breaker**: detects repeated failures per operation category
//!   and stops calls before they cascade, with per-call timeout and bounded
//!   retry built into the protected execution path
//! - **Backoff policy**: exponential backoff with optional jitter, shared by
//!   the breaker and by callers that sequence their own attempts
//! - **Registry**: lazily created named breaker instances with aggregate
//!   metrics and bulk reset
//!
//! Everything here is generic over the error type via the
//! [`ClassifiedError`](crate::error::ClassifiedError) trait; nothing in this
//! module knows about degradation strategies or recovery orchestration.

pub mod circuit_breaker;
pub mod clock;
pub mod constants;
pub mod registry;
pub mod retry;

// Re-export breaker types
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerConfigBuilder, CircuitBreakerMetrics,
    CircuitState, ConfigError, ConfigResult, ResilienceError, ResilienceResult,
};
pub use clock::{Clock, MockClock, SystemClock};
pub use registry::CircuitBreakerRegistry;
pub use retry::{backoff_delay, RetryConfig, RetryContext};
