//! Integration tests for the resilience primitives
//!
//! Exercises the circuit breaker, backoff, and registry through the public
//! crate surface with realistic failure sequences.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use auralis_common::resilience::{
    backoff_delay, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry, CircuitState,
    MockClock, ResilienceError, RetryConfig,
};
use auralis_common::{ClientError, ErrorSeverity};

fn test_config(failure_threshold: u32, max_retries: u32) -> CircuitBreakerConfig {
    CircuitBreakerConfig {
        failure_threshold,
        success_threshold: 2,
        recovery_timeout: Duration::from_secs(1),
        operation_timeout: Duration::from_millis(100),
        retry: RetryConfig {
            max_retries,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            multiplier: 2.0,
            jitter: false,
        },
        ..Default::default()
    }
}

/// Validates the full breaker lifecycle: trip on threshold, reject while
/// open, probe after the recovery timeout.
///
/// # Test Steps
/// 1. Configure a breaker with `failure_threshold = 3` and no retries
/// 2. Fail three calls and verify the breaker opens
/// 3. Verify a fourth call is rejected without running the operation
/// 4. Advance past the recovery timeout
/// 5. Verify the fifth call runs as a half-open probe
#[tokio::test(flavor = "multi_thread")]
async fn test_breaker_lifecycle_trip_reject_probe() {
    let clock = MockClock::new();
    let breaker =
        CircuitBreaker::with_clock("lifecycle", test_config(3, 0), clock.clone()).expect("config");

    for _ in 0..3 {
        let result: Result<(), _> = breaker
            .execute(|| async { Err(ClientError::network(ErrorSeverity::High, "fetch failed")) })
            .await;
        assert!(result.is_err());
    }
    assert_eq!(breaker.state(), CircuitState::Open);

    let ran = Arc::new(AtomicU32::new(0));
    let ran_clone = Arc::clone(&ran);
    let rejected = breaker
        .execute(move || {
            ran_clone.fetch_add(1, Ordering::SeqCst);
            async move { Ok::<_, ClientError>(()) }
        })
        .await;
    assert!(matches!(rejected, Err(ResilienceError::CircuitOpen { .. })));
    assert_eq!(ran.load(Ordering::SeqCst), 0, "open breaker must not run the operation");

    clock.advance(Duration::from_secs(2));

    let probe = breaker.execute(|| async { Ok::<_, ClientError>(42) }).await;
    assert_eq!(probe.expect("probe should run"), 42);
    assert_eq!(breaker.state(), CircuitState::HalfOpen);
}

/// Validates that transient failures are retried until success and the
/// breaker still counts every failed attempt.
///
/// # Test Steps
/// 1. Configure three retries with a high failure threshold
/// 2. Fail the first two attempts, succeed on the third
/// 3. Verify the call resolves successfully after exactly three attempts
/// 4. Verify both failed attempts were recorded against the breaker
#[tokio::test(flavor = "multi_thread")]
async fn test_transient_failures_recover_within_retry_budget() {
    let breaker = CircuitBreaker::new("transient", test_config(10, 3)).expect("config");

    let attempts = Arc::new(AtomicU32::new(0));
    let attempts_clone = Arc::clone(&attempts);

    let result = breaker
        .execute(move || {
            let attempts = Arc::clone(&attempts_clone);
            async move {
                if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(ClientError::network(ErrorSeverity::Medium, "transient"))
                } else {
                    Ok("recovered")
                }
            }
        })
        .await;

    assert_eq!(result.expect("should recover"), "recovered");
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    let metrics = breaker.metrics();
    assert_eq!(metrics.failure_count, 2);
    assert_eq!(metrics.total_requests, 1, "retries belong to one protected call");
    assert_eq!(breaker.retry_context_count(), 0);
}

/// Validates the documented backoff curve through the public helper.
#[test]
fn test_backoff_curve_matches_formula() {
    let base = Duration::from_millis(500);
    let max = Duration::from_secs(30);
    let expected = [500u64, 1_000, 2_000, 4_000, 8_000, 16_000, 30_000, 30_000];
    for (i, expected_ms) in expected.iter().enumerate() {
        let attempt = (i + 1) as u32;
        assert_eq!(
            backoff_delay(base, 2.0, max, attempt),
            Duration::from_millis(*expected_ms),
            "attempt {attempt}"
        );
    }
}

/// Validates that a registry hands out one shared breaker per category and
/// keeps categories isolated.
///
/// # Test Steps
/// 1. Create breakers for two categories through the registry
/// 2. Trip the first category's breaker
/// 3. Verify the second category still executes normally
/// 4. Verify `reset_all` restores the tripped breaker
#[tokio::test(flavor = "multi_thread")]
async fn test_registry_isolates_categories() {
    let registry = CircuitBreakerRegistry::new();

    let network = registry.get_or_create("network_recovery", test_config(1, 0)).expect("config");
    let audio =
        registry.get_or_create("audio_context_recovery", test_config(3, 0)).expect("config");

    let _: Result<(), _> = network
        .execute(|| async { Err(ClientError::network(ErrorSeverity::High, "offline")) })
        .await;
    assert_eq!(network.state(), CircuitState::Open);

    let ok = audio.execute(|| async { Ok::<_, ClientError>("context resumed") }).await;
    assert!(ok.is_ok());
    assert_eq!(audio.state(), CircuitState::Closed);

    registry.reset_all();
    assert_eq!(network.state(), CircuitState::Closed);

    let same = registry.get_or_create("network_recovery", test_config(9, 9)).expect("config");
    assert!(Arc::ptr_eq(&network, &same), "registry must be idempotent by name");
}

/// Validates that concurrent callers sharing one breaker observe a
/// consistent failure count and a single open transition.
#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_callers_share_breaker_state() {
    let breaker = Arc::new(CircuitBreaker::new("shared", test_config(8, 0)).expect("config"));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let breaker = Arc::clone(&breaker);
        handles.push(tokio::spawn(async move {
            let _: Result<(), _> = breaker
                .execute(|| async { Err(ClientError::resource(ErrorSeverity::High, "oom")) })
                .await;
        }));
    }
    for handle in handles {
        handle.await.expect("task");
    }

    let metrics = breaker.metrics();
    assert_eq!(metrics.total_requests, 8);
    assert_eq!(breaker.state(), CircuitState::Open);
}
