//! Resilience primitive benchmarks
//!
//! Benchmarks for the circuit breaker execution paths, open-state
//! short-circuiting, and backoff calculation.
//!
//! Run with: `cargo bench --bench resilience_bench -p auralis-common`

use std::time::Duration;

use auralis_common::resilience::{
    backoff_delay, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry, RetryConfig,
};
use auralis_common::{ClientError, ErrorSeverity};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tokio::runtime::Builder as RuntimeBuilder;

fn bench_config() -> CircuitBreakerConfig {
    CircuitBreakerConfig {
        failure_threshold: 5,
        recovery_timeout: Duration::from_secs(60),
        operation_timeout: Duration::from_secs(1),
        retry: RetryConfig { max_retries: 0, jitter: false, ..Default::default() },
        ..Default::default()
    }
}

fn bench_breaker_execute(c: &mut Criterion) {
    let runtime = RuntimeBuilder::new_current_thread()
        .enable_time()
        .build()
        .expect("benchmark runtime");

    let mut group = c.benchmark_group("circuit_breaker_execute");

    group.bench_function("success_path", |b| {
        let breaker = CircuitBreaker::new("bench", bench_config()).expect("config");
        b.iter(|| {
            let result = runtime
                .block_on(breaker.execute(|| async { Ok::<_, ClientError>(black_box(1)) }));
            let _ = black_box(result);
        });
    });

    group.bench_function("open_short_circuit", |b| {
        let breaker = CircuitBreaker::new("bench_open", bench_config()).expect("config");
        breaker.force_open();
        b.iter(|| {
            let result = runtime
                .block_on(breaker.execute(|| async { Ok::<_, ClientError>(black_box(1)) }));
            let _ = black_box(result);
        });
    });

    group.bench_function("failure_accounting", |b| {
        b.iter(|| {
            let breaker = CircuitBreaker::new("bench_fail", bench_config()).expect("config");
            for _ in 0..5 {
                let result: Result<(), _> = runtime.block_on(breaker.execute(|| async {
                    Err(ClientError::network(ErrorSeverity::Medium, "bench failure"))
                }));
                let _ = black_box(result);
            }
            black_box(breaker.state());
        });
    });

    group.finish();
}

fn bench_backoff(c: &mut Criterion) {
    let mut group = c.benchmark_group("backoff");

    group.bench_function("delay_curve", |b| {
        let base = Duration::from_millis(500);
        let max = Duration::from_secs(30);
        b.iter(|| {
            for attempt in 1..=10u32 {
                black_box(backoff_delay(black_box(base), 2.0, max, attempt));
            }
        });
    });

    group.finish();
}

fn bench_registry(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry");

    group.bench_function("get_or_create_hot", |b| {
        let registry = CircuitBreakerRegistry::new();
        registry.get_or_create("network_recovery", bench_config()).expect("config");
        b.iter(|| {
            let breaker = registry
                .get_or_create(black_box("network_recovery"), bench_config())
                .expect("config");
            black_box(breaker.state());
        });
    });

    group.finish();
}

criterion_group!(benches, bench_breaker_execute, bench_backoff, bench_registry);
criterion_main!(benches);
