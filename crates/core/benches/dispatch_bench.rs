//! Dispatcher benchmarks
//!
//! Compares the unprotected pass-through path with dispatch through a
//! closed breaker and rejection by an open one, plus the async path.
//!
//! Run with: `cargo bench --bench dispatch_bench -p tripwire-core`

use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tokio::runtime::Builder as RuntimeBuilder;
use tripwire_common::resilience::{CircuitBreaker, CircuitBreakerConfigBuilder, MockClock};
use tripwire_core::{BreakerRegistry, Dispatcher, Fault, Invocation, InvocationError};

type BenchResult<T> = Result<T, InvocationError<std::io::Error>>;

fn dispatcher() -> Dispatcher {
    let open = CircuitBreakerConfigBuilder::new()
        .failure_threshold(1)
        .timeout(Duration::from_secs(60))
        .clock(MockClock::new())
        .build()
        .expect("valid circuit breaker config for benchmarks");
    open.trip();

    let registry = BreakerRegistry::builder()
        .protect("charge", Arc::new(CircuitBreaker::with_defaults()))
        .protect("refund", Arc::new(open))
        .build();
    Dispatcher::new(registry)
}

// ============================================================================
// Sync Dispatch Benchmarks
// ============================================================================

fn bench_dispatch_sync_paths(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch_sync_paths");
    let dispatcher = dispatcher();

    group.bench_function("pass_through", |b| {
        b.iter(|| {
            let result: BenchResult<u64> = dispatcher.call("lookup", || Ok(black_box(42)));
            black_box(result)
        });
    });

    group.bench_function("protected_success", |b| {
        b.iter(|| {
            let result: BenchResult<u64> = dispatcher.call("charge", || Ok(black_box(42)));
            black_box(result)
        });
    });

    group.bench_function("protected_rejected", |b| {
        b.iter(|| {
            let result: BenchResult<u64> = dispatcher.call("refund", || Ok(black_box(42)));
            black_box(result)
        });
    });

    group.bench_function("protected_failure_identity", |b| {
        let config = CircuitBreakerConfigBuilder::new()
            .failure_threshold(u64::MAX)
            .build()
            .expect("valid circuit breaker config for benchmarks");
        let failing = CircuitBreaker::new(config).expect("valid circuit breaker");
        let dispatcher = Dispatcher::new(
            BreakerRegistry::builder().protect("charge", Arc::new(failing)).build(),
        );
        b.iter(|| {
            let result: BenchResult<()> = dispatcher.call("charge", || {
                Err(Fault::Recoverable(std::io::Error::other(black_box("declined"))))
            });
            black_box(result)
        });
    });

    group.finish();
}

// ============================================================================
// Async Dispatch Benchmarks
// ============================================================================

fn bench_dispatch_async(c: &mut Criterion) {
    let runtime = RuntimeBuilder::new_current_thread()
        .enable_all()
        .build()
        .expect("tokio runtime for benchmarks");
    let dispatcher = dispatcher();

    c.bench_function("dispatch_async_protected_success", |b| {
        b.to_async(&runtime).iter(|| async {
            let invocation = Invocation::new("charge", || async { Ok(black_box(42_u64)) });
            let result: BenchResult<u64> = dispatcher.invoke_async(invocation).await;
            black_box(result)
        });
    });
}

criterion_group!(benches, bench_dispatch_sync_paths, bench_dispatch_async);
criterion_main!(benches);
