//! Integration tests for the dispatcher
//!
//! Tests routing, failure preservation, rejection, mapping swaps, panics and
//! misbehaving breakers, for both sync and async invocations.

mod support;

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use futures::FutureExt;
use support::{
    CallCounter, InsufficientFundsError, LedgerCorrupted, Script, ScriptedBreaker,
    SCRIPTED_RETRY_AFTER,
};
use tripwire_common::{CircuitBreaker, CircuitBreakerConfig, CircuitState, MockClock};
use tripwire_core::{
    Breaker, BreakerContractViolation, BreakerRegistry, Dispatcher, Fault, Invocation,
    InvocationError, ProtectedFailure,
};

type PaymentResult<T> = Result<T, InvocationError<InsufficientFundsError>>;

fn insufficient() -> InsufficientFundsError {
    InsufficientFundsError { balance: 10, requested: 25 }
}

fn dispatcher_with(key: &str, breaker: Arc<dyn Breaker>) -> Dispatcher {
    Dispatcher::new(BreakerRegistry::builder().protect(key, breaker).build())
}

fn payments_breaker(clock: &MockClock) -> Arc<CircuitBreaker<MockClock>> {
    let breaker = CircuitBreakerConfig::builder()
        .failure_threshold(3)
        .success_threshold(1)
        .half_open_max_calls(1)
        .timeout(Duration::from_secs(30))
        .clock(clock.clone())
        .build()
        .expect("valid breaker config");
    Arc::new(breaker)
}

// ============================================================================
// Routing
// ============================================================================

/// Validates that operations without a breaker run exactly once and return
/// their outcome unchanged, even when other operations are protected.
///
/// # Test Steps
/// 1. Protect `charge` with a breaker that rejects everything
/// 2. Invoke unprotected `refund` successfully and with a failure
/// 3. Verify each action ran once and the rejecting breaker saw nothing
#[test]
fn test_unmapped_operation_passes_through() {
    let breaker = ScriptedBreaker::new(Script::Reject);
    let dispatcher = dispatcher_with("charge", breaker.clone());
    let counter = CallCounter::default();

    let ok: PaymentResult<u64> = dispatcher.call("refund", || {
        counter.hit();
        Ok(5)
    });
    assert_eq!(ok.ok(), Some(5));

    let failed: PaymentResult<u64> = dispatcher.call("refund", || {
        counter.hit();
        Err(insufficient().into())
    });
    let error = failed.err().and_then(InvocationError::into_operation_error);
    assert_eq!(error, Some(insufficient()));

    assert_eq!(counter.count(), 2);
    assert_eq!(breaker.calls(), 0);
}

#[test]
fn test_protected_success_returns_exact_value() {
    let clock = MockClock::new();
    let breaker = payments_breaker(&clock);
    let dispatcher = dispatcher_with("charge", breaker.clone());

    let result: PaymentResult<String> =
        dispatcher.call("charge", || Ok("receipt-42".to_string()));

    assert_eq!(result.ok().as_deref(), Some("receipt-42"));
    assert_eq!(breaker.metrics().success_count, 1);
}

/// Validates that a recoverable failure under protection reaches the caller
/// as the same value, not a wrapper.
///
/// Assertions:
/// - The caller gets `InvocationError::Operation` holding an equal value.
/// - The breaker saw a recoverable failure.
#[test]
fn test_recoverable_failure_keeps_identity() {
    let breaker = ScriptedBreaker::new(Script::Run);
    let dispatcher = dispatcher_with("charge", breaker.clone());

    let result: PaymentResult<()> =
        dispatcher.invoke(Invocation::recoverable("charge", || Err(insufficient())));

    match result {
        Err(InvocationError::Operation(error)) => assert_eq!(error, insufficient()),
        other => panic!("expected the original error, got {other:?}"),
    }
    assert_eq!(
        breaker.failures(),
        vec![ProtectedFailure::Recoverable { message: insufficient().to_string() }]
    );
}

/// Validates that a rejecting breaker never runs the action.
///
/// Assertions:
/// - The caller sees `Rejected` naming the operation with the breaker's hint.
/// - The action counter stays at zero.
#[test]
fn test_rejecting_breaker_skips_action() {
    let breaker = ScriptedBreaker::new(Script::Reject);
    let dispatcher = dispatcher_with("charge", breaker.clone());
    let counter = CallCounter::default();

    let result: PaymentResult<u64> = dispatcher.call("charge", || {
        counter.hit();
        Ok(42)
    });

    match result {
        Err(InvocationError::Rejected(open)) => {
            assert_eq!(open.operation.as_str(), "charge");
            assert_eq!(open.retry_after, Some(SCRIPTED_RETRY_AFTER));
        }
        other => panic!("expected rejection, got {other:?}"),
    }
    assert_eq!(counter.count(), 0);
    assert_eq!(breaker.calls(), 1);
}

// ============================================================================
// Mapping Swaps
// ============================================================================

/// Validates that invocations after `set_mappings` use only the new mapping.
///
/// # Test Steps
/// 1. Start with `charge` guarded by a rejecting breaker
/// 2. Swap in a mapping guarding `charge` with a running breaker
/// 3. Verify the next call runs through the new breaker only
#[test]
fn test_set_mappings_uses_new_mapping_only() {
    let old = ScriptedBreaker::new(Script::Reject);
    let new = ScriptedBreaker::new(Script::Run);
    let dispatcher = dispatcher_with("charge", old.clone());

    let before: PaymentResult<u64> = dispatcher.call("charge", || Ok(1));
    assert!(before.is_err_and(|error| error.is_rejected()));

    dispatcher.set_mappings(BreakerRegistry::builder().protect("charge", new.clone()).build());

    let after: PaymentResult<u64> = dispatcher.call("charge", || Ok(2));
    assert_eq!(after.ok(), Some(2));
    assert_eq!(old.calls(), 1);
    assert_eq!(new.calls(), 1);
}

/// Validates that readers never observe a half-installed mapping while
/// another thread swaps registries.
///
/// Both registries map `charge` and `refund` to one shared breaker, so any
/// snapshot mixing the two would pair different breakers.
#[test]
fn test_concurrent_swaps_are_atomic() {
    let first: Arc<dyn Breaker> = ScriptedBreaker::new(Script::Run);
    let second: Arc<dyn Breaker> = ScriptedBreaker::new(Script::Run);
    let registry_for = |breaker: &Arc<dyn Breaker>| {
        BreakerRegistry::builder().protect_all(["charge", "refund"], Arc::clone(breaker)).build()
    };
    let dispatcher = Dispatcher::new(registry_for(&first));

    thread::scope(|scope| {
        scope.spawn(|| {
            for round in 0..500 {
                let next = if round % 2 == 0 { &second } else { &first };
                dispatcher.set_mappings(registry_for(next));
            }
        });

        for _ in 0..4 {
            scope.spawn(|| {
                for _ in 0..500 {
                    let snapshot = dispatcher.mappings();
                    let charge = snapshot.get("charge").expect("charge is protected");
                    let refund = snapshot.get("refund").expect("refund is protected");
                    assert!(Arc::ptr_eq(charge, refund));

                    let result: PaymentResult<u8> = dispatcher.call("refund", || Ok(1));
                    assert_eq!(result.ok(), Some(1));
                }
            });
        }
    });
}

// ============================================================================
// Payment Scenario
// ============================================================================

/// Validates the end-to-end payment scenario.
///
/// # Test Steps
/// 1. Map `charge` to a closed reference breaker
/// 2. Charge successfully and verify the breaker recorded a success
/// 3. Refund (unmapped) with an insufficient-funds failure and verify it is
///    returned unmodified
/// 4. Force the breaker open and verify `charge` is rejected without running
/// 5. Let the timeout pass and verify `charge` works again
#[test]
fn test_payment_scenario() {
    let clock = MockClock::new();
    let breaker_a = payments_breaker(&clock);
    let dispatcher = dispatcher_with("charge", breaker_a.clone());
    let charges = CallCounter::default();
    let charge = || {
        charges.hit();
        Ok::<_, Fault<InsufficientFundsError>>(42)
    };

    assert_eq!(dispatcher.call("charge", charge).ok(), Some(42));
    assert_eq!(breaker_a.metrics().success_count, 1);
    assert_eq!(breaker_a.state(), CircuitState::Closed);

    let refund: PaymentResult<()> =
        dispatcher.invoke(Invocation::recoverable("refund", || Err(insufficient())));
    let error = refund.err().and_then(InvocationError::into_operation_error);
    assert_eq!(error, Some(insufficient()));

    breaker_a.trip();
    let rejected = dispatcher.call("charge", charge);
    assert!(rejected.is_err_and(|error| error.is_rejected()));
    assert_eq!(charges.count(), 1);

    clock.advance(Duration::from_secs(30));
    assert_eq!(dispatcher.call("charge", charge).ok(), Some(42));
    assert_eq!(breaker_a.state(), CircuitState::Closed);
    assert_eq!(charges.count(), 2);
}

// ============================================================================
// Unrecoverable Failures and Panics
// ============================================================================

/// Validates that unrecoverable failures reach the caller unchanged with and
/// without a breaker, and count against the breaker.
#[test]
fn test_unrecoverable_failure_is_preserved() {
    let clock = MockClock::new();
    let breaker = payments_breaker(&clock);
    let dispatcher = dispatcher_with("charge", breaker.clone());

    for key in ["charge", "refund"] {
        let result: PaymentResult<()> =
            dispatcher.call(key, || Err(Fault::unrecoverable(LedgerCorrupted { entry: 7 })));

        match result {
            Err(InvocationError::Unrecoverable(error)) => {
                assert_eq!(
                    error.downcast_ref::<LedgerCorrupted>(),
                    Some(&LedgerCorrupted { entry: 7 })
                );
            }
            other => panic!("expected unrecoverable failure for {key}, got {other:?}"),
        }
    }

    assert_eq!(breaker.metrics().failure_count, 1);
}

/// Validates that a panic under protection is recorded as a failure and then
/// resumes with the original payload.
///
/// Assertions:
/// - The payload caught by the caller is the original `String`.
/// - The breaker saw an unrecoverable failure.
/// - The dispatcher keeps working afterwards.
#[test]
fn test_panic_resumes_after_breaker_records_failure() {
    let breaker = ScriptedBreaker::new(Script::Run);
    let dispatcher = dispatcher_with("charge", breaker.clone());

    let payload = panic::catch_unwind(AssertUnwindSafe(|| {
        let _: PaymentResult<()> =
            dispatcher.call("charge", || panic!("{}", String::from("gateway exploded")));
    }))
    .expect_err("panic should propagate");

    assert_eq!(payload.downcast_ref::<String>().map(String::as_str), Some("gateway exploded"));
    assert_eq!(
        breaker.failures(),
        vec![ProtectedFailure::Unrecoverable { message: "panicked: gateway exploded".into() }]
    );

    let after: PaymentResult<u8> = dispatcher.call("charge", || Ok(1));
    assert_eq!(after.ok(), Some(1));
}

#[test]
fn test_panic_trips_reference_breaker() {
    let clock = MockClock::new();
    let breaker = payments_breaker(&clock);
    let dispatcher = dispatcher_with("charge", breaker.clone());

    for _ in 0..3 {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let _: PaymentResult<()> = dispatcher.call("charge", || panic!("boom"));
        }));
        assert!(outcome.is_err());
    }

    assert_eq!(breaker.state(), CircuitState::Open);
}

// ============================================================================
// Contract Violations
// ============================================================================

/// Validates that breakers reporting an outcome for a call they never ran
/// produce a contract violation rather than a rejection or a fake result.
#[test]
fn test_contract_violations_are_unrecoverable() {
    for script in [Script::ClaimSuccess, Script::ClaimFailure] {
        let breaker = ScriptedBreaker::new(script);
        let dispatcher = dispatcher_with("charge", breaker);
        let counter = CallCounter::default();

        let result: PaymentResult<u64> = dispatcher.call("charge", || {
            counter.hit();
            Ok(42)
        });

        match result {
            Err(InvocationError::Unrecoverable(error)) => {
                let violation = error
                    .downcast_ref::<BreakerContractViolation>()
                    .expect("contract violation");
                assert_eq!(violation.operation.as_str(), "charge");
            }
            other => panic!("expected contract violation for {script:?}, got {other:?}"),
        }
        assert_eq!(counter.count(), 0);
    }
}

// ============================================================================
// Async Dispatch
// ============================================================================

#[tokio::test]
async fn test_async_pass_through_and_identity() {
    let breaker = ScriptedBreaker::new(Script::Run);
    let dispatcher = dispatcher_with("charge", breaker.clone());

    let refund = Invocation::new("refund", || async { Err(Fault::Recoverable(insufficient())) });
    let unprotected: PaymentResult<()> = dispatcher.invoke_async(refund).await;
    assert_eq!(
        unprotected.err().and_then(InvocationError::into_operation_error),
        Some(insufficient())
    );
    assert_eq!(breaker.calls(), 0);

    let charge = Invocation::new("charge", || async { Err(Fault::Recoverable(insufficient())) });
    let protected: PaymentResult<()> = dispatcher.invoke_async(charge).await;
    assert_eq!(
        protected.err().and_then(InvocationError::into_operation_error),
        Some(insufficient())
    );
    assert_eq!(breaker.calls(), 1);
}

/// Validates async rejection and recovery against the reference breaker.
///
/// # Test Steps
/// 1. Succeed once through the async path
/// 2. Trip the breaker and verify the next async call is rejected unrun
/// 3. Advance the clock and verify calls are admitted again
#[tokio::test(flavor = "multi_thread")]
async fn test_async_rejection_and_recovery() {
    let clock = MockClock::new();
    let breaker = payments_breaker(&clock);
    let dispatcher = Arc::new(dispatcher_with("charge", breaker.clone()));
    let counter = Arc::new(CallCounter::default());

    let charge = |counter: Arc<CallCounter>| {
        Invocation::new("charge", move || async move {
            counter.hit();
            Ok::<_, Fault<InsufficientFundsError>>(42)
        })
    };

    assert_eq!(dispatcher.invoke_async(charge(Arc::clone(&counter))).await.ok(), Some(42));

    breaker.trip();
    let rejected = dispatcher.invoke_async(charge(Arc::clone(&counter))).await;
    assert!(rejected.is_err_and(|error| error.is_rejected()));
    assert_eq!(counter.count(), 1);

    clock.advance(Duration::from_secs(30));
    let task = {
        let dispatcher = Arc::clone(&dispatcher);
        let invocation = charge(Arc::clone(&counter));
        tokio::spawn(async move { dispatcher.invoke_async(invocation).await })
    };
    assert_eq!(task.await.expect("task should not panic").ok(), Some(42));
    assert_eq!(counter.count(), 2);
}

/// Validates that a protected async call dropped mid-flight is accounted
/// for, so a half-open circuit can still recover.
///
/// # Test Steps
/// 1. Trip the breaker and let the timeout elapse
/// 2. Cancel the only trial call with `tokio::time::timeout`
/// 3. Verify the circuit re-opened, then recovers after another timeout
#[tokio::test]
async fn test_cancelled_async_trial_does_not_wedge_breaker() {
    let clock = MockClock::new();
    let breaker = payments_breaker(&clock);
    let dispatcher = dispatcher_with("charge", breaker.clone());

    breaker.trip();
    clock.advance(Duration::from_secs(30));

    let slow = Invocation::new("charge", || async {
        tokio::time::sleep(Duration::from_secs(10)).await;
        Ok::<_, Fault<InsufficientFundsError>>(1)
    });
    let cancelled =
        tokio::time::timeout(Duration::from_millis(10), dispatcher.invoke_async(slow)).await;
    assert!(cancelled.is_err());
    assert_eq!(breaker.get_state(), CircuitState::Open);

    clock.advance(Duration::from_secs(30));
    let charge =
        Invocation::new("charge", || async { Ok::<_, Fault<InsufficientFundsError>>(2_u32) });
    let recovered = dispatcher.invoke_async(charge).await;
    assert_eq!(recovered.ok(), Some(2));
    assert_eq!(breaker.get_state(), CircuitState::Closed);
}

#[tokio::test]
async fn test_async_panic_resumes() {
    let breaker = ScriptedBreaker::new(Script::Run);
    let dispatcher = dispatcher_with("charge", breaker.clone());

    let outcome = AssertUnwindSafe(dispatcher.invoke_async(Invocation::new("charge", || async {
        if gateway_down() {
            panic!("async gateway exploded");
        }
        Ok::<(), Fault<InsufficientFundsError>>(())
    })))
    .catch_unwind()
    .await;

    let payload = outcome.expect_err("panic should propagate");
    assert_eq!(payload.downcast_ref::<&str>(), Some(&"async gateway exploded"));
    assert!(matches!(breaker.failures().as_slice(), [ProtectedFailure::Unrecoverable { .. }]));
}

fn gateway_down() -> bool {
    true
}
