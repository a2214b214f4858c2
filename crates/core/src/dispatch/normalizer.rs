//! Outcome normalization across the breaker boundary
//!
//! The breaker receives a type-erased call that reports only a
//! [`ProtectedFailure`] category. The typed outcome is parked in a slot owned
//! by the dispatcher and read back once the breaker returns, so the caller
//! gets the operation's own value or error, moved rather than reconstructed.
//!
//! Panics inside the action are caught just long enough to tell the breaker
//! the call failed, then resumed with the original payload.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};

use futures::FutureExt;
use tracing::{debug, warn};

use super::errors::{BreakerContractViolation, CircuitOpen, InvocationError};
use super::operation::{Fault, OperationKey};
use super::ports::{AsyncProtectedCall, ExecutionError, ProtectedCall, ProtectedFailure};

/// What the action actually did
pub(crate) enum Captured<T, E> {
    Returned(T),
    Failed(Fault<E>),
    Panicked(Box<dyn Any + Send>),
}

impl<T, E: fmt::Display> Captured<T, E> {
    fn from_unwind(outcome: Result<Result<T, Fault<E>>, Box<dyn Any + Send>>) -> Self {
        match outcome {
            Ok(Ok(value)) => Self::Returned(value),
            Ok(Err(fault)) => Self::Failed(fault),
            Err(payload) => Self::Panicked(payload),
        }
    }

    /// The breaker-facing view of this outcome
    fn signal(&self) -> Result<(), ProtectedFailure> {
        match self {
            Self::Returned(_) => Ok(()),
            Self::Failed(Fault::Recoverable(error)) => {
                Err(ProtectedFailure::Recoverable { message: error.to_string() })
            }
            Self::Failed(Fault::Unrecoverable(error)) => {
                Err(ProtectedFailure::Unrecoverable { message: error.to_string() })
            }
            Self::Panicked(payload) => {
                Err(ProtectedFailure::Unrecoverable { message: panic_message(payload.as_ref()) })
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_string()
    }
}

/// Wrap a synchronous action for a breaker, recording its outcome in `slot`
pub(crate) fn protect<'a, F, T, E>(
    action: F,
    slot: &'a mut Option<Captured<T, E>>,
) -> ProtectedCall<'a>
where
    F: FnOnce() -> Result<T, Fault<E>> + 'a,
    E: fmt::Display,
{
    ProtectedCall::new(move || {
        let captured = Captured::from_unwind(panic::catch_unwind(AssertUnwindSafe(action)));
        let signal = captured.signal();
        *slot = Some(captured);
        signal
    })
}

/// Wrap an asynchronous action for a breaker, recording its outcome in `slot`
pub(crate) fn protect_async<'a, F, Fut, T, E>(
    action: F,
    slot: &'a mut Option<Captured<T, E>>,
) -> AsyncProtectedCall<'a>
where
    F: FnOnce() -> Fut + Send + 'a,
    Fut: Future<Output = Result<T, Fault<E>>> + Send + 'a,
    T: Send + 'a,
    E: fmt::Display + Send + 'a,
{
    AsyncProtectedCall::new(async move {
        let outcome = AssertUnwindSafe(async move { action().await }).catch_unwind().await;
        let captured = Captured::from_unwind(outcome);
        let signal = captured.signal();
        *slot = Some(captured);
        signal
    })
}

/// Combine the breaker's verdict with what the action did
///
/// If the action ran, its outcome is returned regardless of the verdict. If
/// it did not, only a rejection is a legitimate verdict.
pub(crate) fn resolve<T, E>(
    operation: &OperationKey,
    verdict: Result<(), ExecutionError>,
    slot: Option<Captured<T, E>>,
) -> Result<T, InvocationError<E>> {
    match slot {
        Some(Captured::Panicked(payload)) => {
            debug!(operation = %operation, "Resuming panic from protected operation");
            panic::resume_unwind(payload)
        }
        Some(Captured::Returned(value)) => {
            if let Err(error) = &verdict {
                warn!(
                    operation = %operation,
                    verdict = %error,
                    "Breaker reported a failure for a call that succeeded; keeping the result"
                );
            }
            Ok(value)
        }
        Some(Captured::Failed(fault)) => {
            if !matches!(verdict, Err(ExecutionError::Failed(_))) {
                warn!(
                    operation = %operation,
                    verdict = ?verdict,
                    "Breaker verdict disagrees with the operation's failure; keeping the failure"
                );
            }
            Err(InvocationError::from(fault))
        }
        None => match verdict {
            Err(ExecutionError::Rejected { retry_after }) => {
                debug!(
                    operation = %operation,
                    retry_after = ?retry_after,
                    "Call rejected by breaker"
                );
                Err(InvocationError::Rejected(CircuitOpen {
                    operation: operation.clone(),
                    retry_after,
                }))
            }
            Ok(()) => Err(contract_violation(
                operation,
                "reported success without running the operation".to_string(),
            )),
            Err(ExecutionError::Failed(failure)) => Err(contract_violation(
                operation,
                format!("reported a failure without running the operation ({failure})"),
            )),
        },
    }
}

fn contract_violation<E>(operation: &OperationKey, detail: String) -> InvocationError<E> {
    warn!(operation = %operation, detail = %detail, "Breaker contract violation");
    InvocationError::Unrecoverable(Box::new(BreakerContractViolation {
        operation: operation.clone(),
        detail,
    }))
}
