//! Caller-facing dispatch errors

use std::time::Duration;

use thiserror::Error;
use tripwire_common::{BoxedError, ErrorClassification, ErrorSeverity};

use super::operation::{Fault, OperationKey};

/// The breaker declined to attempt the operation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("circuit open for operation `{operation}`")]
pub struct CircuitOpen {
    pub operation: OperationKey,
    pub retry_after: Option<Duration>,
}

/// A breaker reported an outcome for a call it never ran
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("breaker for operation `{operation}` violated its contract: {detail}")]
pub struct BreakerContractViolation {
    pub operation: OperationKey,
    pub detail: String,
}

/// Error returned to the caller of a dispatched operation
///
/// `Operation` and `Unrecoverable` mean the operation ran and failed; the
/// error is exactly what the operation produced. `Rejected` means it never
/// ran.
#[derive(Debug, Error)]
pub enum InvocationError<E> {
    /// The operation's own recoverable failure
    #[error(transparent)]
    Operation(E),

    /// A fatal failure from the operation, or a misbehaving breaker
    #[error("{0}")]
    Unrecoverable(BoxedError),

    /// The breaker vetoed the call
    #[error(transparent)]
    Rejected(#[from] CircuitOpen),
}

impl<E> InvocationError<E> {
    /// Whether the breaker declined to run the operation
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }

    /// The operation's own error, if that is what this is
    pub fn operation_error(&self) -> Option<&E> {
        match self {
            Self::Operation(error) => Some(error),
            _ => None,
        }
    }

    /// Take the operation's own error, if that is what this is
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            Self::Operation(error) => Some(error),
            _ => None,
        }
    }
}

impl<E> From<Fault<E>> for InvocationError<E> {
    fn from(fault: Fault<E>) -> Self {
        match fault {
            Fault::Recoverable(error) => Self::Operation(error),
            Fault::Unrecoverable(error) => Self::Unrecoverable(error),
        }
    }
}

impl<E: ErrorClassification> ErrorClassification for InvocationError<E> {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Operation(error) => error.is_retryable(),
            Self::Unrecoverable(_) => false,
            Self::Rejected(_) => true,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Operation(error) => error.severity(),
            Self::Unrecoverable(_) => ErrorSeverity::Critical,
            Self::Rejected(_) => ErrorSeverity::Warning,
        }
    }

    fn is_critical(&self) -> bool {
        match self {
            Self::Operation(error) => error.is_critical(),
            Self::Unrecoverable(_) => true,
            Self::Rejected(_) => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Operation(error) => error.retry_after(),
            Self::Unrecoverable(_) => None,
            Self::Rejected(open) => open.retry_after,
        }
    }
}
