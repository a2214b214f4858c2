//! Port interfaces for circuit breakers
//!
//! These types define the boundary between the dispatcher and whatever
//! breaker implementation guards an operation. A breaker only ever sees a
//! type-erased call and a coarse failure category; the caller's typed result
//! stays on the dispatcher's side of the boundary.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use thiserror::Error;
use tripwire_common::CircuitState;

/// Failure reported by a protected call, as seen by the breaker
///
/// The category tells the breaker how to account for the failure. The
/// message is for diagnostics only; the caller receives the original error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtectedFailure {
    #[error("operation failed: {message}")]
    Recoverable { message: String },

    #[error("operation failed unrecoverably: {message}")]
    Unrecoverable { message: String },
}

impl ProtectedFailure {
    /// Whether the operation reported a recoverable failure
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Recoverable { .. })
    }

    /// Diagnostic text describing the failure
    pub fn message(&self) -> &str {
        match self {
            Self::Recoverable { message } | Self::Unrecoverable { message } => message,
        }
    }
}

/// Verdict returned by a breaker that did not complete a call successfully
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    /// The breaker declined to run the call
    #[error("call rejected by open circuit")]
    Rejected {
        /// Time until the breaker expects to admit calls again, when known
        retry_after: Option<Duration>,
    },

    /// The call ran and failed
    #[error(transparent)]
    Failed(#[from] ProtectedFailure),
}

/// A deferred synchronous call handed to a breaker
///
/// Consumed by [`ProtectedCall::run`], so it runs at most once. Dropping it
/// without running it means the call was not attempted.
pub struct ProtectedCall<'a> {
    action: Box<dyn FnOnce() -> Result<(), ProtectedFailure> + 'a>,
}

impl<'a> ProtectedCall<'a> {
    /// Wrap a deferred synchronous action
    pub fn new(action: impl FnOnce() -> Result<(), ProtectedFailure> + 'a) -> Self {
        Self { action: Box::new(action) }
    }

    /// Run the underlying operation
    pub fn run(self) -> Result<(), ProtectedFailure> {
        (self.action)()
    }
}

impl fmt::Debug for ProtectedCall<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtectedCall").finish_non_exhaustive()
    }
}

/// A deferred asynchronous call handed to a breaker
pub struct AsyncProtectedCall<'a> {
    future: BoxFuture<'a, Result<(), ProtectedFailure>>,
}

impl<'a> AsyncProtectedCall<'a> {
    /// Wrap a deferred asynchronous action
    pub fn new(future: impl Future<Output = Result<(), ProtectedFailure>> + Send + 'a) -> Self {
        Self { future: Box::pin(future) }
    }

    /// Run the underlying operation to completion
    pub async fn run(self) -> Result<(), ProtectedFailure> {
        self.future.await
    }
}

impl fmt::Debug for AsyncProtectedCall<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncProtectedCall").finish_non_exhaustive()
    }
}

/// A circuit breaker the dispatcher can route calls through
///
/// One breaker instance is shared by every invocation of the operations it
/// guards, so implementations must tolerate concurrent calls and own all of
/// their synchronization.
///
/// # Contract
/// - Either run the call (exactly once) and report its outcome, or return
///   [`ExecutionError::Rejected`] without running it.
/// - Never report success or [`ExecutionError::Failed`] for a call that did
///   not run. The dispatcher surfaces that as a contract violation.
#[async_trait]
pub trait Breaker: Send + Sync {
    /// Run a synchronous call under protection
    fn execute_protected(&self, call: ProtectedCall<'_>) -> Result<(), ExecutionError>;

    /// Run an asynchronous call under protection
    async fn execute_protected_async(
        &self,
        call: AsyncProtectedCall<'_>,
    ) -> Result<(), ExecutionError>;

    /// Current circuit state, for breakers that expose one
    fn state(&self) -> Option<CircuitState> {
        None
    }
}
