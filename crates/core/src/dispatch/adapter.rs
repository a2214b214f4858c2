//! [`Breaker`] adapter for the reference circuit breaker

use async_trait::async_trait;
use tripwire_common::resilience::{CircuitBreaker, CircuitState, Clock, ResilienceError};

use super::ports::{AsyncProtectedCall, Breaker, ExecutionError, ProtectedCall, ProtectedFailure};

impl From<ResilienceError<ProtectedFailure>> for ExecutionError {
    fn from(error: ResilienceError<ProtectedFailure>) -> Self {
        match error {
            ResilienceError::CircuitOpen { retry_after } => Self::Rejected { retry_after },
            ResilienceError::OperationFailed { source } => Self::Failed(source),
        }
    }
}

/// Both failure categories count against the circuit.
#[async_trait]
impl<C: Clock> Breaker for CircuitBreaker<C> {
    fn execute_protected(&self, call: ProtectedCall<'_>) -> Result<(), ExecutionError> {
        self.call(|| call.run()).map_err(ExecutionError::from)
    }

    async fn execute_protected_async(
        &self,
        call: AsyncProtectedCall<'_>,
    ) -> Result<(), ExecutionError> {
        self.execute(|| call.run()).await.map_err(ExecutionError::from)
    }

    fn state(&self) -> Option<CircuitState> {
        Some(self.get_state())
    }
}
