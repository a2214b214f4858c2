//! Resilience primitives for fault isolation
//!
//! This module provides the reference **circuit breaker** used by the
//! dispatch core, together with the [`Clock`] abstraction that keeps its
//! timeout behaviour deterministic under test.
//!
//! The breaker is generic over the operation's error type and knows nothing
//! about operation names or dispatch. Callers that need a breaker behind a
//! trait object (the dispatcher does) adapt it at their own seam.

pub mod circuit_breaker;
pub mod clock;

// Re-export circuit breaker types
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerBuilderWithClock, CircuitBreakerConfig,
    CircuitBreakerConfigBuilder, CircuitBreakerMetrics, CircuitState, ConfigError, ConfigResult,
    ResilienceError, ResilienceResult, SyncCircuitBreaker,
};
pub use clock::{Clock, MockClock, SystemClock};

#[cfg(feature = "foundation")]
mod classification {
    use std::time::Duration;

    use super::ResilienceError;
    use crate::error::{ErrorClassification, ErrorSeverity};

    impl<E> ErrorClassification for ResilienceError<E>
    where
        E: ErrorClassification + std::error::Error + Send + Sync + 'static,
    {
        fn is_retryable(&self) -> bool {
            match self {
                Self::CircuitOpen { .. } => true,
                Self::OperationFailed { source } => source.is_retryable(),
            }
        }

        fn severity(&self) -> ErrorSeverity {
            match self {
                Self::CircuitOpen { .. } => ErrorSeverity::Warning,
                Self::OperationFailed { source } => source.severity(),
            }
        }

        fn is_critical(&self) -> bool {
            match self {
                Self::CircuitOpen { .. } => false,
                Self::OperationFailed { source } => source.is_critical(),
            }
        }

        fn retry_after(&self) -> Option<Duration> {
            match self {
                Self::CircuitOpen { retry_after } => *retry_after,
                Self::OperationFailed { source } => source.retry_after(),
            }
        }
    }
}
