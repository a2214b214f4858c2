//! Error classification shared across Tripwire crates
//!
//! Errors that cross crate boundaries implement [`ErrorClassification`] so
//! callers can make retry and alerting decisions without matching on
//! concrete variants.
//!
//! ## ErrorSeverity Levels
//!
//! | Level | Use Case | Examples |
//! |-------|----------|----------|
//! | **Info** | Informational, expected conditions | Resource not found |
//! | **Warning** | Degraded but operational | Open circuit, lock contention |
//! | **Error** | Failure requiring attention | Operation failed, invalid config |
//! | **Critical** | System integrity at risk | Unrecoverable failures, broken invariants |
//!
//! ## Implementing the trait
//!
//! ```rust
//! use std::time::Duration;
//!
//! use tripwire_common::error::{ErrorClassification, ErrorSeverity};
//!
//! #[derive(Debug)]
//! enum LedgerError {
//!     InsufficientFunds,
//!     Unavailable { retry_after: Duration },
//! }
//!
//! impl ErrorClassification for LedgerError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, Self::Unavailable { .. })
//!     }
//!
//!     fn severity(&self) -> ErrorSeverity {
//!         match self {
//!             Self::InsufficientFunds => ErrorSeverity::Info,
//!             Self::Unavailable { .. } => ErrorSeverity::Warning,
//!         }
//!     }
//!
//!     fn is_critical(&self) -> bool {
//!         false
//!     }
//!
//!     fn retry_after(&self) -> Option<Duration> {
//!         match self {
//!             Self::Unavailable { retry_after } => Some(*retry_after),
//!             Self::InsufficientFunds => None,
//!         }
//!     }
//! }
//!
//! assert!(!LedgerError::InsufficientFunds.is_retryable());
//! ```

use std::fmt;
use std::time::Duration;

/// Boxed error type for failures whose concrete type is only known at runtime
pub type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Standard interface for classifying errors by their characteristics
pub trait ErrorClassification {
    /// Check if this error is retryable
    ///
    /// Retryable errors are transient conditions that may succeed if
    /// attempted again, such as an open circuit or a timeout.
    fn is_retryable(&self) -> bool;

    /// Get the error severity level
    ///
    /// Used for monitoring, alerting, and logging decisions.
    fn severity(&self) -> ErrorSeverity;

    /// Check if this is a critical error requiring immediate attention
    fn is_critical(&self) -> bool;

    /// Get the suggested retry delay if applicable
    fn retry_after(&self) -> Option<Duration>;
}

/// Error severity levels for monitoring and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    /// Informational, typically for debugging
    Info,
    /// Warning, should be monitored but not critical
    Warning,
    /// Error, requires attention and action
    Error,
    /// Critical, immediate action required
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for error classification primitives

    use super::*;

    /// Validates the severity display labels used in structured logs.
    ///
    /// Assertions:
    /// - Confirms each level renders as its uppercase label.
    #[test]
    fn test_severity_display() {
        assert_eq!(ErrorSeverity::Info.to_string(), "INFO");
        assert_eq!(ErrorSeverity::Warning.to_string(), "WARN");
        assert_eq!(ErrorSeverity::Error.to_string(), "ERROR");
        assert_eq!(ErrorSeverity::Critical.to_string(), "CRITICAL");
    }

    /// Validates that severity levels are ordered from least to most severe.
    #[test]
    fn test_severity_ordering() {
        assert!(ErrorSeverity::Info < ErrorSeverity::Warning);
        assert!(ErrorSeverity::Warning < ErrorSeverity::Error);
        assert!(ErrorSeverity::Error < ErrorSeverity::Critical);
        assert_eq!(
            [ErrorSeverity::Critical, ErrorSeverity::Info].iter().max(),
            Some(&ErrorSeverity::Critical)
        );
    }

    #[test]
    fn test_boxed_error_downcasts_to_original_type() {
        let boxed: BoxedError = Box::new(std::io::Error::other("disk gone"));
        let io = boxed.downcast_ref::<std::io::Error>();
        assert!(io.is_some());
        assert_eq!(boxed.to_string(), "disk gone");
    }
}
