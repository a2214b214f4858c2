//! # Tripwire Core
//!
//! Selective circuit protection for operation dispatch.
//!
//! This crate contains:
//! - The [`Dispatcher`], which routes each invocation either straight to the
//!   operation or through the circuit breaker registered for it
//! - The outcome normalizer that keeps the caller's failure type intact across
//!   the breaker boundary
//! - The [`Breaker`] port and its adapter for the reference
//!   [`tripwire_common::CircuitBreaker`]
//! - Configuration loading and logging setup
//!
//! ## Architecture Principles
//! - Only depends on `tripwire-common` for breaker machinery
//! - Breakers are reached through a trait, never through their internals
//! - The operation→breaker mapping is an immutable value swapped atomically
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use tripwire_common::CircuitBreaker;
//! use tripwire_core::{BreakerRegistry, Dispatcher, Fault, Invocation, InvocationError};
//!
//! let registry = BreakerRegistry::builder()
//!     .protect("charge", Arc::new(CircuitBreaker::with_defaults()))
//!     .build();
//! let dispatcher = Dispatcher::new(registry);
//!
//! let charged: Result<u32, InvocationError<std::io::Error>> =
//!     dispatcher.invoke(Invocation::new("charge", || Ok::<_, Fault<std::io::Error>>(42)));
//! assert_eq!(charged.ok(), Some(42));
//! ```

pub mod config;
pub mod dispatch;
pub mod observability;

pub use config::{BreakerSettings, ConfigError, DispatchConfig};
pub use dispatch::{
    AsyncProtectedCall, Breaker, BreakerContractViolation, BreakerRegistry, CircuitOpen,
    Dispatcher, ExecutionError, Fault, Invocation, InvocationError, OperationKey, ProtectedCall,
    ProtectedFailure, RegistryBuilder,
};
pub use observability::{init_tracing, LogFormat, LoggingConfig, TracingInitError};
