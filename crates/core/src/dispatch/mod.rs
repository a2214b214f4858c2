//! Operation dispatch under circuit protection
//!
//! An [`Invocation`] names an operation and carries the deferred action that
//! performs it. The [`Dispatcher`] looks the name up in its
//! [`BreakerRegistry`]:
//!
//! - no breaker: the action runs directly and its outcome is returned as is
//! - breaker present: the action is handed to [`Breaker::execute_protected`]
//!   and the breaker decides whether it runs at all
//!
//! Either way the caller sees [`InvocationError`], which keeps "the operation
//! failed" ([`InvocationError::Operation`], [`InvocationError::Unrecoverable`])
//! apart from "the operation was not attempted" ([`InvocationError::Rejected`]).

pub mod adapter;
pub mod dispatcher;
pub mod errors;
mod normalizer;
pub mod operation;
pub mod ports;
pub mod registry;

pub use dispatcher::Dispatcher;
pub use errors::{BreakerContractViolation, CircuitOpen, InvocationError};
pub use operation::{Fault, Invocation, OperationKey};
pub use ports::{AsyncProtectedCall, Breaker, ExecutionError, ProtectedCall, ProtectedFailure};
pub use registry::{BreakerRegistry, RegistryBuilder};
