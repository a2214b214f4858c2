//! Operation keys, failure taxonomy, and invocations

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tripwire_common::BoxedError;

/// Stable identifier naming an interceptable operation
///
/// Cheap to clone and borrowable as `&str`, so registries can be queried
/// without allocating.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationKey(Arc<str>);

impl OperationKey {
    /// Create a key from an operation name
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// The operation name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for OperationKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for OperationKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for OperationKey {
    fn from(name: &str) -> Self {
        Self(Arc::from(name))
    }
}

impl From<String> for OperationKey {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

impl From<&OperationKey> for OperationKey {
    fn from(key: &OperationKey) -> Self {
        key.clone()
    }
}

/// How a deferred action reports failure
///
/// `Recoverable` carries the caller's own error type and is what a breaker
/// counts as an ordinary failure. `Unrecoverable` carries a fatal condition
/// whose concrete type is only known at runtime; it is never downgraded and
/// can be downcast back to the original error.
///
/// Any `E` converts into `Fault<E>`, so `?` works inside actions:
///
/// ```rust
/// use tripwire_core::Fault;
///
/// fn parse(input: &str) -> Result<u32, Fault<std::num::ParseIntError>> {
///     Ok(input.parse::<u32>()?)
/// }
///
/// assert!(matches!(parse("x"), Err(Fault::Recoverable(_))));
/// ```
#[derive(Debug)]
pub enum Fault<E> {
    /// An expected failure, surfaced to the caller verbatim
    Recoverable(E),
    /// A fatal failure, surfaced to the caller verbatim
    Unrecoverable(BoxedError),
}

impl<E> Fault<E> {
    /// Wrap a fatal condition
    pub fn unrecoverable(error: impl Into<BoxedError>) -> Self {
        Self::Unrecoverable(error.into())
    }

    /// Whether this is the caller's own recoverable error
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Recoverable(_))
    }
}

impl<E> From<E> for Fault<E> {
    fn from(error: E) -> Self {
        Self::Recoverable(error)
    }
}

impl<E: fmt::Display> fmt::Display for Fault<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recoverable(error) => fmt::Display::fmt(error, f),
            Self::Unrecoverable(error) => fmt::Display::fmt(error, f),
        }
    }
}

/// A pending call: the operation's key plus the action that performs it
///
/// Created per call and consumed by the dispatcher. The action runs at most
/// once.
pub struct Invocation<F> {
    key: OperationKey,
    action: F,
}

impl<F> Invocation<F> {
    /// Create an invocation whose action reports failures as [`Fault`]
    pub fn new(key: impl Into<OperationKey>, action: F) -> Self {
        Self { key: key.into(), action }
    }

    /// Create an invocation from an action returning a plain `Result<T, E>`
    ///
    /// Every error the action returns is treated as recoverable.
    pub fn recoverable<T, E>(
        key: impl Into<OperationKey>,
        action: F,
    ) -> Invocation<impl FnOnce() -> Result<T, Fault<E>>>
    where
        F: FnOnce() -> Result<T, E>,
    {
        Invocation { key: key.into(), action: move || action().map_err(Fault::Recoverable) }
    }

    /// The operation this invocation targets
    pub fn key(&self) -> &OperationKey {
        &self.key
    }

    /// Split into the key and the deferred action
    pub fn into_parts(self) -> (OperationKey, F) {
        (self.key, self.action)
    }
}

impl<F> fmt::Debug for Invocation<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation").field("key", &self.key).finish_non_exhaustive()
    }
}
