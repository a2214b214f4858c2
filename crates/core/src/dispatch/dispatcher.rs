//! Dispatcher - routes invocations through their configured breakers

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::{debug, info, trace};

use super::errors::InvocationError;
use super::normalizer;
use super::operation::{Fault, Invocation, OperationKey};
use super::ports::Breaker;
use super::registry::BreakerRegistry;

/// Routes each invocation either straight to its action or through the
/// breaker registered for its operation
///
/// The registry is the only shared state. It is read without locking on
/// every call and replaced whole by [`Dispatcher::set_mappings`]; a call
/// sees either the old mapping or the new one, never a mix.
pub struct Dispatcher {
    registry: ArcSwap<BreakerRegistry>,
}

impl Dispatcher {
    /// Create a dispatcher using `registry`
    pub fn new(registry: BreakerRegistry) -> Self {
        Self { registry: ArcSwap::from_pointee(registry) }
    }

    /// Replace the whole operation→breaker mapping
    pub fn set_mappings(&self, registry: BreakerRegistry) {
        drop(self.replace_mappings(registry));
    }

    /// Replace the whole mapping, returning the one it replaced
    pub fn replace_mappings(&self, registry: BreakerRegistry) -> Arc<BreakerRegistry> {
        let operations = registry.len();
        let previous = self.registry.swap(Arc::new(registry));
        info!(operations, previous_operations = previous.len(), "Breaker mappings replaced");
        previous
    }

    /// Snapshot of the current mapping
    pub fn mappings(&self) -> Arc<BreakerRegistry> {
        self.registry.load_full()
    }

    /// The breaker currently guarding `key`, if any
    pub fn breaker_for(&self, key: &str) -> Option<Arc<dyn Breaker>> {
        self.registry.load().get(key).cloned()
    }

    /// Whether `key` currently has a breaker
    pub fn is_protected(&self, key: &str) -> bool {
        self.registry.load().contains(key)
    }

    /// Run an invocation, under its operation's breaker when one is
    /// configured
    ///
    /// # Errors
    /// - [`InvocationError::Operation`] / [`InvocationError::Unrecoverable`]:
    ///   the action ran and failed; the error is the action's own
    /// - [`InvocationError::Rejected`]: the breaker declined to run the action
    ///
    /// # Panics
    /// A panic raised by the action propagates unchanged. When the operation
    /// is protected, the breaker records it as a failure first.
    pub fn invoke<F, T, E>(&self, invocation: Invocation<F>) -> Result<T, InvocationError<E>>
    where
        F: FnOnce() -> Result<T, Fault<E>>,
        E: fmt::Display,
    {
        let (key, action) = invocation.into_parts();

        let Some(breaker) = self.breaker_for(key.as_str()) else {
            trace!(operation = %key, "No breaker configured, calling operation directly");
            return action().map_err(InvocationError::from);
        };

        debug!(operation = %key, "Dispatching through circuit breaker");
        let mut slot = None;
        let verdict = breaker.execute_protected(normalizer::protect(action, &mut slot));
        normalizer::resolve(&key, verdict, slot)
    }

    /// Async counterpart of [`Dispatcher::invoke`]
    ///
    /// Dropping the returned future before it completes drops the action
    /// with it.
    ///
    /// # Errors
    /// Same as [`Dispatcher::invoke`].
    pub async fn invoke_async<F, Fut, T, E>(
        &self,
        invocation: Invocation<F>,
    ) -> Result<T, InvocationError<E>>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, Fault<E>>> + Send,
        T: Send,
        E: fmt::Display + Send,
    {
        let (key, action) = invocation.into_parts();

        let Some(breaker) = self.breaker_for(key.as_str()) else {
            trace!(operation = %key, "No breaker configured, calling operation directly");
            return action().await.map_err(InvocationError::from);
        };

        debug!(operation = %key, "Dispatching through circuit breaker");
        let mut slot = None;
        let verdict =
            breaker.execute_protected_async(normalizer::protect_async(action, &mut slot)).await;
        normalizer::resolve(&key, verdict, slot)
    }

    /// Shorthand for `invoke(Invocation::new(key, action))`
    ///
    /// # Errors
    /// Same as [`Dispatcher::invoke`].
    pub fn call<F, T, E>(
        &self,
        key: impl Into<OperationKey>,
        action: F,
    ) -> Result<T, InvocationError<E>>
    where
        F: FnOnce() -> Result<T, Fault<E>>,
        E: fmt::Display,
    {
        self.invoke(Invocation::new(key, action))
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(BreakerRegistry::empty())
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher").field("registry", &*self.registry.load()).finish()
    }
}
