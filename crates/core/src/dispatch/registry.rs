//! Immutable operation→breaker mapping

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::operation::OperationKey;
use super::ports::Breaker;

/// Mapping from operation key to the breaker that guards it
///
/// Never mutated after construction; reconfiguration builds a new registry
/// and swaps it into the [`Dispatcher`](super::Dispatcher) whole. Several
/// keys may share one breaker.
#[derive(Clone, Default)]
pub struct BreakerRegistry {
    entries: HashMap<OperationKey, Arc<dyn Breaker>>,
}

impl BreakerRegistry {
    /// Start building a registry
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// A registry that protects nothing
    pub fn empty() -> Self {
        Self::default()
    }

    /// The breaker guarding `key`, if any
    pub fn get(&self, key: &str) -> Option<&Arc<dyn Breaker>> {
        self.entries.get(key)
    }

    /// Whether `key` is protected
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of protected operations
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no operation is protected
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Protected operation keys, in no particular order
    pub fn keys(&self) -> impl Iterator<Item = &OperationKey> {
        self.entries.keys()
    }

    /// Protected operations with their breakers, in no particular order
    pub fn iter(&self) -> impl Iterator<Item = (&OperationKey, &Arc<dyn Breaker>)> {
        self.entries.iter()
    }
}

impl fmt::Debug for BreakerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.entries.keys().map(OperationKey::as_str).collect();
        keys.sort_unstable();
        f.debug_struct("BreakerRegistry").field("operations", &keys).finish()
    }
}

impl<K: Into<OperationKey>> FromIterator<(K, Arc<dyn Breaker>)> for BreakerRegistry {
    fn from_iter<I: IntoIterator<Item = (K, Arc<dyn Breaker>)>>(iter: I) -> Self {
        iter.into_iter().fold(RegistryBuilder::new(), |builder, (key, breaker)| {
            builder.protect(key, breaker)
        })
        .build()
    }
}

/// Builder for [`BreakerRegistry`]
///
/// Registering a key twice keeps the later breaker.
#[derive(Default)]
pub struct RegistryBuilder {
    entries: HashMap<OperationKey, Arc<dyn Breaker>>,
}

impl RegistryBuilder {
    /// An empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Guard `key` with `breaker`
    pub fn protect(mut self, key: impl Into<OperationKey>, breaker: Arc<dyn Breaker>) -> Self {
        self.insert(key.into(), breaker);
        self
    }

    /// Guard every key in `keys` with the same breaker instance
    pub fn protect_all<K, I>(mut self, keys: I, breaker: Arc<dyn Breaker>) -> Self
    where
        K: Into<OperationKey>,
        I: IntoIterator<Item = K>,
    {
        for key in keys {
            self.insert(key.into(), Arc::clone(&breaker));
        }
        self
    }

    /// Apply every entry of `overlay` on top of this builder
    pub fn layer(mut self, overlay: BreakerRegistry) -> Self {
        for (key, breaker) in overlay.entries {
            self.insert(key, breaker);
        }
        self
    }

    /// Freeze the collected mappings
    pub fn build(self) -> BreakerRegistry {
        BreakerRegistry { entries: self.entries }
    }

    fn insert(&mut self, key: OperationKey, breaker: Arc<dyn Breaker>) {
        if self.entries.insert(key.clone(), breaker).is_some() {
            debug!(operation = %key, "Breaker registration overridden by later entry");
        }
    }
}

impl fmt::Debug for RegistryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryBuilder").field("len", &self.entries.len()).finish()
    }
}
