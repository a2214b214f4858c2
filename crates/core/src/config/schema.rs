//! Configuration schema and registry construction

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use tripwire_common::resilience::{CircuitBreaker, CircuitBreakerConfig, Clock, SystemClock};

use super::ConfigError;
use crate::dispatch::{Breaker, BreakerRegistry, Dispatcher};
use crate::observability::LoggingConfig;

/// Tuning for one named breaker
///
/// Fields left out take the defaults of [`CircuitBreakerConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BreakerSettings {
    pub failure_threshold: u64,
    pub success_threshold: u64,
    pub timeout_ms: u64,
    pub half_open_max_calls: u64,
    pub reset_on_success: bool,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        let defaults = CircuitBreakerConfig::default();
        Self {
            failure_threshold: defaults.failure_threshold,
            success_threshold: defaults.success_threshold,
            timeout_ms: u64::try_from(defaults.timeout.as_millis()).unwrap_or(u64::MAX),
            half_open_max_calls: defaults.half_open_max_calls,
            reset_on_success: defaults.reset_on_success,
        }
    }
}

impl BreakerSettings {
    /// Convert to the breaker's own configuration type
    pub fn to_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            success_threshold: self.success_threshold,
            timeout: Duration::from_millis(self.timeout_ms),
            half_open_max_calls: self.half_open_max_calls,
            reset_on_success: self.reset_on_success,
        }
    }
}

/// Declared breakers, the operations they guard, and logging
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatchConfig {
    pub logging: Option<LoggingConfig>,
    /// Breaker name → settings
    pub breakers: BTreeMap<String, BreakerSettings>,
    /// Operation key → breaker name
    pub operations: BTreeMap<String, String>,
}

impl DispatchConfig {
    /// Check that every operation names a declared breaker and every breaker
    /// is valid
    ///
    /// # Errors
    /// Returns the first problem found, as a [`ConfigError`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, settings) in &self.breakers {
            settings
                .to_breaker_config()
                .validate()
                .map_err(|source| ConfigError::InvalidBreaker { name: name.clone(), source })?;
        }

        for (operation, breaker) in &self.operations {
            if operation.trim().is_empty() {
                return Err(ConfigError::EmptyOperation);
            }
            if !self.breakers.contains_key(breaker) {
                return Err(ConfigError::UnknownBreaker {
                    operation: operation.clone(),
                    breaker: breaker.clone(),
                });
            }
        }

        Ok(())
    }

    /// Lay `overlay` over this configuration
    ///
    /// Per breaker name and per operation key, the overlay's entry wins.
    /// Logging settings are replaced when the overlay has any.
    #[must_use]
    pub fn merge(mut self, overlay: DispatchConfig) -> Self {
        if overlay.logging.is_some() {
            self.logging = overlay.logging;
        }
        for (name, settings) in overlay.breakers {
            if self.breakers.insert(name.clone(), settings).is_some() {
                debug!(breaker = %name, "Breaker settings overridden by later layer");
            }
        }
        for (operation, breaker) in overlay.operations {
            if let Some(previous) = self.operations.insert(operation.clone(), breaker) {
                debug!(
                    operation = %operation,
                    previous = %previous,
                    "Operation mapping overridden by later layer"
                );
            }
        }
        self
    }

    /// Build a registry of fresh breakers using the system clock
    ///
    /// # Errors
    /// Fails when the configuration does not validate.
    pub fn build_registry(&self) -> Result<BreakerRegistry, ConfigError> {
        self.build_registry_with_clock(SystemClock)
    }

    /// Build a registry of fresh breakers reading time from `clock`
    ///
    /// Each declared breaker is instantiated once and shared by every
    /// operation that names it.
    ///
    /// # Errors
    /// Fails when the configuration does not validate.
    pub fn build_registry_with_clock<C>(&self, clock: C) -> Result<BreakerRegistry, ConfigError>
    where
        C: Clock + Clone,
    {
        self.validate()?;

        let referenced: BTreeSet<&str> = self.operations.values().map(String::as_str).collect();
        let mut instances: HashMap<&str, Arc<dyn Breaker>> = HashMap::new();
        for (name, settings) in &self.breakers {
            if !referenced.contains(name.as_str()) {
                warn!(breaker = %name, "Breaker is declared but guards no operation");
                continue;
            }
            let breaker = CircuitBreaker::with_clock(settings.to_breaker_config(), clock.clone())
                .map_err(|source| ConfigError::InvalidBreaker { name: name.clone(), source })?;
            instances.insert(name.as_str(), Arc::new(breaker));
        }

        let mut builder = BreakerRegistry::builder();
        for (operation, name) in &self.operations {
            let Some(breaker) = instances.get(name.as_str()) else {
                return Err(ConfigError::UnknownBreaker {
                    operation: operation.clone(),
                    breaker: name.clone(),
                });
            };
            builder = builder.protect(operation.as_str(), Arc::clone(breaker));
        }

        let registry = builder.build();
        info!(
            operations = registry.len(),
            breakers = instances.len(),
            "Built breaker registry from configuration"
        );
        Ok(registry)
    }

    /// Rebuild the registry and swap it into `dispatcher`
    ///
    /// On error the dispatcher keeps its current mapping.
    ///
    /// # Errors
    /// Fails when the configuration does not validate.
    pub fn apply_to(&self, dispatcher: &Dispatcher) -> Result<(), ConfigError> {
        let registry = self.build_registry()?;
        dispatcher.set_mappings(registry);
        Ok(())
    }
}
