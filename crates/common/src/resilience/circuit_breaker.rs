//! Reference circuit breaker
//!
//! The circuit breaker stops calling an operation once it has failed
//! repeatedly, and lets a limited number of trial calls through after a
//! cool-down to find out whether the operation has recovered.
//!
//! # State Transitions
//! ```text
//! Closed   → Open:     consecutive failures >= failure_threshold
//! Open     → HalfOpen: timeout elapsed since the circuit opened
//! HalfOpen → Closed:   successes >= success_threshold
//! HalfOpen → Open:     any failure
//! ```
//!
//! All state lives behind one mutex so that a transition and the counters it
//! resets are always observed together. The lock is never held while the
//! protected operation runs.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use super::clock::{Clock, SystemClock};

//==============================================================================
// Error Types
//==============================================================================

/// Configuration validation error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

/// Errors returned by a circuit-breaker protected call
///
/// Generic over the underlying operation error type `E` so the original
/// error is preserved untouched in [`ResilienceError::OperationFailed`].
#[derive(Debug, Error)]
pub enum ResilienceError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// Circuit breaker is open; the operation was not attempted
    #[error("Circuit breaker is open, rejecting calls")]
    CircuitOpen {
        /// Time until the breaker will admit a trial call, when known
        retry_after: Option<Duration>,
    },

    /// The underlying operation ran and failed
    #[error("Operation failed")]
    OperationFailed {
        #[source]
        source: E,
    },
}

/// Result type for breaker-protected operations
pub type ResilienceResult<T, E> = Result<T, ResilienceError<E>>;

/// Configuration result type
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CircuitState {
    /// Circuit is closed, allowing requests
    Closed,
    /// Circuit is open, rejecting requests
    Open,
    /// Circuit is half-open, allowing limited requests to test recovery
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
            CircuitState::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

//==============================================================================
// Configuration
//==============================================================================

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Number of failures before opening the circuit
    pub failure_threshold: u64,
    /// Number of successes needed to close the circuit from half-open
    pub success_threshold: u64,
    /// Time to wait before transitioning from open to half-open
    pub timeout: Duration,
    /// Maximum number of calls allowed in half-open state
    pub half_open_max_calls: u64,
    /// Whether to reset failure count on success in closed state
    pub reset_on_success: bool,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            timeout: Duration::from_secs(60),
            half_open_max_calls: 3,
            reset_on_success: true,
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a configuration builder
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::Invalid {
                message: "failure_threshold must be greater than 0".to_string(),
            });
        }

        if self.success_threshold == 0 {
            return Err(ConfigError::Invalid {
                message: "success_threshold must be greater than 0".to_string(),
            });
        }

        if self.half_open_max_calls == 0 {
            return Err(ConfigError::Invalid {
                message: "half_open_max_calls must be greater than 0".to_string(),
            });
        }

        // Trial slots are not handed back, so fewer slots than required
        // successes would leave the circuit half-open forever.
        if self.success_threshold > self.half_open_max_calls {
            return Err(ConfigError::Invalid {
                message: format!(
                    "success_threshold ({}) must not exceed half_open_max_calls ({})",
                    self.success_threshold, self.half_open_max_calls
                ),
            });
        }

        Ok(())
    }
}

/// Builder for CircuitBreakerConfig
#[derive(Debug, Default)]
pub struct CircuitBreakerConfigBuilder {
    config: CircuitBreakerConfig,
}

impl CircuitBreakerConfigBuilder {
    pub fn new() -> Self {
        Self { config: CircuitBreakerConfig::default() }
    }

    pub fn failure_threshold(mut self, threshold: u64) -> Self {
        self.config.failure_threshold = threshold;
        self
    }

    pub fn success_threshold(mut self, threshold: u64) -> Self {
        self.config.success_threshold = threshold;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn half_open_max_calls(mut self, max_calls: u64) -> Self {
        self.config.half_open_max_calls = max_calls;
        self
    }

    pub fn reset_on_success(mut self, reset: bool) -> Self {
        self.config.reset_on_success = reset;
        self
    }

    /// Switch to building a breaker directly, reading time from `clock`
    pub fn clock<C: Clock>(self, clock: C) -> CircuitBreakerBuilderWithClock<C> {
        CircuitBreakerBuilderWithClock { config: self.config, clock }
    }

    pub fn build(self) -> ConfigResult<CircuitBreakerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Builder with custom clock that builds a CircuitBreaker directly
pub struct CircuitBreakerBuilderWithClock<C: Clock> {
    config: CircuitBreakerConfig,
    clock: C,
}

impl<C: Clock> CircuitBreakerBuilderWithClock<C> {
    pub fn failure_threshold(mut self, threshold: u64) -> Self {
        self.config.failure_threshold = threshold;
        self
    }

    pub fn success_threshold(mut self, threshold: u64) -> Self {
        self.config.success_threshold = threshold;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn half_open_max_calls(mut self, max_calls: u64) -> Self {
        self.config.half_open_max_calls = max_calls;
        self
    }

    pub fn reset_on_success(mut self, reset: bool) -> Self {
        self.config.reset_on_success = reset;
        self
    }

    pub fn build(self) -> ConfigResult<CircuitBreaker<C>> {
        CircuitBreaker::with_clock(self.config, self.clock)
    }
}

//==============================================================================
// Circuit Breaker
//==============================================================================

/// Circuit breaker metrics for monitoring
#[derive(Debug, Clone)]
pub struct CircuitBreakerMetrics {
    pub state: CircuitState,
    pub failure_count: u64,
    pub success_count: u64,
    pub half_open_calls: u64,
    pub total_calls: u64,
    pub rejected_calls: u64,
    pub last_failure_time: Option<Instant>,
    pub state_change_time: Instant,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    /// Consecutive failures while closed (all failures when
    /// `reset_on_success` is off)
    failure_count: u64,
    /// Lifetime successes, reported in metrics
    success_count: u64,
    /// Successes observed since entering half-open
    trial_successes: u64,
    /// Trial calls admitted since entering half-open
    half_open_calls: u64,
    last_failure_time: Option<Instant>,
    opened_at: Option<Instant>,
    state_change_time: Instant,
}

impl BreakerState {
    fn new(now: Instant) -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            trial_successes: 0,
            half_open_calls: 0,
            last_failure_time: None,
            opened_at: None,
            state_change_time: now,
        }
    }
}

/// Generic circuit breaker implementation
///
/// Supports both async and sync operations. Clones share state, so one
/// breaker can guard several call sites.
pub struct CircuitBreaker<C: Clock = SystemClock> {
    config: CircuitBreakerConfig,
    inner: Arc<Mutex<BreakerState>>,
    total_calls: Arc<AtomicU64>,
    rejected_calls: Arc<AtomicU64>,
    clock: Arc<C>,
}

impl<C: Clock> fmt::Debug for CircuitBreaker<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("CircuitBreaker")
            .field("config", &self.config)
            .field("state", &inner.state)
            .field("failure_count", &inner.failure_count)
            .field("success_count", &inner.success_count)
            .finish()
    }
}

impl<C: Clock> Clone for CircuitBreaker<C> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            inner: Arc::clone(&self.inner),
            total_calls: Arc::clone(&self.total_calls),
            rejected_calls: Arc::clone(&self.rejected_calls),
            clock: Arc::clone(&self.clock),
        }
    }
}

pub type SyncCircuitBreaker = CircuitBreaker<SystemClock>;

/// A call the breaker has let through and is waiting to hear about
///
/// A call that never reports back (its future was dropped, or it unwound)
/// is recorded as a failure, so a half-open trial slot is never lost.
struct Admission<'a, C: Clock> {
    breaker: &'a CircuitBreaker<C>,
    settled: bool,
}

impl<C: Clock> Admission<'_, C> {
    fn succeed(mut self) {
        self.settled = true;
        self.breaker.record_success();
    }

    fn fail(mut self) {
        self.settled = true;
        self.breaker.record_failure();
    }
}

impl<C: Clock> Drop for Admission<'_, C> {
    fn drop(&mut self) {
        if !self.settled {
            debug!("Circuit breaker: call abandoned before completion, counting as failure");
            self.breaker.record_failure();
        }
    }
}

impl CircuitBreaker<SystemClock> {
    /// Create a new circuit breaker with the given configuration using system
    /// clock
    pub fn new(config: CircuitBreakerConfig) -> ConfigResult<Self> {
        Self::with_clock(config, SystemClock)
    }

    /// Create a circuit breaker with default configuration
    pub fn with_defaults() -> Self {
        Self::from_parts(CircuitBreakerConfig::default(), SystemClock)
    }

    /// Create a circuit breaker using the builder pattern
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }
}

impl Default for CircuitBreaker<SystemClock> {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl<C: Clock> CircuitBreaker<C> {
    /// Create a new circuit breaker with a custom clock (useful for testing)
    pub fn with_clock(config: CircuitBreakerConfig, clock: C) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self::from_parts(config, clock))
    }

    fn from_parts(config: CircuitBreakerConfig, clock: C) -> Self {
        let now = clock.now();
        Self {
            config,
            inner: Arc::new(Mutex::new(BreakerState::new(now))),
            total_calls: Arc::new(AtomicU64::new(0)),
            rejected_calls: Arc::new(AtomicU64::new(0)),
            clock: Arc::new(clock),
        }
    }

    /// The configuration this breaker was built with
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Cheap check that the circuit is not open
    ///
    /// Does not apply the open → half-open timeout; use [`Self::can_execute`]
    /// for the full decision.
    pub fn is_available(&self) -> bool {
        self.inner.lock().state != CircuitState::Open
    }

    /// Check if the circuit breaker would admit a call right now
    ///
    /// An open circuit whose timeout has elapsed moves to half-open here.
    /// No trial slot is consumed.
    pub fn can_execute(&self) -> bool {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        self.refresh(&mut inner, now);
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => false,
            CircuitState::HalfOpen => inner.half_open_calls < self.config.half_open_max_calls,
        }
    }

    /// Execute an async operation with circuit breaker protection
    #[instrument(level = "debug", skip(self, operation), fields(state = %self.get_state()))]
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> ResilienceResult<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let admission = self.admit()?;

        match operation().await {
            Ok(result) => {
                admission.succeed();
                Ok(result)
            }
            Err(error) => {
                admission.fail();
                debug!(error = %error, "Circuit breaker: operation failed");
                Err(ResilienceError::OperationFailed { source: error })
            }
        }
    }

    /// Execute a synchronous operation with circuit breaker protection
    #[instrument(level = "debug", skip(self, operation), fields(state = %self.get_state()))]
    pub fn call<F, T, E>(&self, operation: F) -> ResilienceResult<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let admission = self.admit()?;

        match operation() {
            Ok(result) => {
                admission.succeed();
                Ok(result)
            }
            Err(error) => {
                admission.fail();
                debug!(error = %error, "Circuit breaker: operation failed");
                Err(ResilienceError::OperationFailed { source: error })
            }
        }
    }

    /// Reserve permission for one call, or reject it
    ///
    /// The returned [`Admission`] must be settled with the call's outcome;
    /// dropping it unsettled counts as a failure.
    fn admit<E>(&self) -> ResilienceResult<Admission<'_, C>, E>
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        self.refresh(&mut inner, now);

        let admitted = match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => false,
            CircuitState::HalfOpen => {
                if inner.half_open_calls < self.config.half_open_max_calls {
                    inner.half_open_calls += 1;
                    true
                } else {
                    false
                }
            }
        };

        if admitted {
            self.total_calls.fetch_add(1, Ordering::Relaxed);
            return Ok(Admission { breaker: self, settled: false });
        }

        let retry_after = self.remaining_open_time(&inner, now);
        drop(inner);
        self.rejected_calls.fetch_add(1, Ordering::Relaxed);
        debug!(retry_after = ?retry_after, "Circuit breaker rejecting call");
        Err(ResilienceError::CircuitOpen { retry_after })
    }

    /// Apply the open → half-open timeout
    fn refresh(&self, inner: &mut BreakerState, now: Instant) {
        if inner.state != CircuitState::Open {
            return;
        }
        let opened_at = inner.opened_at.unwrap_or(inner.state_change_time);
        if now.saturating_duration_since(opened_at) >= self.config.timeout {
            Self::transition(inner, CircuitState::HalfOpen, now);
        }
    }

    fn remaining_open_time(&self, inner: &BreakerState, now: Instant) -> Option<Duration> {
        if inner.state != CircuitState::Open {
            return None;
        }
        let opened_at = inner.opened_at?;
        Some(self.config.timeout.saturating_sub(now.saturating_duration_since(opened_at)))
    }

    fn transition(inner: &mut BreakerState, to: CircuitState, now: Instant) {
        let from = inner.state;
        inner.state = to;
        inner.state_change_time = now;
        inner.half_open_calls = 0;
        inner.trial_successes = 0;

        match to {
            CircuitState::Open => {
                inner.opened_at = Some(now);
                warn!(from = %from, failures = inner.failure_count, "Circuit breaker opened");
            }
            CircuitState::HalfOpen => {
                info!(from = %from, "Circuit breaker half-open, admitting trial calls");
            }
            CircuitState::Closed => {
                inner.failure_count = 0;
                inner.opened_at = None;
                info!(from = %from, "Circuit breaker closed");
            }
        }
    }

    /// Record a successful operation
    pub fn record_success(&self) {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        inner.success_count += 1;

        match inner.state {
            CircuitState::Closed => {
                if self.config.reset_on_success {
                    inner.failure_count = 0;
                }
            }
            CircuitState::HalfOpen => {
                inner.trial_successes += 1;
                if inner.trial_successes >= self.config.success_threshold {
                    Self::transition(&mut inner, CircuitState::Closed, now);
                }
            }
            CircuitState::Open => {
                // A call admitted before the circuit opened finished late.
                debug!("Received success while circuit is open");
            }
        }
    }

    /// Record a failed operation
    pub fn record_failure(&self) {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        inner.failure_count += 1;
        inner.last_failure_time = Some(now);

        match inner.state {
            CircuitState::Closed => {
                if inner.failure_count >= self.config.failure_threshold {
                    Self::transition(&mut inner, CircuitState::Open, now);
                }
            }
            CircuitState::HalfOpen => {
                Self::transition(&mut inner, CircuitState::Open, now);
            }
            CircuitState::Open => {}
        }
    }

    /// Force the circuit open as if the failure threshold had just been hit
    ///
    /// The usual timeout still applies, after which trial calls are admitted.
    pub fn trip(&self) {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        Self::transition(&mut inner, CircuitState::Open, now);
    }

    /// Reset the circuit breaker to closed state and clear its counters
    pub fn reset(&self) {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        *inner = BreakerState::new(now);
        drop(inner);
        self.total_calls.store(0, Ordering::Relaxed);
        self.rejected_calls.store(0, Ordering::Relaxed);
        info!("Circuit breaker manually reset to closed state");
    }

    /// Get the current state of the circuit breaker
    pub fn get_state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Get the current circuit state (alias for `get_state()`)
    pub fn state(&self) -> CircuitState {
        self.get_state()
    }

    /// Time until an open circuit admits a trial call
    ///
    /// `None` unless the circuit is open.
    pub fn retry_after(&self) -> Option<Duration> {
        let now = self.clock.now();
        let inner = self.inner.lock();
        self.remaining_open_time(&inner, now)
    }

    /// Get circuit breaker metrics
    pub fn get_metrics(&self) -> CircuitBreakerMetrics {
        let inner = self.inner.lock();
        CircuitBreakerMetrics {
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            half_open_calls: inner.half_open_calls,
            total_calls: self.total_calls.load(Ordering::Acquire),
            rejected_calls: self.rejected_calls.load(Ordering::Acquire),
            last_failure_time: inner.last_failure_time,
            state_change_time: inner.state_change_time,
        }
    }

    /// Get current metrics snapshot (alias for `get_metrics()`)
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        self.get_metrics()
    }
}
