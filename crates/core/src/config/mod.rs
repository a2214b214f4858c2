//! Dispatch configuration
//!
//! A [`DispatchConfig`] declares named breakers and maps operation keys onto
//! them. Several operations naming the same breaker share one instance.
//!
//! ```toml
//! [breakers.payments]
//! failure_threshold = 3
//! timeout_ms = 30000
//!
//! [operations]
//! charge = "payments"
//! capture = "payments"
//! ```
//!
//! See [`loader`] for where configuration files are looked up.

use std::path::PathBuf;

use thiserror::Error;

pub mod loader;
mod schema;

pub use schema::{BreakerSettings, DispatchConfig};

/// Errors raised while loading or applying configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid {format} in {}: {message}", .path.display())]
    Parse { format: &'static str, path: PathBuf, message: String },

    #[error("unsupported config format `{extension}` for {}", .path.display())]
    UnsupportedFormat { path: PathBuf, extension: String },

    #[error("config file not found: {}", .path.display())]
    NotFound { path: PathBuf },

    #[error("no config file found; set {env_var} or create one of: {searched}")]
    NoConfigFound { env_var: &'static str, searched: String },

    #[error("operation `{operation}` references unknown breaker `{breaker}`")]
    UnknownBreaker { operation: String, breaker: String },

    #[error("operation names must not be empty")]
    EmptyOperation,

    #[error("breaker `{name}` is misconfigured: {source}")]
    InvalidBreaker {
        name: String,
        #[source]
        source: tripwire_common::resilience::ConfigError,
    },
}
