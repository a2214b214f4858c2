//! Logging setup
//!
//! Installs a global `tracing` subscriber configured from
//! [`LoggingConfig`]. `RUST_LOG`, when set, takes precedence over the
//! configured level.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `tripwire_core=debug,warn`
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Text }
    }
}

/// Failure to install the global subscriber
#[derive(Debug, Error)]
pub enum TracingInitError {
    #[error("invalid log filter `{directive}`: {message}")]
    InvalidFilter { directive: String, message: String },

    #[error("failed to install tracing subscriber: {0}")]
    AlreadyInstalled(String),
}

/// Build the event filter: `RUST_LOG` if set, otherwise `config.level`
///
/// # Errors
/// Returns [`TracingInitError::InvalidFilter`] if the directive does not
/// parse.
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter, TracingInitError> {
    match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directive) if !directive.trim().is_empty() => parse_filter(&directive),
        _ => parse_filter(&config.level),
    }
}

fn parse_filter(directive: &str) -> Result<EnvFilter, TracingInitError> {
    EnvFilter::try_new(directive).map_err(|e| TracingInitError::InvalidFilter {
        directive: directive.to_string(),
        message: e.to_string(),
    })
}

/// Install the global tracing subscriber
///
/// # Errors
/// Fails if the filter is invalid or a global subscriber is already set;
/// never panics.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), TracingInitError> {
    let filter = build_filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match config.format {
        LogFormat::Text => {
            let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);
            registry.with(fmt_layer).try_init()
        }
        LogFormat::Json => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true);
            registry.with(fmt_layer).try_init()
        }
    };

    installed.map_err(|e| TracingInitError::AlreadyInstalled(e.to_string()))?;
    tracing::debug!(level = %config.level, format = ?config.format, "Tracing initialized");
    Ok(())
}
