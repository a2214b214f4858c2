//! Configuration loader
//!
//! Loads [`DispatchConfig`] from TOML or JSON files.
//!
//! ## Loading Strategy
//! 1. If `TRIPWIRE_CONFIG` is set, load that file
//! 2. Otherwise probe the standard locations below
//! 3. Format is detected by file extension (`.toml` or `.json`)
//! 4. The loaded configuration is validated before it is returned
//!
//! ## File Locations
//! The loader probes the following paths (in order), relative to the
//! current working directory:
//! 1. `./tripwire.toml`
//! 2. `./tripwire.json`
//! 3. `./config/tripwire.toml`
//! 4. `./config/tripwire.json`

use std::path::{Path, PathBuf};

use super::{ConfigError, DispatchConfig};

/// Environment variable naming the configuration file
pub const CONFIG_ENV_VAR: &str = "TRIPWIRE_CONFIG";

const CANDIDATES: [&str; 4] =
    ["tripwire.toml", "tripwire.json", "config/tripwire.toml", "config/tripwire.json"];

/// Load configuration from `TRIPWIRE_CONFIG` or the standard locations
///
/// # Errors
/// Returns [`ConfigError`] if no file is found, the file cannot be read or
/// parsed, or the configuration does not validate.
pub fn load() -> Result<DispatchConfig, ConfigError> {
    if let Some(path) = std::env::var_os(CONFIG_ENV_VAR) {
        tracing::debug!(env_var = CONFIG_ENV_VAR, "Using configuration path from environment");
        return load_from_file(PathBuf::from(path));
    }

    let path = probe_config_paths().ok_or_else(|| ConfigError::NoConfigFound {
        env_var: CONFIG_ENV_VAR,
        searched: CANDIDATES.join(", "),
    })?;
    load_from_file(path)
}

/// Load and validate configuration from a file
///
/// # Errors
/// Returns [`ConfigError`] if the file is missing, unreadable, in an
/// unsupported format, malformed, or invalid.
pub fn load_from_file(path: impl AsRef<Path>) -> Result<DispatchConfig, ConfigError> {
    let config = read_config(path.as_ref())?;
    config.validate()?;
    Ok(config)
}

/// Load several files and merge them in order, later files winning
///
/// Layers are validated only once merged, so a later layer may map
/// operations onto breakers declared in an earlier one.
///
/// # Errors
/// Returns [`ConfigError`] for the first layer that cannot be read or
/// parsed, or if the merged configuration does not validate.
pub fn load_layers<I, P>(paths: I) -> Result<DispatchConfig, ConfigError>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let mut merged = DispatchConfig::default();
    for path in paths {
        merged = merged.merge(read_config(path.as_ref())?);
    }
    merged.validate()?;
    Ok(merged)
}

fn read_config(path: &Path) -> Result<DispatchConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound { path: path.to_path_buf() });
    }

    tracing::info!(path = %path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(path)
        .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;

    parse_config(&contents, path)
}

/// Parse configuration from string content
///
/// Format is detected by the extension of `path`, defaulting to JSON when
/// there is none. The result is not validated.
///
/// # Errors
/// Returns [`ConfigError`] if the format is unsupported or parsing fails.
pub fn parse_config(contents: &str, path: &Path) -> Result<DispatchConfig, ConfigError> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents).map_err(|e| ConfigError::Parse {
            format: "TOML",
            path: path.to_path_buf(),
            message: e.to_string(),
        }),
        "json" => serde_json::from_str(contents).map_err(|e| ConfigError::Parse {
            format: "JSON",
            path: path.to_path_buf(),
            message: e.to_string(),
        }),
        other => Err(ConfigError::UnsupportedFormat {
            path: path.to_path_buf(),
            extension: other.to_string(),
        }),
    }
}

/// Probe the standard locations under the current working directory
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    probe_config_paths_in(&cwd)
}

/// Probe the standard locations under `base`
pub fn probe_config_paths_in(base: &Path) -> Option<PathBuf> {
    CANDIDATES.iter().map(|candidate| base.join(candidate)).find(|path| path.is_file())
}
