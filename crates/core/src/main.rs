//! `tripwire-check`: validate a dispatch configuration and show what it
//! protects.
//!
//! Usage: `tripwire-check [CONFIG]`
//!
//! Without an argument the file is located the same way the library does
//! (`TRIPWIRE_CONFIG`, then the standard paths). Output is for humans, so
//! `println!` is used rather than structured logging.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use tripwire_core::config::loader;
use tripwire_core::{init_tracing, BreakerRegistry, DispatchConfig};

fn main() -> ExitCode {
    let path = env::args_os().nth(1).map(PathBuf::from);

    match run(path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("tripwire-check failed: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(path: Option<PathBuf>) -> anyhow::Result<()> {
    let config = match &path {
        Some(path) => loader::load_from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => loader::load().context("locating configuration")?,
    };

    init_tracing(&config.logging.clone().unwrap_or_default())
        .context("initializing logging")?;

    let registry = config.build_registry().context("building breaker registry")?;
    print_summary(&config, &registry);
    Ok(())
}

fn print_summary(config: &DispatchConfig, registry: &BreakerRegistry) {
    println!("Breakers:");
    for (name, settings) in &config.breakers {
        println!(
            "    {name}: failures={} successes={} timeout={}ms half_open_calls={}",
            settings.failure_threshold,
            settings.success_threshold,
            settings.timeout_ms,
            settings.half_open_max_calls
        );
    }

    let mut protected: Vec<_> = registry.iter().collect();
    protected.sort_by(|(a, _), (b, _)| a.as_str().cmp(b.as_str()));

    println!("Operations:");
    for (operation, breaker) in protected {
        let name = config.operations.get(operation.as_str()).map_or("?", String::as_str);
        let state = breaker.state().map_or_else(|| "unknown".to_string(), |s| s.to_string());
        println!("    {operation} -> {name} [{state}]");
    }

    println!();
    println!("{} protected operation(s)", registry.len());
}
