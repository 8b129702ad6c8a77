//! Structured logging setup
//!
//! Logs go to stderr so `run` can print its JSON outcome on stdout.
//! `RUST_LOG` wins over the configured level when it is set.

use crate::config::LoggingConfig;
use anyhow::Result;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Filter for the configured level; `verbose` raises it to at least DEBUG.
pub fn env_filter(level: &str, verbose: bool) -> EnvFilter {
    let level: Level = level.to_lowercase().parse().unwrap_or(Level::INFO);
    let level = if verbose && level < Level::DEBUG {
        Level::DEBUG
    } else {
        level
    };
    EnvFilter::new(level.as_str().to_lowercase())
}

/// Install the global subscriber in the configured format
pub fn init(config: &LoggingConfig, verbose: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| env_filter(&config.level, verbose));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let result = match config.format.to_lowercase().as_str() {
        "json" => builder.json().try_init(),
        "pretty" => builder.pretty().try_init(),
        _ => builder.compact().try_init(),
    };
    result.map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}
