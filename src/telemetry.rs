//! Tracing infrastructure.
//!
//! Structured logging for the node using the `tracing` and
//! `tracing-subscriber` crates:
//! - Environment-based filtering (`RUST_LOG` overrides the configured level)
//! - Compact single-line output suitable for a serial console or journald
//! - Integration with the configuration system
//!
//! # Example
//! ```no_run
//! use motion_node::{config::NodeConfig, telemetry};
//! use tracing::info;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = NodeConfig::load()?;
//! telemetry::init_from_config(&config)?;
//! info!("node started");
//! # Ok(())
//! # }
//! ```

use crate::config::NodeConfig;
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize tracing from the node configuration.
///
/// The configured `application.log_level` becomes the default filter;
/// `RUST_LOG` takes precedence when set.
pub fn init_from_config(config: &NodeConfig) -> Result<(), String> {
    let level = parse_log_level(&config.application.log_level)?;
    init_with_level(level)
}

/// Initialize tracing with an explicit level.
pub fn init_with_level(level: Level) -> Result<(), String> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string().to_lowercase()));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(|e| format!("Failed to initialize tracing: {e}"))
}

/// Parse a log level string into a tracing Level
pub fn parse_log_level(level: &str) -> Result<Level, String> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        other => Err(format!(
            "Invalid log level '{other}'. Must be one of: trace, debug, info, warn, error"
        )),
    }
}
