//! Structured logging setup.

use tracing_subscriber::EnvFilter;

use crate::config::{ConfigError, LogConfig};

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over [`LogConfig::filter`]. With
/// [`LogConfig::json`] set, events are written as JSON lines.
///
/// # Errors
///
/// Returns [`ConfigError::Telemetry`] if the filter directive is invalid or
/// a global subscriber is already installed.
pub fn init_tracing(config: &LogConfig) -> Result<(), ConfigError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.filter)
            .map_err(|e| ConfigError::Telemetry(format!("invalid log filter: {e}")))?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| ConfigError::Telemetry(e.to_string()))
}
