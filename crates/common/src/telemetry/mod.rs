//! Tracing subscriber setup
//!
//! The reasoning crates only emit `tracing` events; applications call
//! [`init_tracing`] once at startup to route them somewhere.

use crate::config::ObservabilityConfig;
use crate::errors::{GraphError, Result};
use tracing_subscriber::EnvFilter;

/// Build the env filter for a configured log level.
///
/// `RUST_LOG` wins over the configured level when it is set.
pub fn build_filter(config: &ObservabilityConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    EnvFilter::try_new(&config.log_level).map_err(|e| GraphError::Telemetry {
        message: format!("Invalid log level '{}': {}", config.log_level, e),
    })
}

/// Install the global tracing subscriber
pub fn init_tracing(config: &ObservabilityConfig) -> Result<()> {
    let filter = build_filter(config)?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = if config.json_logging {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|e| GraphError::Telemetry {
        message: format!("Failed to install tracing subscriber: {}", e),
    })?;

    tracing::info!(service = %config.service_name, "Tracing initialized");
    Ok(())
}
