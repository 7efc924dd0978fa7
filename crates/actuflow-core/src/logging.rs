/*!
 * Logging functionality for actuflow.
 *
 * This module provides tracing setup and span helpers so every actor logs
 * with the same shape.
 */
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::{Error, Result};

/// Initialize the logging system with a specific filter
///
/// # Arguments
///
/// * `filter` - The log filter string (e.g., "info", "debug", "actuflow_devices=trace")
pub fn init_with_filter(filter: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init()
        .map_err(|e| Error::runtime(format!("Failed to initialize logging: {}", e)))?;

    Ok(())
}

/// Initialize the logging system from the `[logging]` configuration section
pub fn init_from_config(config: &LoggingConfig) -> Result<()> {
    if !config.json_format {
        return init_with_filter(&config.level);
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    tracing_subscriber::registry()
        .with(fmt::layer().json().with_target(true))
        .with(filter)
        .try_init()
        .map_err(|e| Error::runtime(format!("Failed to initialize logging: {}", e)))?;

    Ok(())
}

/// A type alias for a tracing span
pub type Span = tracing::Span;

/// Create a new span for a device
///
/// # Arguments
///
/// * `name` - The device name
/// * `config_path` - Where the device keeps its persisted settings
pub fn device_span(name: &str, config_path: &str) -> Span {
    tracing::info_span!("device", name = %name, config = %config_path)
}

/// Create a new span for an operation
///
/// # Arguments
///
/// * `name` - The name of the operation
/// * `device` - The device performing the operation
pub fn operation_span(name: &str, device: &str) -> Span {
    tracing::info_span!("operation", name = %name, device = %device)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_from_config() {
        // A global subscriber may already be installed by another test
        let _ = init_from_config(&LoggingConfig::default());
    }

    #[test]
    fn test_device_span() {
        let span = device_span("dac", "/settings/act/AnalogDAC.json");
        let _entered = span.enter();
    }

    #[test]
    fn test_operation_span() {
        let span = operation_span("begin", "dac");
        let _entered = span.enter();
    }
}
