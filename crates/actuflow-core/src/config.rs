/*!
 * Configuration management for actuflow.
 *
 * This module loads the process-level settings: where persisted actor
 * settings live, how logging is set up, and which outputs to bring up.
 * Per-actor settings blobs are not handled here; they live in [`crate::storage`].
 */
use std::path::Path;

use config::{Config as ConfigLib, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Settings file name used by DAC outputs unless overridden
pub const DEFAULT_DAC_CONFIG_FILE: &str = "AnalogDAC.json";

/// Process configuration for actuflow
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// General configuration
    #[serde(default)]
    pub general: GeneralConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Analog outputs to create at startup
    #[serde(default)]
    pub devices: Vec<DacOutputSettings>,
}

/// General configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Application name
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Application environment (development, production, etc.)
    #[serde(default = "default_environment")]
    pub environment: String,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to use JSON format for logs
    #[serde(default)]
    pub json_format: bool,
}

/// Storage configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory backing the `/`-rooted storage paths
    #[serde(default = "default_storage_root")]
    pub root: String,
}

/// One analog output to bring up at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DacOutputSettings {
    /// Device name, used until a persisted name replaces it
    pub name: String,

    /// Pin used until a persisted pin replaces it
    pub pin: i32,

    /// Settings file name under `/settings/act/`
    #[serde(default = "default_dac_config_file")]
    pub config_file: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            environment: default_environment(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
        }
    }
}

fn default_app_name() -> String {
    "actuflow".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_storage_root() -> String {
    "./data".to_string()
}

fn default_dac_config_file() -> String {
    DEFAULT_DAC_CONFIG_FILE.to_string()
}

impl Config {
    /// Render the configuration as TOML, e.g. to seed a config file
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::serialization(format!("Failed to render configuration: {}", e)))
    }
}

/// A builder for creating a configuration
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config_file: Option<String>,
    environment_prefix: Option<String>,
    override_with: Option<Config>,
}

impl ConfigBuilder {
    /// Create a new ConfigBuilder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the config file path
    pub fn with_config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    /// Set the environment variable prefix for configuration
    pub fn with_environment_prefix<S: AsRef<str>>(mut self, prefix: S) -> Self {
        self.environment_prefix = Some(prefix.as_ref().to_string());
        self
    }

    /// Override with an existing config
    pub fn override_with(mut self, config: Config) -> Self {
        self.override_with = Some(config);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<Config> {
        if let Some(config) = self.override_with {
            return Ok(config);
        }

        let default_config = Config::default();
        let mut config_builder = ConfigLib::builder().add_source(
            ConfigLib::try_from(&default_config)
                .map_err(|e| Error::config(format!("Failed to create default config: {}", e)))?,
        );

        if let Some(config_file) = self.config_file {
            if Path::new(&config_file).exists() {
                debug!("Loading configuration from {}", config_file);
                config_builder = config_builder.add_source(File::with_name(&config_file));
            } else {
                debug!("Configuration file {} does not exist, using defaults", config_file);
            }
        }

        if let Some(prefix) = self.environment_prefix {
            debug!("Loading configuration from environment variables with prefix {}", prefix);
            config_builder = config_builder.add_source(
                Environment::with_prefix(&prefix)
                    .separator("__")
                    .try_parsing(true),
            );
        }

        let config_lib = config_builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build configuration: {}", e)))?;

        let config: Config = config_lib
            .try_deserialize()
            .map_err(|e| Error::config(format!("Failed to deserialize configuration: {}", e)))?;

        info!(devices = config.devices.len(), "Configuration loaded successfully");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.app_name, "actuflow");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.storage.root, "./data");
        assert!(config.devices.is_empty());
    }

    #[test]
    fn test_config_builder_defaults() {
        let config = ConfigBuilder::new().build().unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_config_builder_with_file() -> Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("actuflow.toml");
        fs::write(
            &file_path,
            r#"
                [general]
                environment = "testing"

                [storage]
                root = "/var/lib/actuflow"

                [[devices]]
                name = "fan"
                pin = 25

                [[devices]]
                name = "heater"
                pin = 26
                config_file = "Heater.json"
            "#,
        )?;

        let config = ConfigBuilder::new().with_config_file(&file_path).build()?;

        assert_eq!(config.general.environment, "testing");
        assert_eq!(config.storage.root, "/var/lib/actuflow");
        assert_eq!(config.devices.len(), 2);
        assert_eq!(config.devices[0].config_file, DEFAULT_DAC_CONFIG_FILE);
        assert_eq!(config.devices[1].name, "heater");
        assert_eq!(config.devices[1].config_file, "Heater.json");

        Ok(())
    }

    #[test]
    fn test_missing_config_file_falls_back_to_defaults() -> Result<()> {
        let dir = tempdir()?;
        let config = ConfigBuilder::new()
            .with_config_file(dir.path().join("absent.toml"))
            .build()?;
        assert_eq!(config, Config::default());
        Ok(())
    }

    #[test]
    fn test_config_builder_with_env() -> Result<()> {
        env::set_var("ACTUFLOWTEST__LOGGING__LEVEL", "trace");
        env::set_var("ACTUFLOWTEST__STORAGE__ROOT", "/tmp/actuflow");

        let config = ConfigBuilder::new()
            .with_environment_prefix("actuflowtest")
            .build()?;

        assert_eq!(config.logging.level, "trace");
        assert_eq!(config.storage.root, "/tmp/actuflow");

        env::remove_var("ACTUFLOWTEST__LOGGING__LEVEL");
        env::remove_var("ACTUFLOWTEST__STORAGE__ROOT");

        Ok(())
    }

    #[test]
    fn test_to_toml_is_loadable() -> Result<()> {
        let mut config = Config::default();
        config.devices.push(DacOutputSettings {
            name: "dac".to_string(),
            pin: 25,
            config_file: DEFAULT_DAC_CONFIG_FILE.to_string(),
        });

        let dir = tempdir()?;
        let file_path = dir.path().join("seed.toml");
        fs::write(&file_path, config.to_toml()?)?;

        let loaded = ConfigBuilder::new().with_config_file(&file_path).build()?;
        assert_eq!(loaded, config);
        Ok(())
    }
}
