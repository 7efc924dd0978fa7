/*!
 * DAC output example.
 *
 * Brings up the outputs listed in a config file (or one default output),
 * persisting their settings under the configured storage root, then sweeps
 * each available output through a few values on simulated hardware.
 *
 * Run with: cargo run --example dac_output_example -- [config.toml]
 */
use std::sync::Arc;

use actuflow_core::config::{ConfigBuilder, DacOutputSettings, DEFAULT_DAC_CONFIG_FILE};
use actuflow_core::logging;
use actuflow_core::storage::{FileStorage, SharedStorage};
use actuflow_devices::{available_bindings, ActorManager, DacCommand, SimulatedDac};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut builder = ConfigBuilder::new().with_environment_prefix("actuflow");
    if let Some(path) = std::env::args().nth(1) {
        builder = builder.with_config_file(path);
    }
    let mut config = builder.build()?;
    logging::init_from_config(&config.logging)?;
    info!(
        "actuflow core {} / devices {}, bindings: {:?}",
        actuflow_core::VERSION,
        actuflow_devices::VERSION,
        available_bindings()
    );

    if config.devices.is_empty() {
        config.devices.push(DacOutputSettings {
            name: "dac".to_string(),
            pin: 25,
            config_file: DEFAULT_DAC_CONFIG_FILE.to_string(),
        });
    }

    let storage: SharedStorage = Arc::new(FileStorage::new(&config.storage.root));
    let manager = ActorManager::from_config(&config, storage, |_| SimulatedDac::esp32()).await?;

    let summary = manager.start_all().await;
    for name in &summary.unavailable {
        warn!("{} did not start", name);
    }

    let mut targets = Vec::new();
    for (name, description) in manager.describe_all().await {
        info!("Discovered {}: {}", name, description.to_json()?);
        if let Some(code) = description.action_code(DacCommand::SET_VOLTAGE_NAME) {
            targets.push((name, code));
        }
    }

    for (name, code) in &targets {
        for value in ["0", "128", "300"] {
            let response = manager.dispatch(name, *code, value).await?;
            info!("{} setvoltage {} -> {}", name, value, response.body);
        }
        info!("{} settings: {}", name, manager.get_config(name).await?);
    }

    Ok(())
}
