/*!
 * Generic DAC output.
 *
 * A single analog output on one pin. On `begin` it reuses the settings blob
 * persisted at `/settings/act/<file>`, or stores its constructor values there
 * as defaults, then puts the pin into output mode. Command `0` ("setvoltage")
 * writes a byte to the pin.
 */
use serde_json::Value;
use tracing::{debug, error, info, warn};

use actuflow_core::config::{DacOutputSettings, DEFAULT_DAC_CONFIG_FILE};
use actuflow_core::logging::{device_span, operation_span};
use actuflow_core::storage::SharedStorage;

use crate::actor::{ActionResponse, Actor, ActorDescription, ActorError, Result};
use crate::hardware::AnalogOutput;
use crate::store::ConfigStore;

/// Category tag advertised by analog outputs
pub const OUTPUT_TYPE: &str = "output";

/// Commands understood by [`GenericDacOutput`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DacCommand {
    /// Drive the output to a value out of 255
    SetVoltage(u8),
}

impl DacCommand {
    /// Code of the "setvoltage" command
    pub const SET_VOLTAGE: i32 = 0;

    /// Name of the "setvoltage" command in the description
    pub const SET_VOLTAGE_NAME: &'static str = "setvoltage";

    /// Decode a command code and its payload
    pub fn decode(action: i32, payload: &str) -> Result<Self> {
        match action {
            Self::SET_VOLTAGE => Ok(DacCommand::SetVoltage(clamp_to_byte(parse_leading_int(
                payload,
            )))),
            other => Err(ActorError::UnsupportedCommand(other)),
        }
    }
}

/// Parse the integer at the start of `payload`
///
/// Leading whitespace and a sign are accepted, parsing stops at the first
/// non-digit, no digits at all yields 0, and overflow saturates.
pub fn parse_leading_int(payload: &str) -> i64 {
    let trimmed = payload.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let mut value: i64 = 0;
    for digit in digits.bytes().take_while(u8::is_ascii_digit) {
        let digit = i64::from(digit - b'0');
        value = if negative {
            value.saturating_mul(10).saturating_sub(digit)
        } else {
            value.saturating_mul(10).saturating_add(digit)
        };
    }
    value
}

/// Saturate into the 0..=255 range
pub fn clamp_to_byte(value: i64) -> u8 {
    // Lossless after the clamp
    value.clamp(0, 255) as u8
}

/// Live output settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputConfig {
    /// Pin driven by the output
    pub pin: i32,
}

/// Persisted settings document
///
/// Any well-formed JSON is accepted. A missing or non-string `Name` becomes
/// its JSON text (`"null"` when absent); a missing or non-numeric `Pin`
/// becomes 0 and fractional pins are truncated.
#[derive(Debug, PartialEq, Eq)]
struct SettingsDocument {
    name: String,
    pin: i32,
}

impl SettingsDocument {
    fn parse(config: &str) -> serde_json::Result<Self> {
        let document: Value = serde_json::from_str(config)?;
        let name = match document.get("Name") {
            Some(Value::String(name)) => name.clone(),
            Some(other) => other.to_string(),
            None => Value::Null.to_string(),
        };
        let pin = document.get("Pin").map(coerce_pin).unwrap_or(0);
        Ok(Self { name, pin })
    }
}

fn coerce_pin(value: &Value) -> i32 {
    match value {
        Value::Number(number) => match number.as_i64() {
            Some(pin) => pin.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32,
            // Float-to-int casts truncate and saturate
            None => number.as_f64().map_or(0, |pin| pin as i32),
        },
        Value::Bool(flag) => i32::from(*flag),
        _ => 0,
    }
}

/// An analog output on a single pin
#[derive(Debug)]
pub struct GenericDacOutput<H: AnalogOutput> {
    description: ActorDescription,
    output_config: OutputConfig,
    store: ConfigStore,
    hardware: H,
    started: bool,
}

impl<H: AnalogOutput> GenericDacOutput<H> {
    /// Create an output that keeps its settings in `AnalogDAC.json`
    pub fn new<S: Into<String>>(name: S, pin: i32, storage: SharedStorage, hardware: H) -> Self {
        Self::with_config_file(name, pin, DEFAULT_DAC_CONFIG_FILE, storage, hardware)
    }

    /// Create an output that keeps its settings in `config_file`
    pub fn with_config_file<S: Into<String>, F: AsRef<str>>(
        name: S,
        pin: i32,
        config_file: F,
        storage: SharedStorage,
        hardware: H,
    ) -> Self {
        Self {
            description: ActorDescription::new(name),
            output_config: OutputConfig { pin },
            store: ConfigStore::new(storage, config_file),
            hardware,
            started: false,
        }
    }

    /// Create an output from a `[[devices]]` entry
    pub fn from_settings(settings: &DacOutputSettings, storage: SharedStorage, hardware: H) -> Self {
        Self::with_config_file(
            settings.name.clone(),
            settings.pin,
            &settings.config_file,
            storage,
            hardware,
        )
    }

    /// The live output settings
    pub fn output_config(&self) -> OutputConfig {
        self.output_config
    }

    /// Where the settings blob is persisted
    pub fn config_path(&self) -> &str {
        self.store.path()
    }

    fn describe(&mut self) {
        self.description.action_quantity = 1;
        self.description.actor_type = OUTPUT_TYPE.to_string();
        self.description.actions.clear();
        self.description
            .actions
            .insert(DacCommand::SET_VOLTAGE_NAME.to_string(), DacCommand::SET_VOLTAGE);
    }

    fn configure_output(&mut self, pin: i32) -> Result<()> {
        self.hardware.configure_pin(pin)?;
        debug!(pin, "Output pin configured");
        Ok(())
    }

    fn release_output(&mut self, pin: i32) {
        if let Err(e) = self.hardware.release_pin(pin) {
            warn!(pin, "Failed to release pin: {}", e);
        }
    }

    fn bootstrap(&mut self) -> Result<()> {
        if self.store.exists()? {
            info!(path = %self.store.path(), "Loading persisted settings");
            let config = self.store.load()?;
            self.set_config(&config, false)
        } else {
            info!(path = %self.store.path(), "No persisted settings, storing defaults");
            let defaults = self.get_config();
            self.set_config(&defaults, true)
        }
    }
}

impl<H: AnalogOutput> Actor for GenericDacOutput<H> {
    fn description(&self) -> &ActorDescription {
        &self.description
    }

    fn is_started(&self) -> bool {
        self.started
    }

    fn begin(&mut self) -> Result<()> {
        let span = device_span(&self.description.name, self.store.path());
        let _guard = span.enter();

        self.started = false;
        self.describe();

        match self.bootstrap() {
            Ok(()) => {
                self.started = true;
                info!(pin = self.output_config.pin, "Output started");
                Ok(())
            }
            Err(e) => {
                error!("Output failed to start: {}", e);
                Err(e)
            }
        }
    }

    fn get_config(&self) -> String {
        serde_json::json!({
            "Name": self.description.name,
            "Pin": self.output_config.pin,
        })
        .to_string()
    }

    fn set_config(&mut self, config: &str, save: bool) -> Result<()> {
        let span = operation_span("set_config", &self.description.name);
        let _guard = span.enter();

        let document = SettingsDocument::parse(config).map_err(|e| {
            error!("Deserialization failed: {}", e);
            ActorError::InvalidConfig(e.to_string())
        })?;

        // Nothing below may touch the live settings until every step has succeeded
        self.configure_output(document.pin)?;
        if save {
            if let Err(e) = self.store.save(config) {
                error!("Failed to persist settings: {}", e);
                if !self.started || document.pin != self.output_config.pin {
                    self.release_output(document.pin);
                }
                return Err(e);
            }
        }

        self.description.name = document.name;
        self.output_config.pin = document.pin;
        Ok(())
    }

    fn receive_action(&mut self, action: i32, payload: &str) -> Result<ActionResponse> {
        let command = DacCommand::decode(action, payload).map_err(|e| {
            warn!(action, "Ignoring command: {}", e);
            e
        })?;

        match command {
            DacCommand::SetVoltage(value) => {
                debug!(pin = self.output_config.pin, value, "setvoltage");
                self.hardware.write(self.output_config.pin, value)?;
            }
        }

        Ok(ActionResponse::ack())
    }
}
