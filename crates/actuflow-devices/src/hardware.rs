/*!
 * Hardware binding for analog outputs.
 *
 * [`AnalogOutput`] is the seam between actors and the platform. Binding a pin
 * and writing a value both return a result so platform failures reach the
 * caller.
 */
use std::collections::BTreeSet;
use std::fmt::Debug;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::trace;

/// Error type for hardware operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HardwareError {
    /// The platform cannot drive an analog output on this pin
    #[error("Pin {0} cannot be used as an analog output")]
    InvalidPin(i32),

    /// The pin was written before being configured
    #[error("Pin {0} is not configured for output")]
    NotConfigured(i32),

    /// Platform I/O failure
    #[error("Hardware I/O error: {0}")]
    Io(String),
}

/// A platform able to drive byte-resolution analog outputs
pub trait AnalogOutput: Send + Debug {
    /// Put `pin` into output mode
    fn configure_pin(&mut self, pin: i32) -> Result<(), HardwareError>;

    /// Drive `pin` to `value` out of 255
    fn write(&mut self, pin: i32, value: u8) -> Result<(), HardwareError>;

    /// Return `pin` to the platform; releasing an unbound pin is a no-op
    fn release_pin(&mut self, pin: i32) -> Result<(), HardwareError>;
}

#[derive(Debug, Default)]
struct SimulatedState {
    valid_pins: Option<BTreeSet<i32>>,
    configured: BTreeSet<i32>,
    writes: Vec<(i32, u8)>,
}

/// In-process DAC that records what it is asked to do
///
/// Clones share state, so a test can keep a handle while the device owns another.
#[derive(Debug, Clone, Default)]
pub struct SimulatedDac {
    state: Arc<Mutex<SimulatedState>>,
}

impl SimulatedDac {
    /// A simulator accepting any pin
    pub fn new() -> Self {
        Self::default()
    }

    /// A simulator that only accepts the given pins
    pub fn with_valid_pins<I: IntoIterator<Item = i32>>(pins: I) -> Self {
        let state = SimulatedState {
            valid_pins: Some(pins.into_iter().collect()),
            ..SimulatedState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// A simulator with the two DAC channels of an ESP32 (GPIO 25 and 26)
    pub fn esp32() -> Self {
        Self::with_valid_pins([25, 26])
    }

    /// Pins that have been put into output mode
    pub fn configured_pins(&self) -> Vec<i32> {
        self.state
            .lock()
            .map(|state| state.configured.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Every write so far, oldest first
    pub fn writes(&self) -> Vec<(i32, u8)> {
        self.state
            .lock()
            .map(|state| state.writes.clone())
            .unwrap_or_default()
    }

    /// The most recent write
    pub fn last_write(&self) -> Option<(i32, u8)> {
        self.writes().last().copied()
    }
}

impl AnalogOutput for SimulatedDac {
    fn configure_pin(&mut self, pin: i32) -> Result<(), HardwareError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| HardwareError::Io("simulator state poisoned".to_string()))?;
        if let Some(valid) = &state.valid_pins {
            if !valid.contains(&pin) {
                return Err(HardwareError::InvalidPin(pin));
            }
        }
        state.configured.insert(pin);
        trace!(pin, "Simulated pin configured");
        Ok(())
    }

    fn write(&mut self, pin: i32, value: u8) -> Result<(), HardwareError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| HardwareError::Io("simulator state poisoned".to_string()))?;
        if !state.configured.contains(&pin) {
            return Err(HardwareError::NotConfigured(pin));
        }
        state.writes.push((pin, value));
        trace!(pin, value, "Simulated write");
        Ok(())
    }

    fn release_pin(&mut self, pin: i32) -> Result<(), HardwareError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| HardwareError::Io("simulator state poisoned".to_string()))?;
        state.configured.remove(&pin);
        trace!(pin, "Simulated pin released");
        Ok(())
    }
}

#[cfg(feature = "gpio")]
pub use self::rpi::RppalPwmOutput;

#[cfg(feature = "gpio")]
mod rpi {
    use std::collections::HashMap;

    use rppal::gpio::{Gpio, OutputPin};
    use tracing::debug;

    use super::{AnalogOutput, HardwareError};

    /// Raspberry Pi output approximating a DAC with software PWM
    ///
    /// The written byte becomes the duty cycle `value / 255`.
    #[derive(Debug)]
    pub struct RppalPwmOutput {
        gpio: Gpio,
        frequency_hz: f64,
        pins: HashMap<i32, OutputPin>,
    }

    impl RppalPwmOutput {
        /// Open the GPIO peripheral, driving outputs at `frequency_hz`
        pub fn new(frequency_hz: f64) -> Result<Self, HardwareError> {
            let gpio = Gpio::new().map_err(|e| HardwareError::Io(e.to_string()))?;
            Ok(Self {
                gpio,
                frequency_hz,
                pins: HashMap::new(),
            })
        }
    }

    impl AnalogOutput for RppalPwmOutput {
        fn configure_pin(&mut self, pin: i32) -> Result<(), HardwareError> {
            if self.pins.contains_key(&pin) {
                return Ok(());
            }
            let bcm = u8::try_from(pin).map_err(|_| HardwareError::InvalidPin(pin))?;
            let output = self
                .gpio
                .get(bcm)
                .map_err(|e| HardwareError::Io(format!("GPIO {}: {}", bcm, e)))?
                .into_output();
            self.pins.insert(pin, output);
            debug!(pin, "GPIO configured for PWM output");
            Ok(())
        }

        fn write(&mut self, pin: i32, value: u8) -> Result<(), HardwareError> {
            let output = self
                .pins
                .get_mut(&pin)
                .ok_or(HardwareError::NotConfigured(pin))?;
            output
                .set_pwm_frequency(self.frequency_hz, f64::from(value) / 255.0)
                .map_err(|e| HardwareError::Io(format!("GPIO {}: {}", pin, e)))
        }

        fn release_pin(&mut self, pin: i32) -> Result<(), HardwareError> {
            // Dropping the OutputPin resets the GPIO to its previous mode
            if self.pins.remove(&pin).is_some() {
                debug!(pin, "GPIO released");
            }
            Ok(())
        }
    }
}
