/*!
 * actuflow Devices
 *
 * This crate provides the actor contract, the hardware binding seam, the
 * generic DAC output, and the manager that owns a set of actors.
 */

#![warn(missing_docs)]

// Re-export core types
pub use actuflow_core::prelude;

pub mod actor;
pub mod devices;
pub mod hardware;
pub mod manager;
pub mod store;

pub use actor::{ActionResponse, Actor, ActorDescription, ActorError, Result, ACK_BODY};
pub use devices::{DacCommand, GenericDacOutput, OutputConfig};
pub use hardware::{AnalogOutput, HardwareError, SimulatedDac};
pub use manager::{ActorManager, ActorStatus, ManagerEvent, ManagerEventKind, StartSummary};
pub use store::{ConfigStore, SETTINGS_DIR};

#[cfg(feature = "gpio")]
pub use hardware::RppalPwmOutput;

/// actuflow devices crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Hardware bindings compiled into this build
pub fn available_bindings() -> Vec<&'static str> {
    let mut bindings = vec!["simulated"];
    if cfg!(feature = "gpio") {
        bindings.push("gpio");
    }
    bindings
}
