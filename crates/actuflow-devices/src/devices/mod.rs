//! Device implementations.

pub mod dac_output;

pub use dac_output::{DacCommand, GenericDacOutput, OutputConfig};
