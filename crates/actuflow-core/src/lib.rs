/*!
 * actuflow Core
 *
 * This crate provides the shared plumbing for actuflow: errors, logging,
 * process configuration, and the storage that actors persist settings into.
 */

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod logging;
pub mod prelude;
pub mod storage;

pub use error::{Error, Result};

/// actuflow core crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
