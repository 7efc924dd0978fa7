/*!
 * Prelude module for actuflow core.
 *
 * This module re-exports commonly used types and functions from the actuflow core crate
 * to make them easier to import.
 */

// Re-export error types
pub use crate::error::{Error, Result};

// Re-export config types
pub use crate::config::{Config, ConfigBuilder, DacOutputSettings};

// Re-export storage types
pub use crate::storage::{FileStorage, MemoryStorage, SharedStorage, Storage};

// Re-export logging helpers
pub use crate::logging::{device_span, operation_span};
pub use tracing::{debug, error, info, trace, warn};
