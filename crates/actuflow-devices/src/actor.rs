/*!
 * Actor trait and capability descriptor.
 *
 * An actor is a device that can be started, configured from a settings
 * document, and driven by integer command codes. The owning manager only
 * talks to devices through this trait.
 */
use std::collections::BTreeMap;
use std::fmt::Debug;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use actuflow_core::error::Error as CoreError;

use crate::hardware::HardwareError;

/// Acknowledgment body returned for every handled command
pub const ACK_BODY: &str = r#"{"success": true}"#;

/// Error type for actor operations
#[derive(Error, Debug)]
pub enum ActorError {
    /// The settings document could not be parsed
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Persisted settings could not be read or written
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// The hardware rejected a pin binding or write
    #[error("Hardware error: {0}")]
    Hardware(#[from] HardwareError),

    /// The command code is not listed in the actor's description
    #[error("Unsupported command code: {0}")]
    UnsupportedCommand(i32),

    /// The actor has not completed `begin`
    #[error("Actor not started: {0}")]
    NotStarted(String),

    /// The actor failed to start and is excluded from dispatch
    #[error("Actor unavailable: {0}")]
    Unavailable(String),

    /// No actor registered under that name
    #[error("Actor not found: {0}")]
    NotFound(String),

    /// An actor with that name is already registered
    #[error("Actor already registered: {0}")]
    AlreadyRegistered(String),

    /// Core error
    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

/// Result type for actor operations
pub type Result<T> = std::result::Result<T, ActorError>;

/// Capability descriptor published by an actor
///
/// Built with placeholder values at construction and filled in by `begin`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorDescription {
    /// Display name
    pub name: String,
    /// Device category tag, e.g. `"output"`
    #[serde(rename = "type")]
    pub actor_type: String,
    /// Number of supported commands
    #[serde(rename = "actionQuantity")]
    pub action_quantity: usize,
    /// Command name to command code
    pub actions: BTreeMap<String, i32>,
}

impl ActorDescription {
    /// Create a placeholder description carrying only a name
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            actor_type: String::new(),
            action_quantity: 0,
            actions: BTreeMap::new(),
        }
    }

    /// Look up the code of a named command
    pub fn action_code(&self, action: &str) -> Option<i32> {
        self.actions.get(action).copied()
    }

    /// Render the description as JSON for discovery
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| CoreError::from(e).into())
    }
}

/// Reply to a handled command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResponse {
    /// JSON response body
    pub body: String,
}

impl ActionResponse {
    /// The fixed acknowledgment
    pub fn ack() -> Self {
        Self {
            body: ACK_BODY.to_string(),
        }
    }
}

/// The device contract consumed by the manager
///
/// Calls are expected to be serialized by the owner; none of the methods
/// suspend.
pub trait Actor: Send + Debug {
    /// The capability descriptor
    fn description(&self) -> &ActorDescription;

    /// The display name
    fn name(&self) -> &str {
        &self.description().name
    }

    /// Whether the last `begin` succeeded
    fn is_started(&self) -> bool;

    /// Populate the descriptor, load or create persisted settings and bind hardware
    fn begin(&mut self) -> Result<()>;

    /// Render the current in-memory settings as a JSON document
    fn get_config(&self) -> String;

    /// Parse and apply a settings document, persisting it when `save` is set
    fn set_config(&mut self, config: &str, save: bool) -> Result<()>;

    /// Dispatch a command code with its payload
    fn receive_action(&mut self, action: i32, payload: &str) -> Result<ActionResponse>;
}
