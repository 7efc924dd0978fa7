/*!
 * Settings store adapter.
 *
 * Locates an actor's persisted settings blob at `/settings/act/<file>` in the
 * shared [`Storage`](actuflow_core::storage::Storage).
 */
use tracing::debug;

use actuflow_core::storage::SharedStorage;

use crate::actor::{ActorError, Result};

/// Directory holding actor settings blobs
pub const SETTINGS_DIR: &str = "/settings/act/";

/// Access to one actor's settings blob
#[derive(Debug, Clone)]
pub struct ConfigStore {
    storage: SharedStorage,
    path: String,
}

impl ConfigStore {
    /// Bind to the blob named `config_file`
    pub fn new<S: AsRef<str>>(storage: SharedStorage, config_file: S) -> Self {
        Self {
            storage,
            path: format!("{}{}", SETTINGS_DIR, config_file.as_ref()),
        }
    }

    /// The derived storage path
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether a blob has been persisted
    pub fn exists(&self) -> Result<bool> {
        self.storage
            .exists(&self.path)
            .map_err(|e| ActorError::Persistence(e.to_string()))
    }

    /// Read the persisted blob
    pub fn load(&self) -> Result<String> {
        debug!(path = %self.path, "Loading settings");
        self.storage
            .read(&self.path)
            .map_err(|e| ActorError::Persistence(e.to_string()))
    }

    /// Persist `config` verbatim
    pub fn save(&self, config: &str) -> Result<()> {
        debug!(path = %self.path, "Saving settings");
        self.storage
            .write(&self.path, config)
            .map_err(|e| ActorError::Persistence(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use actuflow_core::storage::MemoryStorage;

    #[test]
    fn test_path_derivation() {
        let store = ConfigStore::new(Arc::new(MemoryStorage::new()), "AnalogDAC.json");
        assert_eq!(store.path(), "/settings/act/AnalogDAC.json");
    }

    #[test]
    fn test_save_then_load() {
        let storage = Arc::new(MemoryStorage::new());
        let store = ConfigStore::new(storage.clone(), "Fan.json");
        assert!(!store.exists().unwrap());
        store.save(r#"{"Name":"fan","Pin":25}"#).unwrap();
        assert!(store.exists().unwrap());
        assert_eq!(store.load().unwrap(), r#"{"Name":"fan","Pin":25}"#);
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn test_load_missing_is_persistence_error() {
        let store = ConfigStore::new(Arc::new(MemoryStorage::new()), "None.json");
        assert!(matches!(store.load(), Err(ActorError::Persistence(_))));
    }
}
