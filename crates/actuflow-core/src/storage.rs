/*!
 * Key/value storage for persisted settings blobs.
 *
 * Keys are `/`-rooted paths such as `/settings/act/AnalogDAC.json`. The
 * [`FileStorage`] backend maps them under a root directory; [`MemoryStorage`]
 * keeps them in process for simulation and tests.
 */
use std::collections::HashMap;
use std::fmt::Debug;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, RwLock};

use tracing::{debug, trace};

use crate::error::{Error, Result};

/// Durable storage of named text blobs
pub trait Storage: Send + Sync + Debug {
    /// Check whether a blob exists at `path`
    fn exists(&self, path: &str) -> Result<bool>;

    /// Read the blob stored at `path`
    fn read(&self, path: &str) -> Result<String>;

    /// Replace the blob stored at `path`
    fn write(&self, path: &str, contents: &str) -> Result<()>;
}

/// A storage handle shared between devices
pub type SharedStorage = Arc<dyn Storage>;

/// Storage backed by files under a root directory
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Create a file storage rooted at `root`
    ///
    /// The directory is created lazily on first write.
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Map a storage key onto a file below the root
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        let mut resolved = self.root.clone();
        for component in relative.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                _ => {
                    return Err(Error::storage(format!("Invalid storage path: {}", path)));
                }
            }
        }
        if resolved == self.root {
            return Err(Error::storage(format!("Invalid storage path: {}", path)));
        }
        Ok(resolved)
    }
}

impl Storage for FileStorage {
    fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.resolve(path)?.is_file())
    }

    fn read(&self, path: &str) -> Result<String> {
        let file = self.resolve(path)?;
        trace!("Reading {}", file.display());
        fs::read_to_string(&file)
            .map_err(|e| Error::storage(format!("Failed to read {}: {}", path, e)))
    }

    fn write(&self, path: &str, contents: &str) -> Result<()> {
        let file = self.resolve(path)?;
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write beside the target and rename so readers never see a partial blob
        let mut staging = file.clone().into_os_string();
        staging.push(".tmp");
        let staging = PathBuf::from(staging);
        fs::write(&staging, contents)
            .map_err(|e| Error::storage(format!("Failed to write {}: {}", path, e)))?;
        fs::rename(&staging, &file)
            .map_err(|e| Error::storage(format!("Failed to commit {}: {}", path, e)))?;

        debug!("Stored {} bytes at {}", contents.len(), path);
        Ok(())
    }
}

/// Storage kept in memory
#[derive(Debug, Default)]
pub struct MemoryStorage {
    blobs: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Create an empty memory storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs
    pub fn len(&self) -> usize {
        self.blobs.read().map(|blobs| blobs.len()).unwrap_or(0)
    }

    /// Whether nothing has been stored yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Storage for MemoryStorage {
    fn exists(&self, path: &str) -> Result<bool> {
        let blobs = self
            .blobs
            .read()
            .map_err(|_| Error::storage("Failed to acquire read lock on memory storage"))?;
        Ok(blobs.contains_key(path))
    }

    fn read(&self, path: &str) -> Result<String> {
        let blobs = self
            .blobs
            .read()
            .map_err(|_| Error::storage("Failed to acquire read lock on memory storage"))?;
        blobs
            .get(path)
            .cloned()
            .ok_or_else(|| Error::storage(format!("No blob at {}", path)))
    }

    fn write(&self, path: &str, contents: &str) -> Result<()> {
        let mut blobs = self
            .blobs
            .write()
            .map_err(|_| Error::storage("Failed to acquire write lock on memory storage"))?;
        blobs.insert(path.to_string(), contents.to_string());
        Ok(())
    }
}
