use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::errors::{ServiceError, ServiceResult};

#[derive(Debug)]
enum Backend {
    Dir(PathBuf),
    Memory(Mutex<HashMap<String, String>>),
}

/// Key/value store for client scratch state (session, cart, wishlist).
///
/// Values are JSON documents. The directory backend keeps one `<key>.json`
/// file per key; the memory backend is used by tests and `--ephemeral` runs.
#[derive(Debug, Clone)]
pub struct LocalStore {
    backend: Arc<Backend>,
}

impl LocalStore {
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            backend: Arc::new(Backend::Dir(dir.into())),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            backend: Arc::new(Backend::Memory(Mutex::new(HashMap::new()))),
        }
    }

    fn key_path(dir: &Path, key: &str) -> PathBuf {
        dir.join(format!("{key}.json"))
    }

    fn read_raw(&self, key: &str) -> ServiceResult<Option<String>> {
        match self.backend.as_ref() {
            Backend::Dir(dir) => {
                let path = Self::key_path(dir, key);
                if !path.exists() {
                    return Ok(None);
                }
                Ok(Some(fs::read_to_string(&path)?))
            }
            Backend::Memory(map) => Ok(map
                .lock()
                .map_err(|_| ServiceError::Storage("local store lock poisoned".into()))?
                .get(key)
                .cloned()),
        }
    }

    /// Reads `key`. A document that no longer parses is discarded and
    /// treated as absent.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> ServiceResult<Option<T>> {
        let Some(raw) = self.read_raw(key)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                warn!(key, error = %err, "discarding unreadable stored value");
                self.remove(key)?;
                Ok(None)
            }
        }
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> ServiceResult<()> {
        let payload = serde_json::to_string_pretty(value)?;
        match self.backend.as_ref() {
            Backend::Dir(dir) => {
                fs::create_dir_all(dir)?;
                fs::write(Self::key_path(dir, key), payload)?;
            }
            Backend::Memory(map) => {
                map.lock()
                    .map_err(|_| ServiceError::Storage("local store lock poisoned".into()))?
                    .insert(key.to_string(), payload);
            }
        }
        debug!(key, "stored value");
        Ok(())
    }

    pub fn remove(&self, key: &str) -> ServiceResult<()> {
        match self.backend.as_ref() {
            Backend::Dir(dir) => {
                let path = Self::key_path(dir, key);
                if path.exists() {
                    fs::remove_file(path)?;
                }
            }
            Backend::Memory(map) => {
                map.lock()
                    .map_err(|_| ServiceError::Storage("local store lock poisoned".into()))?
                    .remove(key);
            }
        }
        Ok(())
    }
}
