//! Session-scoped key-value storage.
//!
//! The engine keeps two kinds of state here: boolean toggles written by an
//! external controller (`extension_enabled`, `loop_prevention_enabled`) and
//! the per-host loop ledger. Values are JSON text.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use dashmap::DashMap;
use tracing::warn;

use crate::error::{EngineError, EngineResult};

/// Store key of the global on/off toggle.
pub const ENABLED_KEY: &str = "extension_enabled";

/// Store key of the loop-prevention toggle.
pub const LOOP_PREVENTION_KEY: &str = "loop_prevention_enabled";

/// Small persistent key-value store.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> EngineResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> EngineResult<()>;
    fn delete(&self, key: &str) -> EngineResult<()>;
}

/// Read a boolean flag, falling back to `default` when missing or unreadable.
pub fn read_flag(store: &dyn KeyValueStore, key: &str, default: bool) -> bool {
    match store.get(key) {
        Ok(Some(raw)) => serde_json::from_str::<bool>(&raw).unwrap_or_else(|e| {
            warn!(key = %key, "Malformed flag value {:?}: {}", raw, e);
            default
        }),
        Ok(None) => default,
        Err(e) => {
            warn!(key = %key, "Failed to read flag: {}", e);
            default
        }
    }
}

/// Write a boolean flag.
pub fn write_flag(store: &dyn KeyValueStore, key: &str, value: bool) -> EngineResult<()> {
    store.set(key, &serde_json::to_string(&value)?)
}

/// In-memory store, lost with the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> EngineResult<Option<String>> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    fn set(&self, key: &str, value: &str) -> EngineResult<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> EngineResult<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Directory-backed store with one file per key.
///
/// The directory is the session: values survive process restarts until
/// [`FileStore::clear`] is called or the directory is removed.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) a store directory.
    pub fn open(dir: impl AsRef<Path>) -> EngineResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .map_err(|e| EngineError::Storage(format!("{}: {}", dir.display(), e)))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Drop every stored value, starting a new session.
    pub fn clear(&self) -> EngineResult<usize> {
        let entries = fs::read_dir(&self.dir)
            .map_err(|e| EngineError::Storage(format!("{}: {}", self.dir.display(), e)))?;
        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                fs::remove_file(&path)
                    .map_err(|e| EngineError::Storage(format!("{}: {}", path.display(), e)))?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// File for `key`. Bytes outside `[A-Za-z0-9.-]` become `_xx` hex, so
    /// distinct keys never share a file.
    fn path_for(&self, key: &str) -> PathBuf {
        let mut name = String::with_capacity(key.len());
        for b in key.bytes() {
            if b.is_ascii_alphanumeric() || b == b'.' || b == b'-' {
                name.push(char::from(b));
            } else {
                name.push_str(&format!("_{:02x}", b));
            }
        }
        self.dir.join(format!("{}.json", name))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> EngineResult<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(EngineError::Storage(format!("read {}: {}", key, e))),
        }
    }

    fn set(&self, key: &str, value: &str) -> EngineResult<()> {
        fs::write(self.path_for(key), value)
            .map_err(|e| EngineError::Storage(format!("write {}: {}", key, e)))
    }

    fn delete(&self, key: &str) -> EngineResult<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(EngineError::Storage(format!("delete {}: {}", key, e))),
        }
    }
}
