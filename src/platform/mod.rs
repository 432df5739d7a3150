//! Platform capabilities
//!
//! Small traits standing in for ambient browser facilities (origin storage,
//! crypto-random ids, the wall clock, viewport size) so the core state layer
//! runs and tests without a real browser environment.

use chrono::{DateTime, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("storage quota exceeded")]
    QuotaExceeded,

    #[error("serialization failed: {0}")]
    Serialization(String),
}

/// Origin-scoped key-value storage. Values are JSON strings.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Source of collision-free opaque identifiers.
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Wall clock, injectable so staleness and cooldown logic is testable.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn now_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

/// Reports the current viewport width for breakpoint derivation.
pub trait ViewportProbe: Send + Sync {
    fn viewport_width(&self) -> f64;
}

/// Reads a JSON value from storage, falling back to the default on a missing
/// key, a read failure, or a malformed entry. Readers must never surface
/// corrupt storage as a hard error.
pub fn read_json_or_default<T>(store: &dyn KeyValueStore, key: &str) -> T
where
    T: DeserializeOwned + Default,
{
    match store.get(key) {
        Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(key, error = %e, "malformed storage entry, using default");
            T::default()
        }),
        Ok(None) => T::default(),
        Err(e) => {
            tracing::warn!(key, error = %e, "storage read failed, using default");
            T::default()
        }
    }
}

/// Serializes and writes a JSON value. The write error is returned so callers
/// can decide how to degrade; serialization failures never panic.
pub fn write_json<T: Serialize>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let raw = serde_json::to_string(value).map_err(|e| StorageError::Serialization(e.to_string()))?;
    store.set(key, &raw)
}

/// In-memory store, the default for tests and for sessions where persistent
/// storage is blocked.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        entries.remove(key);
        Ok(())
    }
}

/// JSON-file-backed store, the non-browser analog of origin storage. Used by
/// the demo binary so guest state survives a process restart.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = std::fs::read_to_string(&path)
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();
        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    fn flush(&self, entries: &HashMap<String, String>) -> Result<(), StorageError> {
        let raw = serde_json::to_string_pretty(entries)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        std::fs::write(&self.path, raw).map_err(|e| StorageError::Unavailable(e.to_string()))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        entries.remove(key);
        self.flush(&entries)
    }
}

#[derive(Debug, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fixed-width probe for non-browser hosts and tests.
#[derive(Debug)]
pub struct FixedViewport(pub f64);

impl ViewportProbe for FixedViewport {
    fn viewport_width(&self) -> f64 {
        self.0
    }
}

/// Clock pinned to an adjustable instant. Test-only outside the demo binary.
#[derive(Debug)]
pub struct FixedClock {
    millis: Mutex<i64>,
}

impl FixedClock {
    pub fn at_millis(millis: i64) -> Self {
        Self {
            millis: Mutex::new(millis),
        }
    }

    pub fn advance(&self, delta_ms: i64) {
        if let Ok(mut m) = self.millis.lock() {
            *m += delta_ms;
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        let millis = self.millis.lock().map(|m| *m).unwrap_or(0);
        Utc.timestamp_millis_opt(millis).single().unwrap_or_default()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Blob {
        n: u32,
    }

    #[test]
    fn test_memory_roundtrip() {
        let store = MemoryStore::new();
        write_json(&store, "k", &Blob { n: 7 }).unwrap();
        assert_eq!(read_json_or_default::<Blob>(&store, "k"), Blob { n: 7 });
    }

    #[test]
    fn test_malformed_entry_falls_back_to_default() {
        let store = MemoryStore::new();
        store.set("k", "{not json").unwrap();
        assert_eq!(read_json_or_default::<Blob>(&store, "k"), Blob::default());
    }

    #[test]
    fn test_missing_key_is_default() {
        let store = MemoryStore::new();
        assert_eq!(read_json_or_default::<Blob>(&store, "absent"), Blob::default());
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        {
            let store = FileStore::open(&path);
            write_json(&store, "k", &Blob { n: 3 }).unwrap();
        }
        let reopened = FileStore::open(&path);
        assert_eq!(read_json_or_default::<Blob>(&reopened, "k"), Blob { n: 3 });
    }
}
