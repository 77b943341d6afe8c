//! String key-value persistence
//!
//! Portfolio state lives in a flat string-to-string map so a reload picks up
//! exactly what the last session wrote. Keys follow a fixed scheme: `cash`
//! (shared across instruments), `{instrument}_price` and `{instrument}_shares`.

mod file;

pub use file::FileStore;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;
use thiserror::Error;

/// Store key for the cash balance, shared by every instrument
pub const CASH_KEY: &str = "cash";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store IO failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("Store document is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Flat string-to-string persistence. Writes go through to the backing
/// medium before the call returns; reads are served from memory.
pub trait KeyValueStore: Send + Sync {
    /// Read a value; absent keys yield `None`
    fn get(&self, key: &str) -> Option<String>;

    /// Write a value through to the backing medium
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Delete a key if present
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// In-memory store for tests and ephemeral sessions
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `set` calls observed, including overwrites
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries
            .write()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().unwrap().remove(key);
        Ok(())
    }
}
