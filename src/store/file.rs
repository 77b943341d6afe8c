//! JSON-file-backed key-value store
//!
//! The whole map is rewritten on every `set`, so whatever is on disk always
//! reflects the last completed write.

use super::{KeyValueStore, StoreError};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, info, warn};

/// On-disk document: the full key map plus a save timestamp
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    saved_at: i64,
    entries: HashMap<String, String>,
}

/// Single-file store with the full map cached in memory
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<HashMap<String, String>>,
}

impl FileStore {
    /// Open a store file, creating parent directories as needed. A missing
    /// file starts an empty map; a corrupt document is dropped with a
    /// warning rather than failing the session.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let entries = if path.exists() {
            let json = fs::read_to_string(&path)?;
            match serde_json::from_str::<StoreDocument>(&json) {
                Ok(doc) => {
                    info!(path = %path.display(), keys = doc.entries.len(), "💾 Store loaded");
                    doc.entries
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Store document is corrupt, starting empty");
                    HashMap::new()
                }
            }
        } else {
            info!(path = %path.display(), "💾 No store file found, starting fresh");
            HashMap::new()
        };

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &HashMap<String, String>) -> Result<(), StoreError> {
        let doc = StoreDocument {
            saved_at: Utc::now().timestamp_millis(),
            entries: entries.clone(),
        };
        let json = serde_json::to_string_pretty(&doc)?;
        fs::write(&self.path, json)?;
        debug!(path = %self.path.display(), keys = entries.len(), "Store flushed");
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().unwrap();
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().unwrap();
        if entries.remove(key).is_none() {
            return Ok(());
        }
        self.persist(&entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store_path(test_name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!(
                "tickerpad_store_{}_{}",
                test_name,
                uuid::Uuid::new_v4()
            ))
            .join("store.json")
    }

    #[test]
    fn test_missing_file_starts_fresh() {
        let path = temp_store_path("missing");
        let store = FileStore::open(&path).unwrap();

        assert_eq!(store.get("cash"), None);
        // Nothing written yet, so there is still no file.
        assert!(!path.exists());

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_values_survive_reopen() {
        let path = temp_store_path("reopen");

        {
            let store = FileStore::open(&path).unwrap();
            store.set("cash", "94695").unwrap();
            store.set("ACME_price", "530.5").unwrap();
            store.set("ACME_shares", "10").unwrap();
        }

        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.get("cash").as_deref(), Some("94695"));
        assert_eq!(store.get("ACME_price").as_deref(), Some("530.5"));
        assert_eq!(store.get("ACME_shares").as_deref(), Some("10"));

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_corrupt_document_starts_empty() {
        let path = temp_store_path("corrupt");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{ this is not json").unwrap();

        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.get("cash"), None);

        // The next write replaces the corrupt document with a valid one.
        store.set("cash", "100000").unwrap();
        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.get("cash").as_deref(), Some("100000"));

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_remove_persists_deletion() {
        let path = temp_store_path("remove");

        {
            let store = FileStore::open(&path).unwrap();
            store.set("ACME_shares", "10").unwrap();
            store.remove("ACME_shares").unwrap();
        }

        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.get("ACME_shares"), None);

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }
}
