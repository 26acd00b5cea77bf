//! In-process storage backend
//!
//! Stores live entirely in memory. "Durable" content survives handle
//! close/reopen within the engine's lifetime but has no external footprint.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use super::{split_name, StorageEngine, Store, StoreBackend};
use crate::error::Result;

/// Fixed segment-joining token for in-process logical names
pub const MEMORY_SEPARATOR: &str = "::";

type StoreMap = BTreeMap<String, Vec<u8>>;
type LiveMap = HashMap<String, Arc<RwLock<StoreMap>>>;

/// In-process map backend
#[derive(Debug)]
pub struct MemoryEngine {
    /// Working structures shared by all open handles on a name
    live: Arc<RwLock<LiveMap>>,
    /// Durably saved snapshots, by name
    saved: Arc<RwLock<HashMap<String, StoreMap>>>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self {
            live: Arc::new(RwLock::new(HashMap::new())),
            saved: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageEngine for MemoryEngine {
    fn backend_name(&self) -> &'static str {
        super::MEMORY_BACKEND
    }

    fn separator(&self) -> &'static str {
        MEMORY_SEPARATOR
    }

    fn open(&self, name: &str) -> Result<Store> {
        split_name(name, self.separator())?;

        let map = {
            let mut live = self.live.write();
            live.entry(name.to_string())
                .or_insert_with(|| {
                    let seeded = self.saved.read().get(name).cloned().unwrap_or_default();
                    Arc::new(RwLock::new(seeded))
                })
                .clone()
        };
        debug!(name, backend = self.backend_name(), "opened store");

        Ok(Store::new(
            name,
            Box::new(MemoryStore {
                name: name.to_string(),
                map: Some(map),
                live: Arc::clone(&self.live),
                saved: Arc::clone(&self.saved),
            }),
        ))
    }

    fn list_saved(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.saved.read().keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

struct MemoryStore {
    name: String,
    /// `None` once closed
    map: Option<Arc<RwLock<StoreMap>>>,
    live: Arc<RwLock<LiveMap>>,
    saved: Arc<RwLock<HashMap<String, StoreMap>>>,
}

impl MemoryStore {
    fn map(&self) -> &Arc<RwLock<StoreMap>> {
        // Store guards against use after close
        self.map.as_ref().expect("store backend used after close")
    }
}

impl StoreBackend for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.map().read().get(key).cloned())
    }

    fn put(&mut self, key: &str, value: Vec<u8>) -> Result<()> {
        self.map().write().insert(key.to_string(), value);
        Ok(())
    }

    fn save(&mut self, db_name: &str) -> Result<()> {
        split_name(db_name, MEMORY_SEPARATOR)?;
        let snapshot = self.map().read().clone();
        // Keep a saved name's live structure coherent with its durable copy.
        if db_name != self.name {
            if let Some(entry) = self.live.read().get(db_name) {
                *entry.write() = snapshot.clone();
            }
        }
        self.saved.write().insert(db_name.to_string(), snapshot);
        debug!(name = db_name, "saved in-process store");
        Ok(())
    }

    fn delete(&mut self) -> Result<()> {
        self.saved.write().remove(&self.name);
        self.live.write().remove(&self.name);
        self.map = None;
        debug!(name = %self.name, "deleted in-process store");
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.map = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_absent() {
        let engine = MemoryEngine::new();
        let mut store = engine.open("a::b").unwrap();
        assert_eq!(store.get("missing").unwrap(), None);
        store.put("k", b"v".to_vec()).unwrap();
        assert_eq!(store.get("k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn test_save_then_reopen_round_trip() {
        let engine = MemoryEngine::new();
        let mut store = engine.open("model").unwrap();
        store.put("weights", b"abc".to_vec()).unwrap();
        store.save("model").unwrap();
        store.close().unwrap();

        let reopened = engine.open("model").unwrap();
        assert_eq!(reopened.get("weights").unwrap(), Some(b"abc".to_vec()));
        assert_eq!(engine.list_saved().unwrap(), vec!["model".to_string()]);
    }

    #[test]
    fn test_delete_is_irreversible() {
        let engine = MemoryEngine::new();
        let mut store = engine.open("model").unwrap();
        store.put("weights", b"abc".to_vec()).unwrap();
        store.save("model").unwrap();

        store.delete().unwrap();
        let reopened = engine.open("model").unwrap();
        assert_eq!(reopened.get("weights").unwrap(), None);
        assert!(engine.list_saved().unwrap().is_empty());
    }

    #[test]
    fn test_concurrent_opens_share_structure() {
        let engine = MemoryEngine::new();
        let mut first = engine.open("shared").unwrap();
        let second = engine.open("shared").unwrap();
        first.put("k", b"v".to_vec()).unwrap();
        assert_eq!(second.get("k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn test_close_is_idempotent() {
        let engine = MemoryEngine::new();
        let mut store = engine.open("a").unwrap();
        store.close().unwrap();
        store.close().unwrap();
        assert!(store.is_closed());
        assert!(store.get("k").is_err());
    }

    #[test]
    fn test_invalid_name_rejected() {
        let engine = MemoryEngine::new();
        assert!(engine.open("a::..").is_err());
        assert!(engine.open("").is_err());
        assert!(engine.open("a b").is_err());
    }
}
