//! Pluggable named persistence
//!
//! A [`StorageEngine`] binds hierarchical logical names to stores. Two
//! interchangeable backends exist: an in-process map with no external
//! footprint and a disk-backed file store rooted at a configured output
//! directory. Both accept identical name-segment syntax; only the segment
//! separator differs.
//!
//! Handles are scoped: every [`Store`] releases its resources when dropped,
//! on every exit path. Writes to one logical name are not safe under
//! concurrent writers; callers serialize saves per name.

mod disk;
mod memory;

use std::path::PathBuf;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{KilnError, Result};

pub use disk::DiskEngine;
pub use memory::{MemoryEngine, MEMORY_SEPARATOR};

/// Uniform named persistence regardless of backend
pub trait StorageEngine: Send + Sync + std::fmt::Debug {
    /// Registry name of this backend
    fn backend_name(&self) -> &'static str;

    /// Token joining the segments of a hierarchical logical name
    fn separator(&self) -> &'static str;

    /// Bind a logical name to this backend.
    ///
    /// Previously saved content under the name is loaded into the store's
    /// working copy; a name with nothing behind it yields an empty store.
    /// Concurrent opens of the same name within one process share the same
    /// underlying structure.
    fn open(&self, name: &str) -> Result<Store>;

    /// Names with durably saved content, sorted
    fn list_saved(&self) -> Result<Vec<String>>;

    /// Join validated segments into a logical name for this backend
    fn compose_name(&self, segments: &[&str]) -> Result<String> {
        if segments.is_empty() {
            return Err(KilnError::StorageError("empty store name".to_string()));
        }
        for segment in segments {
            validate_segment(segment)?;
        }
        Ok(segments.join(self.separator()))
    }
}

/// Operations a backend provides behind an open handle
pub(crate) trait StoreBackend: Send {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    fn put(&mut self, key: &str, value: Vec<u8>) -> Result<()>;
    fn save(&mut self, db_name: &str) -> Result<()>;
    fn delete(&mut self) -> Result<()>;
    fn close(&mut self) -> Result<()>;
}

/// A logical name bound to one backend instance.
///
/// The handle owns a working copy of the named content. `save` makes the
/// working copy durable; `close` (or dropping the handle) releases engine
/// resources without touching durable content.
pub struct Store {
    name: String,
    backend: Box<dyn StoreBackend>,
    closed: bool,
}

impl Store {
    pub(crate) fn new(name: &str, backend: Box<dyn StoreBackend>) -> Self {
        Self {
            name: name.to_string(),
            backend,
            closed: false,
        }
    }

    /// Logical name this handle is bound to
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(KilnError::StorageError(format!(
                "store '{}' is closed",
                self.name
            )));
        }
        Ok(())
    }

    /// Look up a key. Absence is not an error.
    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.ensure_open()?;
        self.backend.get(key)
    }

    /// Insert or overwrite a key in the working copy
    pub fn put(&mut self, key: &str, value: impl Into<Vec<u8>>) -> Result<()> {
        self.ensure_open()?;
        self.backend.put(key, value.into())
    }

    /// Durably persist the working copy under `db_name`, overwriting any
    /// prior content at that name. A failed save leaves the last durably
    /// saved version visible.
    pub fn save(&mut self, db_name: &str) -> Result<()> {
        self.ensure_open()?;
        self.backend.save(db_name)
    }

    /// Permanently remove persisted content under this handle's name.
    /// Irreversible; consumes the handle. A subsequent `open` of the same
    /// name yields an empty store.
    pub fn delete(mut self) -> Result<()> {
        self.ensure_open()?;
        self.backend.delete()?;
        self.closed = true;
        Ok(())
    }

    /// Release engine resources without deleting persisted content.
    /// Idempotent: calls after the first are no-ops.
    pub fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.backend.close()?;
            self.closed = true;
        }
        Ok(())
    }

    /// Store a value under `key` in binary form
    pub fn put_bin<T: Serialize>(&mut self, key: &str, value: &T) -> Result<()> {
        let bytes = bincode::serialize(value)?;
        self.put(key, bytes)
    }

    /// Fetch and decode a binary value. Absence is `Ok(None)`.
    pub fn get_bin<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Store a value under `key` as JSON
    pub fn put_json<T: Serialize>(&mut self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.put(key, bytes)
    }

    /// Fetch and decode a JSON value. Absence is `Ok(None)`.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("name", &self.name)
            .field("closed", &self.closed)
            .finish()
    }
}

fn validate_segment(segment: &str) -> Result<()> {
    if segment.is_empty() {
        return Err(KilnError::StorageError(
            "empty name segment".to_string(),
        ));
    }
    if segment == "." || segment == ".." {
        return Err(KilnError::StorageError(format!(
            "path-like name segment not allowed: {:?}",
            segment
        )));
    }
    if !segment
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(KilnError::StorageError(format!(
            "invalid character in name segment {:?}",
            segment
        )));
    }
    Ok(())
}

/// Split a logical name into validated segments
pub(crate) fn split_name<'a>(name: &'a str, separator: &str) -> Result<Vec<&'a str>> {
    if name.is_empty() {
        return Err(KilnError::StorageError("empty store name".to_string()));
    }
    let segments: Vec<&str> = name.split(separator).collect();
    for segment in &segments {
        validate_segment(segment)?;
    }
    Ok(segments)
}

/// Backend selection: which engine a configuration resolves to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Registered backend name, `"memory"` or `"disk"`
    pub backend: String,
    /// Root directory for disk-backed artifacts
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

impl StorageConfig {
    /// In-process backend with no external footprint
    pub fn memory() -> Self {
        Self {
            backend: MEMORY_BACKEND.to_string(),
            output_dir: None,
        }
    }

    /// Disk-backed backend rooted at `output_dir`
    pub fn disk(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            backend: DISK_BACKEND.to_string(),
            output_dir: Some(output_dir.into()),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::memory()
    }
}

pub const MEMORY_BACKEND: &str = "memory";
pub const DISK_BACKEND: &str = "disk";

type EngineFactory = fn(&StorageConfig) -> Result<Arc<dyn StorageEngine>>;

fn memory_factory(_config: &StorageConfig) -> Result<Arc<dyn StorageEngine>> {
    Ok(Arc::new(MemoryEngine::new()))
}

fn disk_factory(config: &StorageConfig) -> Result<Arc<dyn StorageEngine>> {
    let output_dir = config.output_dir.as_ref().ok_or_else(|| {
        KilnError::ConfigError("disk backend requires an output directory".to_string())
    })?;
    Ok(Arc::new(DiskEngine::create(output_dir)?))
}

/// Registered backend factories, resolved by name at configuration time
const BACKENDS: &[(&str, EngineFactory)] = &[
    (MEMORY_BACKEND, memory_factory),
    (DISK_BACKEND, disk_factory),
];

/// Resolve a configuration to a backend instance.
///
/// An unknown backend name, a disk configuration without an output
/// directory, or an inaccessible output directory all fail here, before any
/// store is opened.
pub fn build_engine(config: &StorageConfig) -> Result<Arc<dyn StorageEngine>> {
    for (name, factory) in BACKENDS {
        if *name == config.backend {
            return factory(config);
        }
    }
    Err(KilnError::ConfigError(format!(
        "unknown storage backend: {:?}",
        config.backend
    )))
}
