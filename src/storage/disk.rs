//! Disk-backed storage backend
//!
//! Each logical name maps to one artifact file under the configured output
//! directory; name segments become path components. Saves are atomic
//! (temp file + rename) so a failed save never exposes a partial overwrite.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use super::{split_name, StorageEngine, Store, StoreBackend};
use crate::error::{KilnError, Result};

type StoreMap = BTreeMap<String, Vec<u8>>;
type LiveMap = HashMap<String, Arc<RwLock<StoreMap>>>;

const ARTIFACT_EXT: &str = ".bin";

/// File-store backend rooted at an output directory
#[derive(Debug)]
pub struct DiskEngine {
    output_dir: PathBuf,
    /// Working structures shared by all open handles on a name
    live: Arc<RwLock<LiveMap>>,
}

impl DiskEngine {
    /// Create an engine rooted at `output_dir`, creating the directory if
    /// needed. An inaccessible path is a configuration error.
    pub fn create(output_dir: impl Into<PathBuf>) -> Result<Self> {
        let output_dir = output_dir.into();
        fs::create_dir_all(&output_dir).map_err(|e| {
            KilnError::ConfigError(format!(
                "output directory {} is not accessible: {}",
                output_dir.display(),
                e
            ))
        })?;
        Ok(Self {
            output_dir,
            live: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

fn resolve_path(output_dir: &Path, name: &str, separator: &str) -> Result<PathBuf> {
    let segments = split_name(name, separator)?;
    let mut path = output_dir.to_path_buf();
    let (last, dirs) = segments.split_last().expect("split_name yields >= 1 segment");
    for dir in dirs {
        path.push(dir);
    }
    path.push(format!("{}{}", last, ARTIFACT_EXT));
    Ok(path)
}

fn read_store_file(path: &Path, name: &str) -> Result<StoreMap> {
    let bytes = fs::read(path).map_err(|e| {
        KilnError::StorageError(format!("failed to read store '{}': {}", name, e))
    })?;
    bincode::deserialize(&bytes).map_err(|e| {
        KilnError::StorageError(format!("store '{}' is corrupt: {}", name, e))
    })
}

impl StorageEngine for DiskEngine {
    fn backend_name(&self) -> &'static str {
        super::DISK_BACKEND
    }

    fn separator(&self) -> &'static str {
        std::path::MAIN_SEPARATOR_STR
    }

    fn open(&self, name: &str) -> Result<Store> {
        let path = resolve_path(&self.output_dir, name, self.separator())?;

        let mut live = self.live.write();
        let map = match live.get(name) {
            Some(existing) => existing.clone(),
            None => {
                let initial = if path.exists() {
                    read_store_file(&path, name)?
                } else {
                    StoreMap::new()
                };
                let shared = Arc::new(RwLock::new(initial));
                live.insert(name.to_string(), shared.clone());
                shared
            }
        };
        drop(live);
        debug!(name, path = %path.display(), "opened store");

        Ok(Store::new(
            name,
            Box::new(DiskStore {
                name: name.to_string(),
                output_dir: self.output_dir.clone(),
                map: Some(map),
                live: Arc::clone(&self.live),
            }),
        ))
    }

    fn list_saved(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        walk_artifacts(&self.output_dir, &mut Vec::new(), self.separator(), &mut names)?;
        names.sort();
        Ok(names)
    }
}

fn walk_artifacts(
    dir: &Path,
    prefix: &mut Vec<String>,
    separator: &str,
    out: &mut Vec<String>,
) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_name = entry.file_name().to_string_lossy().to_string();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            prefix.push(file_name);
            walk_artifacts(&entry.path(), prefix, separator, out)?;
            prefix.pop();
        } else if let Some(stem) = file_name.strip_suffix(ARTIFACT_EXT) {
            let mut segments: Vec<&str> = prefix.iter().map(|s| s.as_str()).collect();
            segments.push(stem);
            out.push(segments.join(separator));
        }
    }
    Ok(())
}

struct DiskStore {
    name: String,
    output_dir: PathBuf,
    /// `None` once closed
    map: Option<Arc<RwLock<StoreMap>>>,
    live: Arc<RwLock<LiveMap>>,
}

impl DiskStore {
    fn map(&self) -> &Arc<RwLock<StoreMap>> {
        // Store guards against use after close
        self.map.as_ref().expect("store backend used after close")
    }

    fn separator(&self) -> &'static str {
        std::path::MAIN_SEPARATOR_STR
    }
}

impl StoreBackend for DiskStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.map().read().get(key).cloned())
    }

    fn put(&mut self, key: &str, value: Vec<u8>) -> Result<()> {
        self.map().write().insert(key.to_string(), value);
        Ok(())
    }

    fn save(&mut self, db_name: &str) -> Result<()> {
        let path = resolve_path(&self.output_dir, db_name, self.separator())?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                KilnError::StorageError(format!(
                    "failed to create {} for store '{}': {}",
                    parent.display(),
                    db_name,
                    e
                ))
            })?;
        }

        let snapshot = self.map().read().clone();
        let bytes = bincode::serialize(&snapshot)?;

        // Write to a sibling temp file and rename, so readers only ever see
        // the last durably saved version.
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let tmp = path.with_file_name(format!("{}.tmp", file_name));
        fs::write(&tmp, &bytes).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            KilnError::StorageError(format!("failed to write store '{}': {}", db_name, e))
        })?;
        fs::rename(&tmp, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            KilnError::StorageError(format!("failed to commit store '{}': {}", db_name, e))
        })?;

        if db_name != self.name {
            if let Some(entry) = self.live.read().get(db_name) {
                *entry.write() = snapshot;
            }
        }
        debug!(name = db_name, path = %path.display(), "saved store");
        Ok(())
    }

    fn delete(&mut self) -> Result<()> {
        let path = resolve_path(&self.output_dir, &self.name, self.separator())?;
        if path.exists() {
            fs::remove_file(&path).map_err(|e| {
                KilnError::StorageError(format!(
                    "failed to delete store '{}': {}",
                    self.name, e
                ))
            })?;
        }
        self.live.write().remove(&self.name);
        self.map = None;
        debug!(name = %self.name, "deleted store");
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.map = None;
        Ok(())
    }
}
