use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::fs;

use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("store directory missing or not writable: {0}")]
    StoreDir(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("malformed store file: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Persisted page-id -> content-hash map, the only durable state.
///
/// The map is a deliberately narrow rolling window: each scan cycle
/// replaces it wholesale rather than merging into a growing history.
/// Writes go through a temp-file-then-rename so a crash mid-write leaves
/// the previous map intact.
#[derive(Debug)]
pub struct DedupStore {
    path: PathBuf,
    map: HashMap<u64, String>,
}

impl DedupStore {
    /// Loads the persisted map; a missing file is an empty map.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, PersistError> {
        let path = path.into();
        let map = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text)?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => HashMap::new(),
            Err(err) => return Err(err.into()),
        };
        Ok(Self { path, map })
    }

    pub fn hash_for(&self, page_id: u64) -> Option<&str> {
        self.map.get(&page_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Replaces the whole map on disk and in memory.
    ///
    /// The file is written before the in-memory map is swapped, so a
    /// restart after this call returns cannot re-report work the new map
    /// already covers.
    pub fn replace(&mut self, staged: &HashMap<u64, String>) -> Result<(), PersistError> {
        let serialized = serde_json::to_string(staged)?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|err| PersistError::StoreDir(err.to_string()))?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(serialized.as_bytes())?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        tmp.persist(&self.path).map_err(|err| PersistError::Io(err.error))?;

        self.map = staged.clone();
        Ok(())
    }
}
