//! Layout store: where the encoded state layout lives
//!
//! The record is addressed by a stable `LayoutId`, never by anything derived
//! from the active logic, so a logic replacement keeps pointing at the same
//! bytes. Stores deal in opaque encoded records; `StateLayout` owns the
//! format.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::errors::StoreError;

/// Stable identifier of a layout record.
///
/// Restricted to `[A-Za-z0-9_-]` so it is safe to use as a file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayoutId(String);

impl LayoutId {
    pub fn new(id: impl Into<String>) -> Result<Self, StoreError> {
        let id = id.into();
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StoreError::InvalidLayoutId(id));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LayoutId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Persistent home of layout records.
///
/// `commit` must replace the record atomically: after it returns, `load`
/// yields either the old bytes (on error) or the new bytes, never a mix.
pub trait LayoutStore: fmt::Debug + Send {
    /// The record for `id`, or `None` if it was never written.
    fn load(&self, id: &LayoutId) -> Result<Option<Vec<u8>>, StoreError>;

    fn commit(&mut self, id: &LayoutId, record: &[u8]) -> Result<(), StoreError>;
}

/// In-process store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: HashMap<LayoutId, Vec<u8>>,
    commits: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful commits, across all records.
    pub fn commit_count(&self) -> u64 {
        self.commits
    }
}

impl LayoutStore for MemoryStore {
    fn load(&self, id: &LayoutId) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.records.get(id).cloned())
    }

    fn commit(&mut self, id: &LayoutId, record: &[u8]) -> Result<(), StoreError> {
        self.records.insert(id.clone(), record.to_vec());
        self.commits += 1;
        Ok(())
    }
}

/// One file per record under `dir`, named `<id>.layout`.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, id: &LayoutId) -> PathBuf {
        self.dir.join(format!("{}.layout", id))
    }
}

impl LayoutStore for FileStore {
    fn load(&self, id: &LayoutId) -> Result<Option<Vec<u8>>, StoreError> {
        match fs::read(self.path_for(id)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn commit(&mut self, id: &LayoutId, record: &[u8]) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;

        let path = self.path_for(id);
        let tmp_path = self.dir.join(format!("{}.layout.tmp", id));

        // Atomic write: write to tmp, fsync, rename
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(record)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &path)?;

        tracing::debug!(layout_id = %id, bytes = record.len(), "Committed layout record");
        Ok(())
    }
}
