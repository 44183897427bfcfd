use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info};
use worldstate_tree::Document;

use crate::error::StoreError;
use crate::traits::StateStore;

/// JSON file backend.
///
/// Saves go through a temporary file in the same directory that is then
/// renamed over the target, so readers only ever see a complete document.
///
/// # Example
///
/// ```
/// use worldstate_store::{FileStore, StateStore};
/// use worldstate_tree::json;
///
/// let dir = tempfile::tempdir().unwrap();
/// let mut store = FileStore::new(dir.path().join("state.json"));
/// assert!(store.load().unwrap().is_none());
///
/// store.save(&json!({ "version": 3 })).unwrap();
/// assert_eq!(store.load().unwrap(), Some(json!({ "version": 3 })));
/// ```
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// A store backed by the file at `path`. Nothing is read until [`load`](StateStore::load).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the document file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the backup written for `tag`: `<path>.backup.<tag>`.
    pub fn backup_path(&self, tag: &str) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".backup.");
        name.push(tag);
        PathBuf::from(name)
    }

    fn directory(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    fn io_error(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl StateStore for FileStore {
    fn load(&self) -> Result<Option<Document>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no stored document");
                return Ok(None);
            }
            Err(e) => return Err(self.io_error(e)),
        };

        let document = serde_json::from_str(&raw).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })?;
        Ok(Some(document))
    }

    fn save(&mut self, document: &Document) -> Result<(), StoreError> {
        let encoded = serde_json::to_vec_pretty(document).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })?;

        let mut tmp = NamedTempFile::new_in(self.directory()).map_err(|e| self.io_error(e))?;
        tmp.write_all(&encoded).map_err(|e| self.io_error(e))?;
        tmp.as_file().sync_all().map_err(|e| self.io_error(e))?;
        tmp.persist(&self.path).map_err(|e| self.io_error(e.error))?;

        debug!(path = %self.path.display(), bytes = encoded.len(), "document saved");
        Ok(())
    }

    fn backup(&mut self, tag: &str) -> Result<Option<String>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let target = self.backup_path(tag);
        fs::copy(&self.path, &target).map_err(|source| StoreError::Io {
            path: target.clone(),
            source,
        })?;

        info!(backup = %target.display(), "document backed up");
        Ok(Some(target.display().to_string()))
    }
}
