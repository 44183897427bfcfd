use std::collections::BTreeMap;

use worldstate_tree::Document;

use crate::error::StoreError;
use crate::traits::StateStore;

/// In-memory backend.
///
/// Nothing touches disk. Every save and backup is recorded so tests can
/// check what would have been written.
///
/// # Example
///
/// ```
/// use worldstate_store::{MemoryStore, StateStore};
/// use worldstate_tree::json;
///
/// let mut store = MemoryStore::new();
/// store.save(&json!({ "version": 1 })).unwrap();
/// store.backup("1").unwrap();
///
/// assert_eq!(store.save_count(), 1);
/// assert_eq!(store.backup_document("1"), Some(&json!({ "version": 1 })));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    document: Option<Document>,
    backups: BTreeMap<String, Document>,
    saves: usize,
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store already holding `document`. Not counted as a save.
    pub fn with_document(document: Document) -> Self {
        Self {
            document: Some(document),
            ..Self::default()
        }
    }

    /// The stored document, if any.
    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    /// Number of times [`save`](StateStore::save) was called.
    pub fn save_count(&self) -> usize {
        self.saves
    }

    /// The copy taken by `backup(tag)`.
    pub fn backup_document(&self, tag: &str) -> Option<&Document> {
        self.backups.get(tag)
    }

    /// Tags of every backup taken, sorted.
    pub fn backup_tags(&self) -> impl Iterator<Item = &str> {
        self.backups.keys().map(String::as_str)
    }
}

impl StateStore for MemoryStore {
    fn load(&self) -> Result<Option<Document>, StoreError> {
        Ok(self.document.clone())
    }

    fn save(&mut self, document: &Document) -> Result<(), StoreError> {
        self.document = Some(document.clone());
        self.saves += 1;
        Ok(())
    }

    fn backup(&mut self, tag: &str) -> Result<Option<String>, StoreError> {
        let Some(document) = &self.document else {
            return Ok(None);
        };
        self.backups.insert(tag.to_string(), document.clone());
        Ok(Some(format!("memory:{tag}")))
    }
}
