use worldstate_tree::Document;

use crate::error::StoreError;

/// Where the persisted document lives.
///
/// A store holds exactly one document. It does not interpret it: versioning
/// and migration are handled by [`load_and_migrate`](crate::load_and_migrate).
pub trait StateStore {
    /// Read the document. `None` if nothing has been saved yet.
    fn load(&self) -> Result<Option<Document>, StoreError>;

    /// Replace the stored document.
    fn save(&mut self, document: &Document) -> Result<(), StoreError>;

    /// Keep a copy of the currently stored document under `tag`.
    ///
    /// Returns a description of where the copy went, or `None` if there was
    /// nothing to copy.
    fn backup(&mut self, tag: &str) -> Result<Option<String>, StoreError>;
}
