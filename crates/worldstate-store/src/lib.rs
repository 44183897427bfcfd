//! # worldstate-store
//!
//! Persistence for the worldstate document.
//!
//! The document lives in a single JSON file. Its root carries a `version`
//! field: the version of the last migration applied to it. On startup
//! [`load_and_migrate`] reads the file, runs whatever migrations are
//! pending and writes the result back exactly once.
//!
//! ## Backends
//!
//! | Backend | Use |
//! |---------|-----|
//! | [`FileStore`] | JSON file on disk, atomic replace, `<path>.backup.<tag>` copies |
//! | [`MemoryStore`] | Tests and dry runs; records every save and backup |
//!
//! ## Example
//!
//! ```
//! use worldstate_migrate::{FnStep, MigrationRegistry, MigrationStep, StepError};
//! use worldstate_store::{load_and_migrate, LoadOptions, LoadOutcome, MemoryStore};
//! use worldstate_tree::{json, Document, Value};
//!
//! fn add_notes(mut doc: Document, _: &()) -> Result<Document, StepError> {
//!     if let Some(root) = doc.as_object_mut() {
//!         root.insert("notes".into(), Value::empty_object());
//!     }
//!     Ok(doc)
//! }
//!
//! let steps: Vec<Box<dyn MigrationStep<()>>> = vec![Box::new(FnStep::new(0, "notes", add_notes))];
//! let registry = MigrationRegistry::build(steps, 0).unwrap();
//! let mut store = MemoryStore::with_document(json!({ "maps": {} }));
//!
//! let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! let outcome = rt
//!     .block_on(load_and_migrate(&mut store, &registry, &(), LoadOptions::default()))
//!     .unwrap();
//!
//! let LoadOutcome::Loaded { document, plan, .. } = outcome else { panic!() };
//! assert_eq!(plan.pending(), 1);
//! assert_eq!(document, json!({ "maps": {}, "notes": {}, "version": 0 }));
//! ```

mod error;
mod file;
mod loader;
mod memory;
mod traits;

pub use error::StoreError;
pub use file::FileStore;
pub use loader::{
    document_version, load_and_migrate, stamp_version, LoadOptions, LoadOutcome, MigrationPlan,
    VERSION_KEY,
};
pub use memory::MemoryStore;
pub use traits::StateStore;
