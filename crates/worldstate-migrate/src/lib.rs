//! # worldstate-migrate
//!
//! Forward-only schema migrations for the persisted worldstate document.
//!
//! When the shape of the document changes between releases, every change is
//! written as a [`MigrationStep`] with the next free version number. All steps
//! are listed explicitly in the application and validated once at startup by
//! [`MigrationRegistry::build`]. [`MigrationRunner`] then brings a stored
//! document up to date.
//!
//! ## Key Concepts
//!
//! - **Contiguous versions**: step versions are exactly `0..n`, and
//!   `n - 1` must equal the application's declared last migration version.
//! - **Linear chain**: steps run one after another, never skipping a version,
//!   and a step only starts once the previous one has finished.
//! - **All or nothing**: a failing step aborts the run. The runner performs no
//!   I/O itself; callers persist only the final document.
//! - **Bounded fan-out**: steps that process many assets share one
//!   [`IoLimiter`] sized at process start.
//!
//! ## Example
//!
//! ```
//! use worldstate_migrate::{FnStep, MigrationRegistry, MigrationRunner, MigrationStep, StepError};
//! use worldstate_tree::{json, Document, Value};
//!
//! fn add_rotation(mut doc: Document, _ctx: &()) -> Result<Document, StepError> {
//!     if let Some(root) = doc.as_object_mut() {
//!         root.insert("rotation".into(), Value::from(0u64));
//!     }
//!     Ok(doc)
//! }
//!
//! let steps: Vec<Box<dyn MigrationStep<()>>> = vec![Box::new(FnStep::new(0, "rotation", add_rotation))];
//! let registry = MigrationRegistry::build(steps, 0).unwrap();
//!
//! let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! let migrated = runtime
//!     .block_on(MigrationRunner::new(&registry).run(json!({}), 0, &()))
//!     .unwrap();
//! assert_eq!(migrated, json!({ "rotation": 0 }));
//! ```

mod limiter;
mod registry;
mod runner;
pub mod shape;
mod step;

pub use limiter::{default_heavy_io_concurrency, IoLimiter};
pub use registry::{MigrationRegistry, RegistryError};
pub use runner::{run, MigrationError, MigrationRunner};
pub use step::{FnStep, MigrationStep, StepError};
