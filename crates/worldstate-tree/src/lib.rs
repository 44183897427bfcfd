//! # worldstate-tree
//!
//! The tree value model shared by the worldstate crates, plus the structural
//! diff used to keep remote replicas of a document in sync.
//!
//! A document is a [`Value::Object`] at the root. Two snapshots of it are
//! compared with [`diff`], which yields a [`StatePatch`]: a patch mapping that
//! contains only changed or added keys, and a flat list of dot-delimited paths
//! of keys that were deleted. [`apply`] reverses the process on the receiving
//! side.
//!
//! ## Quick Start
//!
//! ```
//! use worldstate_tree::{apply, diff, json};
//!
//! let old = json!({ "a": { "x": 1, "y": 2 }, "b": 3 });
//! let cur = json!({ "a": { "x": 1, "y": 9 } });
//!
//! let patch = diff(&old, &cur).unwrap();
//! assert_eq!(patch.deleted_keys, vec!["b".to_string()]);
//!
//! let rebuilt = apply(&old, &patch).unwrap();
//! assert_eq!(rebuilt, cur);
//! ```
//!
//! ## Structural sharing
//!
//! Containers are reference counted. Cloning a [`Value`] is cheap, and
//! [`apply`] reuses every subtree of the base snapshot the patch does not
//! touch, so consumers can detect changes with [`Value::ptr_eq`].

#![warn(missing_docs)]

mod patch;
mod sync;
mod value;

pub use patch::{
    apply, apply_parts, diff, diff_with_prefix, ApplyError, DiffError, Patch, PatchEntry, Side,
    StatePatch,
};
pub use sync::SyncBaseline;
pub use value::{Document, Map, Number, Value, ValueKind};

#[doc(hidden)]
pub mod __private {
    pub use serde_json;
}

/// Build a [`Value`] from a JSON literal.
///
/// ```
/// use worldstate_tree::{json, Value};
///
/// let value = json!({ "hp": 12, "conditions": ["prone"] });
/// assert!(value.is_object());
/// assert_eq!(value.get("hp").and_then(Value::as_u64), Some(12));
/// ```
#[macro_export]
macro_rules! json {
    ($($tt:tt)+) => {
        $crate::Value::from($crate::__private::serde_json::json!($($tt)+))
    };
}
