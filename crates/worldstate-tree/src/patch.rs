use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::de::Deserializer;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::value::{Map, Value, ValueKind};

/// One change recorded in a [`Patch`].
#[derive(Debug, Clone, PartialEq)]
pub enum PatchEntry {
    /// Replace (or add) the key with this value.
    Set(Value),
    /// Both sides are objects; merge this sub-patch into the existing object.
    Nested(Patch),
    /// The key was removed. Distinct from the key being absent in the patch,
    /// which means "unchanged".
    Deleted,
}

/// A mapping shaped like the changed part of the newer snapshot.
///
/// Keys that did not change are absent.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Patch {
    entries: BTreeMap<String, PatchEntry>,
}

impl Patch {
    /// Create an empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a change for `key`, replacing any previous entry.
    pub fn insert(&mut self, key: impl Into<String>, entry: PatchEntry) {
        self.entries.insert(key.into(), entry);
    }

    /// The entry recorded for `key`, if any.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&PatchEntry> {
        self.entries.get(key)
    }

    /// Number of changed keys at this level.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing changed at this level.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over the changed keys in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PatchEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Changed keys at this level, deletions included.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    fn from_wire(map: Map) -> Self {
        let entries = map
            .into_iter()
            .map(|(key, value)| {
                let entry = match value {
                    Value::Object(inner) => {
                        PatchEntry::Nested(Patch::from_wire(Arc::unwrap_or_clone(inner)))
                    }
                    other => PatchEntry::Set(other),
                };
                (key, entry)
            })
            .collect();
        Self { entries }
    }
}

/// The difference between two snapshots of a document.
///
/// Serializes as `{ "patch": { .. }, "deletedKeys": [ .. ] }`. Deletion
/// markers inside `patch` are not written; `deletedKeys` is the record of
/// removals on the wire.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatePatch {
    /// Changed and added keys, recursively restricted to changed descendants.
    pub patch: Patch,
    /// Dot-delimited paths of keys that exist in the old snapshot only,
    /// in traversal order.
    pub deleted_keys: Vec<String>,
}

impl StatePatch {
    /// Returns `true` if applying this patch would change nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patch.is_empty() && self.deleted_keys.is_empty()
    }
}

/// Which input of [`diff`] was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// The older snapshot.
    Old,
    /// The newer snapshot.
    Current,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Old => f.write_str("old"),
            Self::Current => f.write_str("current"),
        }
    }
}

/// Error computing a diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DiffError {
    /// One of the snapshots is not an object.
    #[error("can only diff objects, but the {side} snapshot is {kind}")]
    UnsupportedInput {
        /// The offending input.
        side: Side,
        /// What it was instead.
        kind: ValueKind,
    },
}

/// Error applying a patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ApplyError {
    /// The base snapshot is not an object.
    #[error("can only apply a patch to an object, not to {kind}")]
    UnsupportedBase {
        /// What the base was instead.
        kind: ValueKind,
    },
}

/// Compute the patch that turns `old` into `cur`.
///
/// Both inputs must be objects. Arrays and scalars are compared by value and
/// replaced whole when they differ.
///
/// # Example
///
/// ```
/// use worldstate_tree::{diff, json, PatchEntry};
///
/// let patch = diff(&json!({ "a": 1, "b": 2 }), &json!({ "a": 1 })).unwrap();
/// assert_eq!(patch.deleted_keys, vec!["b".to_string()]);
/// assert_eq!(patch.patch.get("b"), Some(&PatchEntry::Deleted));
/// assert!(patch.patch.get("a").is_none());
/// ```
pub fn diff(old: &Value, cur: &Value) -> Result<StatePatch, DiffError> {
    diff_with_prefix(old, cur, "")
}

/// Like [`diff`], but every deleted path is reported with `prefix` prepended.
pub fn diff_with_prefix(old: &Value, cur: &Value, prefix: &str) -> Result<StatePatch, DiffError> {
    let old_map = old.as_object().ok_or(DiffError::UnsupportedInput {
        side: Side::Old,
        kind: old.kind(),
    })?;
    let cur_map = cur.as_object().ok_or(DiffError::UnsupportedInput {
        side: Side::Current,
        kind: cur.kind(),
    })?;

    let mut deleted_keys = Vec::new();
    let patch = diff_maps(old_map, cur_map, prefix, &mut deleted_keys);
    Ok(StatePatch {
        patch,
        deleted_keys,
    })
}

fn diff_maps(old: &Map, cur: &Map, prefix: &str, deleted_keys: &mut Vec<String>) -> Patch {
    let mut patch = Patch::new();

    for (key, old_value) in old {
        let Some(cur_value) = cur.get(key) else {
            deleted_keys.push(format!("{prefix}{key}"));
            patch.insert(key.clone(), PatchEntry::Deleted);
            continue;
        };

        if old_value.ptr_eq(cur_value) || old_value == cur_value {
            continue;
        }

        match (old_value, cur_value) {
            (Value::Object(old_inner), Value::Object(cur_inner)) => {
                let nested_prefix = format!("{prefix}{key}.");
                let nested = diff_maps(old_inner, cur_inner, &nested_prefix, deleted_keys);
                if !nested.is_empty() {
                    patch.insert(key.clone(), PatchEntry::Nested(nested));
                }
            }
            _ => patch.insert(key.clone(), PatchEntry::Set(cur_value.clone())),
        }
    }

    for (key, cur_value) in cur {
        if !old.contains_key(key) {
            patch.insert(key.clone(), PatchEntry::Set(cur_value.clone()));
        }
    }

    patch
}

/// Apply a [`StatePatch`] to `base`, returning the newer snapshot.
///
/// `base` is left untouched; subtrees the patch does not reach are shared
/// between `base` and the result.
pub fn apply(base: &Value, patch: &StatePatch) -> Result<Value, ApplyError> {
    apply_parts(base, &patch.patch, &patch.deleted_keys)
}

/// Apply a patch given as its two parts.
///
/// Deletions carried as [`PatchEntry::Deleted`] markers are applied during the
/// merge and their paths are not looked up again. The remaining entries of
/// `deleted_keys` are resolved by splitting on `.`, which is the only record
/// of removals in a patch decoded from the wire. Such a patch cannot address
/// keys that contain a dot. Paths that do not resolve in the merged result
/// are skipped, so replaying a deletion is harmless.
pub fn apply_parts(
    base: &Value,
    patch: &Patch,
    deleted_keys: &[String],
) -> Result<Value, ApplyError> {
    let Value::Object(base_map) = base else {
        return Err(ApplyError::UnsupportedBase { kind: base.kind() });
    };

    let mut marked = HashSet::new();
    let mut result = if patch.is_empty() {
        Value::Object(Arc::clone(base_map))
    } else {
        Value::object(merge(base_map, patch, "", &mut marked))
    };

    for path in deleted_keys {
        if marked.contains(path.as_str()) {
            continue;
        }
        remove_path(&mut result, path);
    }

    Ok(result)
}

/// Merge `patch` into a copy of `base`, recording the dot path of every
/// deletion marker it applies.
fn merge(base: &Map, patch: &Patch, prefix: &str, marked: &mut HashSet<String>) -> Map {
    let mut merged = base.clone();
    for (key, entry) in patch.iter() {
        match entry {
            PatchEntry::Set(value) => {
                merged.insert(key.to_string(), value.clone());
            }
            PatchEntry::Deleted => {
                merged.remove(key);
                marked.insert(format!("{prefix}{key}"));
            }
            PatchEntry::Nested(nested) => {
                let nested_prefix = format!("{prefix}{key}.");
                let child = match base.get(key) {
                    Some(Value::Object(inner)) => merge(inner, nested, &nested_prefix, marked),
                    _ => merge(&Map::new(), nested, &nested_prefix, marked),
                };
                merged.insert(key.to_string(), Value::object(child));
            }
        }
    }
    merged
}

fn remove_path(root: &mut Value, path: &str) {
    let segments: Vec<&str> = path.split('.').collect();
    let Some((leaf, parents)) = segments.split_last() else {
        return;
    };

    // Check first so that an unresolvable path never copies shared nodes.
    if !resolves(root, parents, leaf) {
        trace!(path, "deleted key does not resolve, skipping");
        return;
    }

    let mut node = root;
    for segment in parents {
        node = match node.as_object_mut().and_then(|map| map.get_mut(*segment)) {
            Some(child) => child,
            None => return,
        };
    }
    if let Some(map) = node.as_object_mut() {
        map.remove(*leaf);
    }
}

fn resolves(root: &Value, parents: &[&str], leaf: &str) -> bool {
    let mut node = root;
    for segment in parents {
        match node.get(segment) {
            Some(child) => node = child,
            None => return false,
        }
    }
    node.as_object().is_some_and(|map| map.contains_key(leaf))
}

// ── Serde ──────────────────────────────────────────────────────────

impl Serialize for Patch {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for (key, entry) in &self.entries {
            match entry {
                PatchEntry::Set(value) => map.serialize_entry(key, value)?,
                PatchEntry::Nested(patch) => map.serialize_entry(key, patch)?,
                PatchEntry::Deleted => {}
            }
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Patch {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Map::deserialize(deserializer).map(Patch::from_wire)
    }
}
