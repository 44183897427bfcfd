//! Narrowing helpers for migration steps.
//!
//! Steps work on an untyped tree. Instead of silently coercing, they narrow
//! to the shape they expect and fail with the dot path where the document
//! diverged.

use worldstate_tree::{Map, Value, ValueKind};

use crate::step::StepError;

/// Append `key` to a dot path.
pub fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

fn mismatch(path: &str, expected: ValueKind, found: &Value) -> StepError {
    StepError::Shape {
        path: path.to_string(),
        expected,
        found: found.kind(),
    }
}

/// Narrow `value` (located at `path`) to an object.
pub fn object<'a>(value: &'a Value, path: &str) -> Result<&'a Map, StepError> {
    value
        .as_object()
        .ok_or_else(|| mismatch(path, ValueKind::Object, value))
}

/// Narrow `value` (located at `path`) to a mutable object.
pub fn object_mut<'a>(value: &'a mut Value, path: &str) -> Result<&'a mut Map, StepError> {
    let kind = value.kind();
    value.as_object_mut().ok_or_else(|| StepError::Shape {
        path: path.to_string(),
        expected: ValueKind::Object,
        found: kind,
    })
}

/// Narrow `value` (located at `path`) to a mutable array.
pub fn array_mut<'a>(value: &'a mut Value, path: &str) -> Result<&'a mut Vec<Value>, StepError> {
    let kind = value.kind();
    value.as_array_mut().ok_or_else(|| StepError::Shape {
        path: path.to_string(),
        expected: ValueKind::Array,
        found: kind,
    })
}

/// The value under `key` of an object located at `path`.
pub fn field<'a>(map: &'a Map, key: &str, path: &str) -> Result<&'a Value, StepError> {
    map.get(key).ok_or_else(|| StepError::MissingKey {
        path: join(path, key),
    })
}

/// The mutable value under `key` of an object located at `path`.
pub fn field_mut<'a>(map: &'a mut Map, key: &str, path: &str) -> Result<&'a mut Value, StepError> {
    map.get_mut(key).ok_or_else(|| StepError::MissingKey {
        path: join(path, key),
    })
}

/// The object under `key` of an object located at `path`.
pub fn object_field_mut<'a>(
    map: &'a mut Map,
    key: &str,
    path: &str,
) -> Result<&'a mut Map, StepError> {
    let child_path = join(path, key);
    let child = map
        .get_mut(key)
        .ok_or_else(|| StepError::MissingKey {
            path: child_path.clone(),
        })?;
    object_mut(child, &child_path)
}

/// The string under `key` of an object located at `path`.
pub fn str_field<'a>(map: &'a Map, key: &str, path: &str) -> Result<&'a str, StepError> {
    let value = field(map, key, path)?;
    value
        .as_str()
        .ok_or_else(|| mismatch(&join(path, key), ValueKind::String, value))
}
