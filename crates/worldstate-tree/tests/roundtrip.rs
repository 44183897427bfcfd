//! Property tests for the diff/apply round trip.
//!
//! For any two documents, applying `diff(old, cur)` to `old` must rebuild
//! `cur` exactly. In memory this holds for any keys; after a trip through the
//! JSON wire format it holds for keys without dots, since `deletedKeys` is
//! then the only record of removals.

use proptest::prelude::*;
use worldstate_tree::{apply, diff, Map, StatePatch, Value};

fn leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        (-5i64..5).prop_map(Value::from),
        "[a-c]{0,2}".prop_map(Value::from),
    ]
}

/// Keys drawn from a small alphabet so that old and new documents collide.
/// With `dotted`, some keys also read as paths to other keys.
fn key(dotted: bool) -> BoxedStrategy<String> {
    if dotted {
        prop_oneof!["[a-c]{1,2}", "[a-c]\\.[a-c]"].boxed()
    } else {
        "[a-f]{1,2}".boxed()
    }
}

fn value(dotted: bool) -> impl Strategy<Value = Value> {
    leaf().prop_recursive(4, 48, 5, move |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::from),
            prop::collection::btree_map(key(dotted), inner, 0..5).prop_map(Value::from),
        ]
    })
}

fn document(dotted: bool) -> impl Strategy<Value = Value> {
    prop::collection::btree_map(key(dotted), value(dotted), 0..6)
        .prop_map(|map: Map| Value::from(map))
}

/// Edits applied to a copy of `old`, one or two levels deep, so that most
/// pairs share structure and exercise nested patches.
type Edit = (String, Option<String>, Option<Value>);

fn edit(doc: &mut Value, (first, second, value): Edit) {
    let Some(map) = doc.as_object_mut() else {
        return;
    };
    let nested = second.filter(|_| map.get(&first).is_some_and(Value::is_object));
    let (map, key) = match nested {
        Some(second) => {
            let inner = map
                .get_mut(&first)
                .and_then(Value::as_object_mut)
                .expect("checked to be an object");
            (inner, second)
        }
        None => (map, first),
    };
    match value {
        Some(value) => {
            map.insert(key, value);
        }
        None => {
            map.remove(&key);
        }
    }
}

fn pair(dotted: bool) -> impl Strategy<Value = (Value, Value)> {
    let edits = prop::collection::vec(
        (
            key(dotted),
            prop::option::of(key(dotted)),
            prop::option::of(value(dotted)),
        ),
        0..5,
    );
    (document(dotted), document(dotted), edits, prop::bool::weighted(0.2)).prop_map(
        |(old, other, edits, unrelated)| {
            if unrelated {
                return (old, other);
            }
            let mut cur = old.clone();
            for e in edits {
                edit(&mut cur, e);
            }
            (old, cur)
        },
    )
}

proptest! {
    #[test]
    fn apply_of_diff_rebuilds_current((old, cur) in pair(false)) {
        let patch = diff(&old, &cur).unwrap();
        prop_assert_eq!(apply(&old, &patch).unwrap(), cur);
    }

    #[test]
    fn dotted_keys_round_trip_in_memory((old, cur) in pair(true)) {
        let patch = diff(&old, &cur).unwrap();
        prop_assert_eq!(apply(&old, &patch).unwrap(), cur);
    }

    #[test]
    fn unrelated_documents_round_trip(old in document(true), cur in document(true)) {
        let patch = diff(&old, &cur).unwrap();
        prop_assert_eq!(apply(&old, &patch).unwrap(), cur);
    }

    #[test]
    fn wire_round_trip_rebuilds_current((old, cur) in pair(false)) {
        let patch = diff(&old, &cur).unwrap();
        let text = serde_json::to_string(&patch).unwrap();
        let decoded: StatePatch = serde_json::from_str(&text).unwrap();
        prop_assert_eq!(apply(&old, &decoded).unwrap(), cur);
    }

    #[test]
    fn diff_against_self_is_empty(doc in document(true)) {
        prop_assert!(diff(&doc, &doc).unwrap().is_empty());
        prop_assert!(diff(&doc, &doc.clone()).unwrap().is_empty());
    }

    #[test]
    fn apply_never_mutates_base((old, cur) in pair(true)) {
        let before = serde_json::to_string(&old).unwrap();
        let patch = diff(&old, &cur).unwrap();
        let _ = apply(&old, &patch).unwrap();
        prop_assert_eq!(serde_json::to_string(&old).unwrap(), before);
    }

    #[test]
    fn every_deleted_key_existed_in_old((old, cur) in pair(false)) {
        let patch = diff(&old, &cur).unwrap();
        for path in &patch.deleted_keys {
            prop_assert!(old.get_path(path).is_some(), "{} missing from old", path);
            prop_assert!(cur.get_path(path).is_none(), "{} still in cur", path);
        }
    }
}
