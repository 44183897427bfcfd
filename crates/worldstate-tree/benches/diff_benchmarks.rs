use criterion::{black_box, criterion_group, criterion_main, Criterion};
use worldstate_tree::{apply, diff, json, Map, Value};

/// A world with `characters` entities, each carrying a few nested fields.
fn world(characters: usize) -> Value {
    let mut entities = Map::new();
    for i in 0..characters {
        entities.insert(
            format!("c{i}"),
            json!({
                "id": format!("c{i}"),
                "name": format!("Character {i}"),
                "hp": 10,
                "conditions": ["prone"],
                "stats": { "str": 3, "dex": 2, "con": 1 },
            }),
        );
    }
    json!({
        "characters": { "entities": Value::from(entities), "ids": [] },
        "maps": { "entities": {} },
    })
}

fn touch_one(doc: &Value, index: usize) -> Value {
    let mut next = doc.clone();
    if let Some(character) = next
        .as_object_mut()
        .and_then(|root| root.get_mut("characters"))
        .and_then(Value::as_object_mut)
        .and_then(|characters| characters.get_mut("entities"))
        .and_then(Value::as_object_mut)
        .and_then(|entities| entities.get_mut(&format!("c{index}")))
        .and_then(Value::as_object_mut)
    {
        character.insert("hp".into(), Value::from(1u64));
    }
    next
}

fn bench_diff_single_change(c: &mut Criterion) {
    let old = world(1000);
    let cur = touch_one(&old, 500);

    c.bench_function("diff 1000 characters, one change (shared)", |b| {
        b.iter(|| black_box(diff(&old, &cur).unwrap()))
    });

    // Same content, but no structure shared between the snapshots.
    let cur_unshared: Value = serde_json::from_str(&cur.to_string()).unwrap();
    c.bench_function("diff 1000 characters, one change (unshared)", |b| {
        b.iter(|| black_box(diff(&old, &cur_unshared).unwrap()))
    });
}

fn bench_apply(c: &mut Criterion) {
    let old = world(1000);
    let cur = touch_one(&old, 10);
    let patch = diff(&old, &cur).unwrap();

    c.bench_function("apply one-change patch to 1000 characters", |b| {
        b.iter(|| black_box(apply(&old, &patch).unwrap()))
    });
}

criterion_group!(benches, bench_diff_single_change, bench_apply);
criterion_main!(benches);
