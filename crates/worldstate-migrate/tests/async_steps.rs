//! Integration tests for asynchronous steps: sequential execution across
//! suspension points and bounded fan-out through a shared limiter.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use worldstate_migrate::{
    shape, IoLimiter, MigrationError, MigrationRegistry, MigrationRunner, MigrationStep, StepError,
};
use worldstate_tree::{json, Document, Value};

/// Context shared by the test steps.
struct Ctx {
    limiter: IoLimiter,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl Ctx {
    fn new(permits: usize) -> Self {
        Self {
            limiter: IoLimiter::new(permits),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }
}

/// Adds `size = name.len()` to every asset, one "probe" per asset.
struct ProbeAssets;

#[async_trait]
impl MigrationStep<Ctx> for ProbeAssets {
    fn version(&self) -> u32 {
        0
    }

    fn name(&self) -> &'static str {
        "probe_assets"
    }

    async fn migrate(&self, mut document: Document, ctx: &Ctx) -> Result<Document, StepError> {
        let root = shape::object_mut(&mut document, "")?;
        let assets = shape::object_field_mut(root, "assets", "")?;

        let names: Vec<String> = assets.keys().cloned().collect();
        let probes = names.iter().map(|name| async move {
            let now = ctx.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            ctx.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(2)).await;
            ctx.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok::<_, StepError>((name.clone(), name.len() as u64))
        });
        let sizes = ctx.limiter.try_join_all(probes).await?;

        for (name, size) in sizes {
            let asset = shape::object_field_mut(assets, &name, "assets")?;
            asset.insert("size".into(), Value::from(size));
        }
        Ok(document)
    }
}

/// Requires the `size` field written by version 0.
struct TotalSize;

#[async_trait]
impl MigrationStep<Ctx> for TotalSize {
    fn version(&self) -> u32 {
        1
    }

    fn name(&self) -> &'static str {
        "total_size"
    }

    async fn migrate(&self, mut document: Document, _ctx: &Ctx) -> Result<Document, StepError> {
        let root = shape::object_mut(&mut document, "")?;
        let assets = shape::object(shape::field(root, "assets", "")?, "assets")?;
        let mut total = 0;
        for (id, asset) in assets {
            let path = shape::join("assets", id);
            let size = shape::field(shape::object(asset, &path)?, "size", &path)?;
            total += size
                .as_u64()
                .ok_or_else(|| StepError::InvalidData(format!("{path}.size")))?;
        }
        root.insert("totalSize".into(), Value::from(total));
        Ok(document)
    }
}

fn registry() -> MigrationRegistry<Ctx> {
    let steps: Vec<Box<dyn MigrationStep<Ctx>>> = vec![Box::new(TotalSize), Box::new(ProbeAssets)];
    MigrationRegistry::build(steps, 1).unwrap()
}

fn world(assets: usize) -> Document {
    let mut map = worldstate_tree::Map::new();
    for i in 0..assets {
        map.insert(format!("asset-{i:02}"), json!({ "external": false }));
    }
    json!({ "assets": Value::from(map) })
}

#[tokio::test]
async fn later_step_sees_earlier_steps_output() {
    let ctx = Ctx::new(3);
    let registry = registry();
    let doc = MigrationRunner::new(&registry)
        .run(world(4), 0, &ctx)
        .await
        .unwrap();

    assert_eq!(doc.get("totalSize").and_then(Value::as_u64), Some(4 * 8));
    assert_eq!(doc.get_path("assets.asset-00.size").and_then(Value::as_u64), Some(8));
}

#[tokio::test]
async fn fan_out_respects_shared_limit() {
    let ctx = Ctx::new(2);
    let registry = registry();
    MigrationRunner::new(&registry)
        .run(world(12), 0, &ctx)
        .await
        .unwrap();

    assert!(ctx.peak.load(Ordering::SeqCst) <= 2);
    assert_eq!(ctx.limiter.available_permits(), 2);
}

#[tokio::test]
async fn shape_error_aborts_run() {
    let ctx = Ctx::new(1);
    let registry = registry();
    let err = MigrationRunner::new(&registry)
        .run(json!({ "assets": [] }), 0, &ctx)
        .await
        .unwrap_err();

    match err {
        MigrationError::StepFailed {
            version: 0,
            source: StepError::Shape { path, .. },
            ..
        } => assert_eq!(path, "assets"),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn runner_future_is_send() {
    let ctx = Arc::new(Ctx::new(2));
    let handle = tokio::spawn({
        let ctx = Arc::clone(&ctx);
        async move {
            let registry = registry();
            MigrationRunner::new(&registry).run(world(2), 0, &*ctx).await
        }
    });
    let doc = handle.await.unwrap().unwrap();
    assert_eq!(doc.get("totalSize").and_then(Value::as_u64), Some(16));
}
