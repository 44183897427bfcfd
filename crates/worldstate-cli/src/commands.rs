use std::fs;
use std::path::Path;
use std::sync::Arc;

use console::style;
use tracing::info;
use worldstate_migrate::{IoLimiter, MigrationStep};
use worldstate_store::{
    document_version, load_and_migrate, FileStore, LoadOptions, LoadOutcome, MigrationPlan,
    StateStore,
};
use worldstate_tree::{Document, StatePatch};

use crate::config::Config;
use crate::world::{self, FfprobeProbe, WorldContext, ASSET_DURATION_VERSION};

type Result = std::result::Result<(), Box<dyn std::error::Error>>;

/// `worldstate status`: Show the stored version and pending migrations.
pub fn status(config: &Config) -> Result {
    let registry = world::registry()?;
    let store = FileStore::new(&config.state_path);

    println!("Document: {}", store.path().display());
    let Some(document) = store.load()? else {
        println!("  (no document yet)");
        return Ok(());
    };

    let plan = MigrationPlan::new(document_version(&document)?, &registry);
    println!("Stored version: {}", plan.backup_tag());
    println!("Last migration: {}", plan.last_version());
    println!();

    if plan.is_future() {
        println!(
            "  {}",
            style("The document was migrated by a newer release.").red()
        );
        return Ok(());
    }
    if plan.is_up_to_date() {
        println!("  {}", style("Up to date.").green());
        return Ok(());
    }

    println!("  {} pending migration(s):", style(plan.pending()).yellow());
    for step in registry.steps_from(plan.from_version()) {
        println!("  {:>4}  {}", step.version(), step.name());
    }
    println!();
    Ok(())
}

/// `worldstate migrate`: Bring the stored document up to the last version.
pub async fn migrate(config: &Config, yes: bool, no_backup: bool) -> Result {
    let registry = world::registry()?;
    let mut store = FileStore::new(&config.state_path);
    let Some(document) = store.load()? else {
        println!("No document at {}; nothing to migrate.", store.path().display());
        return Ok(());
    };

    let backup = config.backup && !no_backup;
    let plan = MigrationPlan::new(document_version(&document)?, &registry);
    if plan.pending() > 0 && !plan.is_future() {
        println!();
        println!("#");
        println!("# State Migrations");
        println!("#");
        println!(
            "# Your state needs to be migrated from version {} to version {}.",
            plan.backup_tag(),
            plan.last_version()
        );
        if backup {
            println!(
                "# A backup will be created at {}",
                store.backup_path(&plan.backup_tag()).display()
            );
        }
        println!("#");
        println!();

        if !yes && !inquire::Confirm::new("Continue?").with_default(false).prompt()? {
            println!("Skipped migrations.");
            return Ok(());
        }
    }

    let probe = FfprobeProbe::new();
    if plan.pending() > 0 && plan.from_version() <= ASSET_DURATION_VERSION {
        let version = probe.check_installed().await?;
        info!(%version, "found ffprobe");
    }

    let limiter = config
        .io_concurrency
        .map_or_else(IoLimiter::from_available_parallelism, IoLimiter::new);
    let ctx = WorldContext::new(&config.files_root, limiter, Arc::new(probe));

    let outcome = load_and_migrate(&mut store, &registry, &ctx, LoadOptions { backup }).await?;
    let LoadOutcome::Loaded {
        mut document,
        plan,
        backup,
    } = outcome
    else {
        println!("No document at {}; nothing to migrate.", store.path().display());
        return Ok(());
    };

    let before = document.clone();
    world::reset_ephemeral(&mut document)?;
    let cleared = worldstate_tree::diff(&before, &document)?;
    if !cleared.is_empty() {
        store.save(&document)?;
        let changed: Vec<&str> = cleared.patch.keys().collect();
        info!(?changed, "ephemeral state reset");
    }

    if plan.pending() == 0 {
        println!("Document is up to date (version {}).", plan.last_version());
    } else {
        println!(
            "{} Migrated from version {} to version {} ({} step(s)).",
            style("✔").green(),
            plan.backup_tag(),
            plan.last_version(),
            plan.pending()
        );
    }
    if let Some(backup) = backup {
        println!("Backup: {backup}");
    }
    Ok(())
}

/// `worldstate migrations`: List every registered migration.
pub fn migrations() -> Result {
    let registry = world::registry()?;
    println!("  {:>7}  {}", "Version", "Name");
    println!("  {}", "-".repeat(36));
    for step in registry.steps() {
        println!("  {:>7}  {}", step.version(), step.name());
    }
    println!("  {}", "-".repeat(36));
    println!("  {} migration(s), last version {}", registry.len(), registry.last_version());
    Ok(())
}

/// `worldstate diff <old> <new>`: Print the patch turning `old` into `new`.
pub fn diff(old: &Path, new: &Path) -> Result {
    let old = read_document(old)?;
    let new = read_document(new)?;
    let patch = worldstate_tree::diff(&old, &new)?;
    println!("{}", serde_json::to_string_pretty(&patch)?);
    Ok(())
}

/// `worldstate apply <base> <patch>`: Print `base` with `patch` applied.
pub fn apply(base: &Path, patch_path: &Path) -> Result {
    let base = read_document(base)?;
    let raw = fs::read_to_string(patch_path)
        .map_err(|e| format!("failed to read {}: {e}", patch_path.display()))?;
    let patch: StatePatch = serde_json::from_str(&raw)
        .map_err(|e| format!("invalid patch in {}: {e}", patch_path.display()))?;

    let patched = worldstate_tree::apply(&base, &patch)?;
    println!("{}", serde_json::to_string_pretty(&patched)?);
    Ok(())
}

fn read_document(path: &Path) -> std::result::Result<Document, Box<dyn std::error::Error>> {
    FileStore::new(path)
        .load()?
        .ok_or_else(|| format!("{} does not exist", path.display()).into())
}
