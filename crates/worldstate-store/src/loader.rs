use tracing::{debug, info};
use worldstate_migrate::{MigrationError, MigrationRegistry, MigrationRunner};
use worldstate_tree::{Document, Value};

use crate::error::StoreError;
use crate::traits::StateStore;

/// Root field holding the version of the last migration applied.
pub const VERSION_KEY: &str = "version";

/// Read the `version` field of a stored document.
///
/// `None` means the document was never migrated. `null` counts as absent.
pub fn document_version(document: &Document) -> Result<Option<u32>, StoreError> {
    let root = document.as_object().ok_or(StoreError::NotAnObject {
        kind: document.kind(),
    })?;
    match root.get(VERSION_KEY) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .map(Some)
            .ok_or_else(|| StoreError::InvalidVersion {
                found: value.to_string(),
            }),
    }
}

/// Write `version` into the root of `document`.
pub fn stamp_version(document: &mut Document, version: u32) -> Result<(), StoreError> {
    let kind = document.kind();
    let root = document
        .as_object_mut()
        .ok_or(StoreError::NotAnObject { kind })?;
    root.insert(VERSION_KEY.to_string(), Value::from(version));
    Ok(())
}

/// Pending work for a stored document against a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationPlan {
    stored_version: Option<u32>,
    last_version: u32,
    pending: usize,
}

impl MigrationPlan {
    /// Compare the version read from a document with `registry`.
    pub fn new<C: Sync>(stored_version: Option<u32>, registry: &MigrationRegistry<C>) -> Self {
        let from = stored_version.map_or(0, |v| v.saturating_add(1));
        Self {
            stored_version,
            last_version: registry.last_version(),
            pending: registry.pending_count(from),
        }
    }

    /// Version stored in the document, `None` if never migrated.
    pub fn stored_version(&self) -> Option<u32> {
        self.stored_version
    }

    /// Version of the last registered migration.
    pub fn last_version(&self) -> u32 {
        self.last_version
    }

    /// Number of steps that will run.
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// First version to run.
    pub fn from_version(&self) -> u32 {
        self.stored_version.map_or(0, |v| v.saturating_add(1))
    }

    /// No step to run and the document is not from a newer release.
    pub fn is_up_to_date(&self) -> bool {
        self.pending == 0 && !self.is_future()
    }

    /// The document was written by a release with more migrations.
    pub fn is_future(&self) -> bool {
        self.stored_version.is_some_and(|v| v > self.last_version)
    }

    /// Tag for the backup taken before migrating: the stored version, or `none`.
    pub fn backup_tag(&self) -> String {
        self.stored_version
            .map_or_else(|| "none".to_string(), |v| v.to_string())
    }

    fn future_error(&self) -> MigrationError {
        MigrationError::FutureVersion {
            stored: self.stored_version.unwrap_or_default(),
            latest: self.last_version,
        }
    }
}

/// Options for [`load_and_migrate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Copy the stored document before writing the migrated one.
    pub backup: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self { backup: true }
    }
}

/// Result of [`load_and_migrate`].
#[derive(Debug, Clone)]
pub enum LoadOutcome {
    /// Nothing stored yet.
    Missing,
    /// The stored document, migrated to the last version if needed.
    Loaded {
        document: Document,
        /// What was pending when the document was read.
        plan: MigrationPlan,
        /// Where the pre-migration copy went, if one was taken.
        backup: Option<String>,
    },
}

/// Load the stored document and bring it up to the registry's last version.
///
/// When steps are pending the stored document is backed up (unless
/// disabled), migrated in memory, stamped with the last version and saved
/// once. A failing step leaves the store untouched apart from the backup.
pub async fn load_and_migrate<S, C>(
    store: &mut S,
    registry: &MigrationRegistry<C>,
    ctx: &C,
    options: LoadOptions,
) -> Result<LoadOutcome, StoreError>
where
    S: StateStore,
    C: Sync,
{
    let Some(document) = store.load()? else {
        return Ok(LoadOutcome::Missing);
    };

    let plan = MigrationPlan::new(document_version(&document)?, registry);
    if plan.is_future() {
        return Err(plan.future_error().into());
    }
    if plan.is_up_to_date() {
        debug!(version = plan.last_version(), "stored document is up to date");
        return Ok(LoadOutcome::Loaded {
            document,
            plan,
            backup: None,
        });
    }

    let backup = if options.backup {
        store.backup(&plan.backup_tag())?
    } else {
        None
    };

    let mut migrated = MigrationRunner::new(registry)
        .run(document, plan.from_version(), ctx)
        .await?;
    stamp_version(&mut migrated, plan.last_version())?;
    store.save(&migrated)?;

    info!(
        from = %plan.backup_tag(),
        to = plan.last_version(),
        "stored document migrated"
    );
    Ok(LoadOutcome::Loaded {
        document: migrated,
        plan,
        backup,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use worldstate_migrate::{FnStep, MigrationStep, StepError};
    use worldstate_tree::json;

    fn push_step(version: u32) -> Box<dyn MigrationStep<()>> {
        Box::new(FnStep::new(
            version,
            "push",
            move |mut doc: Document, _: &()| -> Result<Document, StepError> {
                let root = doc
                    .as_object_mut()
                    .ok_or(StepError::InvalidData("root".into()))?;
                let log = root
                    .entry("log".to_string())
                    .or_insert_with(|| Value::array(Vec::new()));
                log.as_array_mut()
                    .ok_or(StepError::InvalidData("log".into()))?
                    .push(Value::from(version));
                Ok(doc)
            },
        ))
    }

    fn registry(len: u32) -> MigrationRegistry<()> {
        MigrationRegistry::build((0..len).map(push_step).collect(), len - 1).unwrap()
    }

    #[test]
    fn version_field_is_read() {
        assert_eq!(document_version(&json!({})).unwrap(), None);
        assert_eq!(document_version(&json!({ "version": null })).unwrap(), None);
        assert_eq!(document_version(&json!({ "version": 7 })).unwrap(), Some(7));
    }

    #[test]
    fn invalid_version_field_is_rejected() {
        for bad in [
            json!({ "version": -1 }),
            json!({ "version": 1.5 }),
            json!({ "version": "3" }),
        ] {
            assert!(matches!(
                document_version(&bad),
                Err(StoreError::InvalidVersion { .. })
            ));
        }
        assert!(matches!(
            document_version(&json!([1])),
            Err(StoreError::NotAnObject { .. })
        ));
    }

    #[test]
    fn plan_counts_pending_steps() {
        let registry = registry(3);
        let fresh = MigrationPlan::new(None, &registry);
        assert_eq!((fresh.from_version(), fresh.pending()), (0, 3));
        assert_eq!(fresh.backup_tag(), "none");

        let partial = MigrationPlan::new(Some(0), &registry);
        assert_eq!((partial.from_version(), partial.pending()), (1, 2));
        assert_eq!(partial.backup_tag(), "0");

        let done = MigrationPlan::new(Some(2), &registry);
        assert!(done.is_up_to_date());

        let future = MigrationPlan::new(Some(9), &registry);
        assert!(future.is_future());
        assert!(!future.is_up_to_date());
    }

    #[tokio::test]
    async fn missing_document() {
        let mut store = MemoryStore::new();
        let outcome = load_and_migrate(&mut store, &registry(1), &(), LoadOptions::default())
            .await
            .unwrap();
        assert!(matches!(outcome, LoadOutcome::Missing));
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test]
    async fn unversioned_document_runs_every_step_and_saves_once() {
        let mut store = MemoryStore::with_document(json!({ "maps": {} }));
        let outcome = load_and_migrate(&mut store, &registry(3), &(), LoadOptions::default())
            .await
            .unwrap();

        let LoadOutcome::Loaded {
            document,
            plan,
            backup,
        } = outcome
        else {
            panic!("expected a document");
        };
        assert_eq!(document, json!({ "maps": {}, "log": [0, 1, 2], "version": 2 }));
        assert_eq!(plan.pending(), 3);
        assert_eq!(backup.as_deref(), Some("memory:none"));
        assert_eq!(store.save_count(), 1);
        assert_eq!(store.document(), Some(&document));
        assert_eq!(store.backup_document("none"), Some(&json!({ "maps": {} })));
    }

    #[tokio::test]
    async fn versioned_document_resumes_after_stored_version() {
        let mut store = MemoryStore::with_document(json!({ "log": [0], "version": 0 }));
        load_and_migrate(&mut store, &registry(3), &(), LoadOptions::default())
            .await
            .unwrap();
        assert_eq!(
            store.document(),
            Some(&json!({ "log": [0, 1, 2], "version": 2 }))
        );
        assert!(store.backup_document("0").is_some());
    }

    #[tokio::test]
    async fn up_to_date_document_is_not_written() {
        let stored = json!({ "log": [0, 1], "version": 1 });
        let mut store = MemoryStore::with_document(stored.clone());
        let outcome = load_and_migrate(&mut store, &registry(2), &(), LoadOptions::default())
            .await
            .unwrap();

        match outcome {
            LoadOutcome::Loaded {
                document, backup, ..
            } => {
                assert_eq!(document, stored);
                assert!(backup.is_none());
            }
            LoadOutcome::Missing => panic!("expected a document"),
        }
        assert_eq!(store.save_count(), 0);
        assert_eq!(store.backup_tags().count(), 0);
    }

    #[tokio::test]
    async fn future_version_is_rejected_before_backup() {
        let mut store = MemoryStore::with_document(json!({ "version": 5 }));
        let err = load_and_migrate(&mut store, &registry(2), &(), LoadOptions::default())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "the document is at version 5, past the last migration (version 1)"
        );
        assert!(matches!(
            err,
            StoreError::Migration(MigrationError::FutureVersion {
                stored: 5,
                latest: 1
            })
        ));
        assert_eq!(store.backup_tags().count(), 0);
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test]
    async fn failed_run_saves_nothing() {
        let failing: Box<dyn MigrationStep<()>> = Box::new(FnStep::new(
            1,
            "broken",
            |_: Document, _: &()| -> Result<Document, StepError> {
                Err(StepError::InvalidData("boom".into()))
            },
        ));
        let registry = MigrationRegistry::build(vec![push_step(0), failing], 1).unwrap();
        let stored = json!({ "maps": {} });
        let mut store = MemoryStore::with_document(stored.clone());

        let err = load_and_migrate(&mut store, &registry, &(), LoadOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Migration(MigrationError::StepFailed { version: 1, .. })
        ));
        assert_eq!(store.document(), Some(&stored));
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test]
    async fn backup_can_be_disabled() {
        let mut store = MemoryStore::with_document(json!({}));
        let outcome = load_and_migrate(
            &mut store,
            &registry(1),
            &(),
            LoadOptions { backup: false },
        )
        .await
        .unwrap();
        assert!(matches!(outcome, LoadOutcome::Loaded { backup: None, .. }));
        assert_eq!(store.backup_tags().count(), 0);
        assert_eq!(store.save_count(), 1);
    }
}
