use tracing::{debug, info};
use worldstate_tree::{Document, ValueKind};

use crate::registry::MigrationRegistry;
use crate::step::StepError;

/// Error during a migration run.
///
/// Any of these aborts the run; the partially migrated document is dropped.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    /// A step failed.
    #[error("an error occurred while migrating the state to version {version} ({name}): {source}")]
    StepFailed {
        version: u32,
        name: &'static str,
        #[source]
        source: StepError,
    },
    /// A step returned something other than an object.
    #[error("migration {version} ({name}) returned {kind} instead of an object")]
    InvalidOutput {
        version: u32,
        name: &'static str,
        kind: ValueKind,
    },
    /// The document handed to the runner is not an object.
    #[error("the document to migrate is {kind}, not an object")]
    NotAMapping { kind: ValueKind },
    /// The document is newer than every registered step (written by a newer release).
    #[error("the document is at version {stored}, past the last migration (version {latest})")]
    FutureVersion { stored: u32, latest: u32 },
}

/// Applies the steps of a [`MigrationRegistry`] to a document.
///
/// Steps run strictly in version order, each one receiving the output of the
/// previous one. The runner performs no I/O of its own.
///
/// # Example
///
/// ```
/// use worldstate_migrate::{FnStep, MigrationRegistry, MigrationRunner, MigrationStep, StepError};
/// use worldstate_tree::{json, Document, Value};
///
/// fn set_flag(mut doc: Document, _: &()) -> Result<Document, StepError> {
///     if let Some(root) = doc.as_object_mut() {
///         root.insert("flag".into(), Value::from(true));
///     }
///     Ok(doc)
/// }
///
/// let steps: Vec<Box<dyn MigrationStep<()>>> = vec![Box::new(FnStep::new(0, "flag", set_flag))];
/// let registry = MigrationRegistry::build(steps, 0).unwrap();
/// let runner = MigrationRunner::new(&registry);
///
/// let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
///
/// // Fresh document: run from version 0.
/// let doc = rt.block_on(runner.run(json!({}), 0, &())).unwrap();
/// assert_eq!(doc, json!({ "flag": true }));
///
/// // Already migrated: nothing to do.
/// let again = rt.block_on(runner.run(doc.clone(), 1, &())).unwrap();
/// assert_eq!(again, doc);
/// ```
pub struct MigrationRunner<'r, C: Sync> {
    registry: &'r MigrationRegistry<C>,
}

impl<'r, C: Sync> MigrationRunner<'r, C> {
    /// Create a runner over a validated registry.
    pub fn new(registry: &'r MigrationRegistry<C>) -> Self {
        Self { registry }
    }

    /// The registry this runner applies.
    pub fn registry(&self) -> &'r MigrationRegistry<C> {
        self.registry
    }

    /// Check if a document whose next pending version is `from_version`
    /// needs any step.
    pub fn needs_migration(&self, from_version: u32) -> bool {
        self.registry.pending_count(from_version) > 0
    }

    /// Apply every step with `version >= from_version`, in order.
    ///
    /// `from_version == registry.len()` returns the document unchanged.
    pub async fn run(
        &self,
        document: Document,
        from_version: u32,
        ctx: &C,
    ) -> Result<Document, MigrationError> {
        if !document.is_object() {
            return Err(MigrationError::NotAMapping {
                kind: document.kind(),
            });
        }

        let latest = self.registry.last_version();
        let total = self.registry.len();
        if usize::try_from(from_version).map_or(true, |from| from > total) {
            return Err(MigrationError::FutureVersion {
                stored: from_version - 1,
                latest,
            });
        }

        let pending = self.registry.pending_count(from_version);
        if pending == 0 {
            debug!(from_version, "document is up to date");
            return Ok(document);
        }

        info!(from_version, to_version = latest, pending, "migrating document");

        let mut current = document;
        for step in self.registry.steps_from(from_version) {
            let version = step.version();
            let name = step.name();
            info!(version, name, "running migration");

            current = step
                .migrate(current, ctx)
                .await
                .map_err(|source| MigrationError::StepFailed {
                    version,
                    name,
                    source,
                })?;

            if !current.is_object() {
                return Err(MigrationError::InvalidOutput {
                    version,
                    name,
                    kind: current.kind(),
                });
            }
        }

        info!(version = latest, "migrations finished successfully");
        Ok(current)
    }
}

/// Run `registry` over `document` starting at `from_version`.
///
/// Shorthand for [`MigrationRunner::run`].
pub async fn run<C: Sync>(
    document: Document,
    from_version: u32,
    registry: &MigrationRegistry<C>,
    ctx: &C,
) -> Result<Document, MigrationError> {
    MigrationRunner::new(registry).run(document, from_version, ctx).await
}
