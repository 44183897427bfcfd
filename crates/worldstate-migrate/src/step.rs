use std::path::PathBuf;

use async_trait::async_trait;
use worldstate_tree::{Document, ValueKind};

/// A single versioned transformation of the whole document.
///
/// `C` is the execution context handed to every step (for example the root
/// directory of uploaded files). The runner never looks inside it.
///
/// A step may perform I/O and may suspend, but it must not keep state of its
/// own between runs.
#[async_trait]
pub trait MigrationStep<C: Sync>: Send + Sync {
    /// Position of this step in the chain. Unique, starting at 0.
    fn version(&self) -> u32;

    /// Short human readable name, used in logs and errors.
    fn name(&self) -> &'static str;

    /// Transform the document into the shape expected by `version`.
    async fn migrate(&self, document: Document, ctx: &C) -> Result<Document, StepError>;
}

/// Error raised by a migration step.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    /// The document does not have the shape the step expects.
    #[error("expected {expected} at `{path}`, found {found}")]
    Shape {
        path: String,
        expected: ValueKind,
        found: ValueKind,
    },
    /// A key the step relies on is missing.
    #[error("missing key `{path}`")]
    MissingKey { path: String },
    /// Reading or writing an asset failed.
    #[error("i/o error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// An external tool exited unsuccessfully or could not be started.
    #[error("{tool} failed: {message}")]
    External { tool: String, message: String },
    /// Data produced or read by the step is not usable.
    #[error("invalid data: {0}")]
    InvalidData(String),
    /// A worker task spawned by the step panicked or was cancelled.
    #[error("worker task failed: {0}")]
    Task(String),
}

/// A synchronous step backed by a function.
///
/// Most steps only reshape the tree; they do not need to be `async`.
pub struct FnStep<F> {
    version: u32,
    name: &'static str,
    func: F,
}

impl<F> FnStep<F> {
    /// Wrap `func` as the step with the given version.
    pub fn new(version: u32, name: &'static str, func: F) -> Self {
        Self {
            version,
            name,
            func,
        }
    }
}

#[async_trait]
impl<C, F> MigrationStep<C> for FnStep<F>
where
    C: Sync,
    F: Fn(Document, &C) -> Result<Document, StepError> + Send + Sync,
{
    fn version(&self) -> u32 {
        self.version
    }

    fn name(&self) -> &'static str {
        self.name
    }

    async fn migrate(&self, document: Document, ctx: &C) -> Result<Document, StepError> {
        (self.func)(document, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use worldstate_tree::json;

    #[tokio::test]
    async fn fn_step_calls_function_with_context() {
        let step = FnStep::new(
            3,
            "stamp",
            |mut doc: Document, ctx: &u64| -> Result<Document, StepError> {
                if let Some(root) = doc.as_object_mut() {
                    root.insert("stamp".into(), (*ctx).into());
                }
                Ok(doc)
            },
        );

        assert_eq!(MigrationStep::<u64>::version(&step), 3);
        assert_eq!(MigrationStep::<u64>::name(&step), "stamp");
        let out = MigrationStep::<u64>::migrate(&step, json!({}), &7)
            .await
            .unwrap();
        assert_eq!(out, json!({ "stamp": 7 }));
    }

    #[test]
    fn shape_error_message_names_path() {
        let err = StepError::Shape {
            path: "maps.entities".into(),
            expected: ValueKind::Object,
            found: ValueKind::Array,
        };
        assert_eq!(err.to_string(), "expected object at `maps.entities`, found array");
    }
}
