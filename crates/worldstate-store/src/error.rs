use std::path::PathBuf;

use worldstate_migrate::MigrationError;
use worldstate_tree::ValueKind;

/// Error raised while loading, migrating or saving the document.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading, writing or copying a file failed.
    #[error("i/o error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The stored file is not valid JSON, or the document could not be encoded.
    #[error("invalid JSON in {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// The `version` field is present but not a non-negative integer.
    #[error("the stored `version` field is not a valid migration version: {found}")]
    InvalidVersion { found: String },
    /// The stored document root is not an object.
    #[error("the stored document is {kind}, not an object")]
    NotAnObject { kind: ValueKind },
    /// Running the pending migrations failed. Nothing was written.
    #[error(transparent)]
    Migration(#[from] MigrationError),
}
