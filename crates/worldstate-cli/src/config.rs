use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// File looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "worldstate.toml";

/// Settings for the `worldstate` tool, parsed from `worldstate.toml`.
///
/// Every field is optional in the file; missing fields keep their default.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// The persisted document.
    pub state_path: PathBuf,
    /// Directory holding uploaded files referenced by local assets.
    pub files_root: PathBuf,
    /// Heavy I/O operations allowed at once. Half the CPUs when unset.
    pub io_concurrency: Option<usize>,
    /// Copy the document to `<state_path>.backup.<version>` before migrating.
    pub backup: bool,
    /// `tracing` filter directive, overridden by `RUST_LOG`.
    pub log: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            state_path: PathBuf::from("state.json"),
            files_root: PathBuf::from("uploaded-files"),
            io_concurrency: None,
            backup: true,
            log: "info".to_string(),
        }
    }
}

/// Error loading the configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl Config {
    /// Parse a configuration from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Load the configuration.
    ///
    /// An explicit `path` must exist. Without one, `worldstate.toml` in the
    /// working directory is used if present, and defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(path) => (path, true),
            None => (Path::new(DEFAULT_CONFIG_FILE), false),
        };
        if !required && !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply command line overrides on top of the file.
    pub fn with_overrides(mut self, state: Option<PathBuf>, files_root: Option<PathBuf>) -> Self {
        if let Some(state) = state {
            self.state_path = state;
        }
        if let Some(files_root) = files_root {
            self.files_root = files_root;
        }
        self
    }
}
