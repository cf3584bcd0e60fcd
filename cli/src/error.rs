//! Error types for the `cmdtree` tool.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading a schema or working with the application it
/// describes.
#[derive(Debug, Error)]
pub enum CliError {
    /// Schema file could not be read.
    #[error("failed to read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Extension is neither `.json`, `.yaml` nor `.yml`.
    #[error("unsupported schema format for '{}' (expected .json, .yaml or .yml)", path.display())]
    UnsupportedFormat { path: PathBuf },

    /// JSON parsing or serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The described application rejected its own declaration or the tokens.
    #[error("{app}: {source}")]
    Target {
        app: String,
        #[source]
        source: cmdtree_core::Error,
    },

    /// `check` found problems; they were already listed.
    #[error("schema has {0} problem(s)")]
    CheckFailed(usize),

    #[error("unknown output format '{0}'")]
    UnknownFormat(String),
}

/// Convenience alias for results with [`CliError`].
pub type Result<T> = std::result::Result<T, CliError>;
