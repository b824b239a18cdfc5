//! Error types for fragment storage, configuration and manifests.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading fragments or reading/writing
/// configuration and manifest files.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// File I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON parsing or serialization failure.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// A fragment file could not be parsed as a node descriptor.
    #[error("invalid fragment '{path}': {message}")]
    InvalidFragment { path: String, message: String },

    /// A file has an extension no fragment parser understands.
    #[error("unsupported fragment format: {0}")]
    UnsupportedFormat(PathBuf),

    /// Manifest validation failure (e.g., missing required fields).
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    /// The configuration file is structurally valid YAML but unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// All configured loader sources failed.
    #[error("no fragment sources available")]
    NoSourcesAvailable,
}

/// Convenience alias for results with [`DatabaseError`].
pub type Result<T> = std::result::Result<T, DatabaseError>;
