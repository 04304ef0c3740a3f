//! Error types for tree and configuration handling.

use std::path::PathBuf;

use thiserror::Error;

use crate::node::NodeId;

/// Errors raised while loading or navigating a media tree.
#[derive(Debug, Error)]
pub enum TreeError {
    /// A node id does not exist in the tree.
    #[error("Unknown node id {}", id.index())]
    UnknownNode { id: NodeId },

    /// Path not found.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Permission denied for a path.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not a valid serialized tree.
    #[error("Invalid tree file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// Parent/child links disagree.
    #[error("Inconsistent tree: {message}")]
    Inconsistent { message: String },
}

impl TreeError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for this schema.
    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Invalid configuration value.
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}
