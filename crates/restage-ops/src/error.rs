//! Error types for operations, the journal and undo.

use std::io;
use std::path::PathBuf;

use restage_core::{NodeId, TreeError};
use thiserror::Error;

/// Errors produced by a single mutation primitive.
#[derive(Debug, Error)]
pub enum OpError {
    /// The queued node carries no metadata.
    #[error("Node {} has no metadata", id.index())]
    MissingMetadata { id: NodeId },

    /// The node has no location to move or link to.
    #[error("No destination for {path}")]
    MissingDestination { path: PathBuf },

    /// The proposed name is not a valid file name.
    #[error("Invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// Something already occupies the destination.
    #[error("Destination already exists: {path}")]
    Collision { path: PathBuf },

    /// A non-directory occupies a path that must be a directory.
    #[error("Not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// Path not found.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Permission denied for a path.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Neither a hard link nor a symlink could be created.
    #[error("Cannot link {path}: hard link failed ({hard}), symlink failed ({soft})")]
    LinkFailed {
        path: PathBuf,
        hard: io::Error,
        soft: io::Error,
    },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The queued node is not part of the tree.
    #[error(transparent)]
    Tree(#[from] TreeError),
}

impl OpError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            io::ErrorKind::NotFound => Self::NotFound { path },
            io::ErrorKind::AlreadyExists => Self::Collision { path },
            _ => Self::Io { path, source },
        }
    }
}

/// Errors produced while reading or writing session journals.
#[derive(Debug, Error)]
pub enum JournalError {
    /// An entry was recorded while no session was running.
    #[error("No journal session is active")]
    NoActiveSession,

    /// Filesystem error on a journal file or directory.
    #[error("Journal I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A journal file could not be (de)serialized.
    #[error("Invalid journal file {path}: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// No session matched the requested id.
    #[error("Session not found: {id}")]
    SessionNotFound { id: String },
}

/// Errors produced while reversing a journal entry.
#[derive(Debug, Error)]
pub enum UndoError {
    /// The renamed file is gone, so there is nothing to move back.
    #[error("file {} not found", path.display())]
    Missing { path: PathBuf },

    /// Restoring would overwrite whatever now lives at the original path.
    #[error("cannot restore {}: path is occupied", path.display())]
    Occupied { path: PathBuf },

    /// A symlink at the recorded destination points somewhere else.
    #[error(
        "link {} points to {}, expected {}",
        link.display(),
        actual.display(),
        expected.display()
    )]
    LinkMismatch {
        link: PathBuf,
        actual: PathBuf,
        expected: PathBuf,
    },

    /// The created directory has gained content since.
    #[error("directory {} is not empty", path.display())]
    NotEmpty { path: PathBuf },

    /// A created directory path is now something else.
    #[error("{} is not a directory", path.display())]
    NotADirectory { path: PathBuf },

    /// Deleted content cannot be brought back.
    #[error("cannot undo deletion of {}: deleted content cannot be recovered", path.display())]
    Irreversible { path: PathBuf },

    /// The entry has an operation type this version does not know.
    #[error("entry {id}: unknown operation type")]
    UnknownType { id: u64 },

    /// The entry lacks a path the compensation needs.
    #[error("entry {id}: no {field} recorded")]
    MissingPath { id: u64, field: &'static str },

    /// Filesystem error while compensating.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl UndoError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
