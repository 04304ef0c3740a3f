//! Queue entry types.

use std::path::{Path, PathBuf};

use restage_core::{Node, NodeId};
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::error::OpError;

/// A queued filesystem mutation. Rebuilt for every run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Create a virtual directory at `path` and move or link its children into it.
    VirtualDir { node: NodeId, path: PathBuf },
    /// Delete the node's file.
    Delete { node: NodeId },
    /// Rename the node to its proposed name in its current directory.
    Rename { node: NodeId },
    /// Make sure the directory at `path` exists (link mode).
    EnsureDir { node: NodeId, path: PathBuf },
    /// Link the node's file to `destination` (link mode).
    Link { node: NodeId, destination: PathBuf },
}

impl Operation {
    /// The node this operation acts on.
    pub fn node(&self) -> NodeId {
        match self {
            Self::VirtualDir { node, .. }
            | Self::Delete { node }
            | Self::Rename { node }
            | Self::EnsureDir { node, .. }
            | Self::Link { node, .. } => *node,
        }
    }

    /// The kind tag, for display and progress reporting.
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::VirtualDir { .. } => OperationKind::VirtualDir,
            Self::Delete { .. } => OperationKind::Delete,
            Self::Rename { .. } => OperationKind::Rename,
            Self::EnsureDir { .. } => OperationKind::EnsureDir,
            Self::Link { .. } => OperationKind::Link,
        }
    }
}

/// The kind of a queued operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum OperationKind {
    #[strum(to_string = "Create directory")]
    VirtualDir,
    Delete,
    Rename,
    #[strum(to_string = "Ensure directory")]
    EnsureDir,
    Link,
}

/// An error that occurred during a file operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationError {
    /// The path that caused the error.
    pub path: PathBuf,
    /// A human-readable error message.
    pub message: String,
}

impl OperationError {
    /// Create a new operation error.
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }

    pub(crate) fn from_op(path: &Path, err: &OpError) -> Self {
        Self::new(path, err.to_string())
    }
}

impl std::fmt::Display for OperationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.message)
    }
}

/// Write the outcome of a primitive into the node's metadata.
pub(crate) fn record_status<T>(node: &mut Node, result: &Result<T, OpError>) {
    let Some(meta) = node.metadata.as_mut() else {
        return;
    };
    match result {
        Ok(_) => meta.mark_success(),
        Err(e) => meta.mark_error(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_accessors() {
        let op = Operation::Link {
            node: NodeId::new(3),
            destination: PathBuf::from("/lib/a.mkv"),
        };
        assert_eq!(op.node(), NodeId::new(3));
        assert_eq!(op.kind(), OperationKind::Link);
        assert_eq!(OperationKind::VirtualDir.to_string(), "Create directory");
    }

    #[test]
    fn test_operation_error_display() {
        let err = OperationError::new("/tmp/a", "boom");
        assert_eq!(err.to_string(), "/tmp/a: boom");
    }
}
