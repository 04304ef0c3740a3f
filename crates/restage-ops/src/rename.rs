//! Rename primitive.

use std::path::{Path, PathBuf};

use restage_core::Node;

use crate::error::OpError;
use crate::fs::FileSystem;
use crate::operation::record_status;

/// Where a rename of `node` should land: its current directory joined with
/// its proposed name.
pub fn planned_destination(node: &Node) -> Result<PathBuf, OpError> {
    let meta = node
        .metadata
        .as_ref()
        .ok_or(OpError::MissingMetadata { id: node.id })?;
    let parent = node.path.parent().ok_or_else(|| OpError::MissingDestination {
        path: node.path.clone(),
    })?;
    if meta.new_name.is_empty() {
        return Ok(node.path.clone());
    }
    validate_filename(&meta.new_name).map_err(|reason| OpError::InvalidName {
        name: meta.new_name.clone(),
        reason,
    })?;
    Ok(parent.join(&meta.new_name))
}

/// Move `node` to `destination`, updating its path and status in place.
///
/// Returns `Ok(false)` without touching the filesystem when the node is
/// already at `destination`. An existing destination is a collision and is
/// never overwritten.
pub fn rename_node<F: FileSystem + ?Sized>(
    fs: &F,
    node: &mut Node,
    destination: &Path,
) -> Result<bool, OpError> {
    let result = try_rename(fs, node, destination);
    record_status(node, &result);
    result
}

fn try_rename<F: FileSystem + ?Sized>(
    fs: &F,
    node: &mut Node,
    destination: &Path,
) -> Result<bool, OpError> {
    if node.metadata.is_none() {
        return Err(OpError::MissingMetadata { id: node.id });
    }

    if destination == node.path {
        return Ok(false);
    }

    if let Some(name) = destination.file_name().and_then(|n| n.to_str()) {
        validate_filename(name).map_err(|reason| OpError::InvalidName {
            name: name.to_string(),
            reason,
        })?;
    }

    if fs.exists(destination) {
        return Err(OpError::Collision {
            path: destination.to_path_buf(),
        });
    }

    fs.rename(&node.path, destination)
        .map_err(|e| OpError::io(&node.path, e))?;

    tracing::debug!(
        from = %node.path.display(),
        to = %destination.display(),
        "renamed"
    );
    node.path = destination.to_path_buf();
    Ok(true)
}

/// Validate a filename for cross-platform compatibility.
pub fn validate_filename(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("Name cannot be empty".into());
    }

    if name.len() > 255 {
        return Err("Name is too long (max 255 bytes)".into());
    }

    for c in ['/', '\0'] {
        if name.contains(c) {
            return Err(format!("Name cannot contain '{}'", c.escape_default()));
        }
    }

    #[cfg(target_os = "windows")]
    {
        let windows_invalid = ['\\', ':', '*', '?', '"', '<', '>', '|'];
        for c in windows_invalid {
            if name.contains(c) {
                return Err(format!("Name cannot contain '{}'", c));
            }
        }
    }

    if name == "." || name == ".." {
        return Err("'.' and '..' are reserved names".into());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::OsFileSystem;
    use restage_core::{Metadata, NodeId, RenameStatus};
    use std::fs;
    use tempfile::TempDir;

    fn file_node(dir: &Path, name: &str, new_name: &str) -> Node {
        let path = dir.join(name);
        fs::write(&path, b"data").unwrap();
        let mut node = Node::new(NodeId::new(1), name, path, false);
        node.metadata = Some(Metadata::default().with_new_name(new_name));
        node
    }

    #[test]
    fn test_validate_filename() {
        assert!(validate_filename("Show - S01E01.mkv").is_ok());
        assert!(validate_filename(".hidden").is_ok());
        assert!(validate_filename("").is_err());
        assert!(validate_filename("a/b").is_err());
        assert!(validate_filename("..").is_err());
        assert!(validate_filename(&"x".repeat(256)).is_err());
    }

    #[test]
    fn test_rename_moves_and_updates_path() {
        let dir = TempDir::new().unwrap();
        let mut node = file_node(dir.path(), "old.txt", "new.txt");
        let dest = planned_destination(&node).unwrap();

        assert!(rename_node(&OsFileSystem, &mut node, &dest).unwrap());
        assert_eq!(node.path, dir.path().join("new.txt"));
        assert!(dest.exists());
        assert!(!dir.path().join("old.txt").exists());
        assert_eq!(
            node.metadata.as_ref().unwrap().rename_status,
            RenameStatus::Success
        );
    }

    #[test]
    fn test_rename_same_path_is_noop() {
        let dir = TempDir::new().unwrap();
        let mut node = file_node(dir.path(), "same.txt", "");
        let dest = node.path.clone();

        assert!(!rename_node(&OsFileSystem, &mut node, &dest).unwrap());
        assert!(dest.exists());
    }

    #[test]
    fn test_rename_refuses_collision() {
        let dir = TempDir::new().unwrap();
        let mut node = file_node(dir.path(), "a.txt", "b.txt");
        fs::write(dir.path().join("b.txt"), b"keep").unwrap();
        let dest = planned_destination(&node).unwrap();

        let err = rename_node(&OsFileSystem, &mut node, &dest).unwrap_err();
        assert!(matches!(err, OpError::Collision { .. }));
        assert_eq!(fs::read(dir.path().join("b.txt")).unwrap(), b"keep");
        let meta = node.metadata.as_ref().unwrap();
        assert_eq!(meta.rename_status, RenameStatus::Error);
        assert!(meta.rename_error.as_ref().unwrap().contains("already exists"));
    }
}
