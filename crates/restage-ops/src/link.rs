//! Link primitive.

use std::path::Path;

use restage_core::{LinkMode, Node};

use crate::error::OpError;
use crate::fs::FileSystem;
use crate::operation::record_status;

/// Link `node`'s file to `destination` using the node's link mode.
///
/// Returns `Ok(true)` when a link was created and `Ok(false)` when something
/// already exists at `destination`; the latter still counts as success so
/// that re-running over a partly linked tree is safe.
pub fn link_node<F: FileSystem + ?Sized>(
    fs: &F,
    node: &mut Node,
    destination: &Path,
) -> Result<bool, OpError> {
    let result = try_link(fs, node, destination);
    record_status(node, &result);
    if result.is_ok() {
        if let Some(meta) = node.metadata.as_mut() {
            meta.link_target = Some(destination.to_path_buf());
        }
    }
    result
}

fn try_link<F: FileSystem + ?Sized>(
    fs: &F,
    node: &Node,
    destination: &Path,
) -> Result<bool, OpError> {
    let meta = node
        .metadata
        .as_ref()
        .ok_or(OpError::MissingMetadata { id: node.id })?;

    if fs.exists(destination) {
        tracing::debug!(dest = %destination.display(), "link destination exists, skipping");
        return Ok(false);
    }

    let source = node.path.as_path();
    match meta.link_mode {
        LinkMode::Hard => fs
            .hard_link(source, destination)
            .map_err(|e| OpError::io(destination, e))?,
        LinkMode::Soft => fs
            .symlink(source, destination)
            .map_err(|e| OpError::io(destination, e))?,
        LinkMode::Auto | LinkMode::None => {
            if let Err(hard) = fs.hard_link(source, destination) {
                tracing::debug!(
                    source = %source.display(),
                    error = %hard,
                    "hard link failed, falling back to symlink"
                );
                fs.symlink(source, destination)
                    .map_err(|soft| OpError::LinkFailed {
                        path: destination.to_path_buf(),
                        hard,
                        soft,
                    })?;
            }
        }
    }

    tracing::debug!(
        source = %source.display(),
        dest = %destination.display(),
        mode = %meta.link_mode,
        "linked"
    );
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::OsFileSystem;
    use restage_core::{Metadata, NodeId, RenameStatus};
    use std::fs;
    use tempfile::TempDir;

    fn source_node(dir: &Path, mode: LinkMode) -> Node {
        let path = dir.join("episode.mkv");
        fs::write(&path, b"video").unwrap();
        let mut node = Node::new(NodeId::new(1), "episode.mkv", path, false);
        node.metadata = Some(Metadata::default().with_link_mode(mode));
        node
    }

    #[test]
    fn test_hard_link() {
        let dir = TempDir::new().unwrap();
        let mut node = source_node(dir.path(), LinkMode::Hard);
        let dest = dir.path().join("linked.mkv");

        assert!(link_node(&OsFileSystem, &mut node, &dest).unwrap());
        assert_eq!(fs::read(&dest).unwrap(), b"video");
        assert!(!fs::symlink_metadata(&dest).unwrap().file_type().is_symlink());
        assert_eq!(
            node.metadata.as_ref().unwrap().link_target.as_deref(),
            Some(dest.as_path())
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_soft_link() {
        let dir = TempDir::new().unwrap();
        let mut node = source_node(dir.path(), LinkMode::Soft);
        let dest = dir.path().join("soft.mkv");

        assert!(link_node(&OsFileSystem, &mut node, &dest).unwrap());
        assert_eq!(fs::read_link(&dest).unwrap(), node.path);
    }

    #[test]
    fn test_existing_destination_is_success() {
        let dir = TempDir::new().unwrap();
        let mut node = source_node(dir.path(), LinkMode::Auto);
        let dest = dir.path().join("linked.mkv");

        assert!(link_node(&OsFileSystem, &mut node, &dest).unwrap());
        assert!(!link_node(&OsFileSystem, &mut node, &dest).unwrap());
        assert_eq!(
            node.metadata.as_ref().unwrap().rename_status,
            RenameStatus::Success
        );
    }

    #[test]
    fn test_missing_source_fails() {
        let dir = TempDir::new().unwrap();
        let mut node = Node::new(
            NodeId::new(1),
            "gone.mkv",
            dir.path().join("gone.mkv"),
            false,
        );
        node.metadata = Some(Metadata::default().with_link_mode(LinkMode::Hard));

        let result = link_node(&OsFileSystem, &mut node, &dir.path().join("dest.mkv"));
        assert!(result.is_err());
        assert_eq!(
            node.metadata.as_ref().unwrap().rename_status,
            RenameStatus::Error
        );
    }
}
