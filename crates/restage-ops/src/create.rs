//! Directory creation and virtual directory materialization.

use std::path::{Path, PathBuf};

use restage_core::{MediaTree, Node, NodeId};

use crate::error::OpError;
use crate::fs::FileSystem;
use crate::journal::LogType;
use crate::link::link_node;
use crate::operation::record_status;
use crate::queue::Mode;
use crate::rename::rename_node;

/// Make sure a directory exists at `path`.
///
/// Returns `Ok(true)` if it was created and `Ok(false)` if it was already
/// there. A file in the way is an error.
pub fn ensure_dir<F: FileSystem + ?Sized>(
    fs: &F,
    node: &mut Node,
    path: &Path,
) -> Result<bool, OpError> {
    let result = try_ensure_dir(fs, path);
    record_status(node, &result);
    result
}

fn try_ensure_dir<F: FileSystem + ?Sized>(fs: &F, path: &Path) -> Result<bool, OpError> {
    if fs.exists(path) {
        if fs.is_dir(path) {
            return Ok(false);
        }
        return Err(OpError::NotADirectory {
            path: path.to_path_buf(),
        });
    }
    fs.create_dir_all(path).map_err(|e| OpError::io(path, e))?;
    tracing::debug!(path = %path.display(), "created directory");
    Ok(true)
}

/// What happened to one child while materializing its virtual parent.
#[derive(Debug)]
pub struct ChildOutcome {
    pub node: NodeId,
    /// Journal type of the mutation attempted on the child.
    pub kind: LogType,
    pub source: PathBuf,
    pub destination: PathBuf,
    /// `Ok(false)` means nothing had to be done.
    pub result: Result<bool, OpError>,
}

/// Result of materializing a virtual directory.
#[derive(Debug, Default)]
pub struct MaterializeOutcome {
    /// Whether the directory itself had to be created.
    pub created: bool,
    /// One entry per child, in tree order.
    pub children: Vec<ChildOutcome>,
}

impl MaterializeOutcome {
    /// Number of children that could not be moved or linked.
    pub fn failed_children(&self) -> usize {
        self.children.iter().filter(|c| c.result.is_err()).count()
    }
}

/// Create the virtual directory `id` at `path`, then move (rename mode) or
/// link (link mode) each of its children into it.
///
/// Only a failure to create the directory is returned as an error. Children
/// are handled independently and their failures are reported in the outcome.
pub fn materialize_virtual_dir<F: FileSystem + ?Sized>(
    fs: &F,
    tree: &mut MediaTree,
    id: NodeId,
    path: &Path,
    mode: Mode,
) -> Result<MaterializeOutcome, OpError> {
    let node = tree.node_mut(id)?;
    if node.metadata.is_none() {
        return Err(OpError::MissingMetadata { id });
    }
    let created = ensure_dir(fs, node, path)?;

    if let Some(meta) = node.metadata.as_mut() {
        meta.is_virtual = false;
        if mode == Mode::Link {
            meta.link_target = Some(path.to_path_buf());
        }
    }
    if mode == Mode::Rename {
        node.path = path.to_path_buf();
    }

    let mut outcome = MaterializeOutcome {
        created,
        children: Vec::new(),
    };

    for child in tree.children(id).to_vec() {
        let Some(node) = tree.get_mut(child) else {
            continue;
        };
        let source = node.path.clone();
        let destination = path.join(node.target_name());

        let (kind, result) = match mode {
            Mode::Rename => (LogType::Rename, rename_node(fs, node, &destination)),
            Mode::Link if node.is_dir => {
                let result = ensure_dir(fs, node, &destination);
                if result.is_ok() {
                    if let Some(meta) = node.metadata.as_mut() {
                        meta.link_target = Some(destination.clone());
                    }
                }
                (LogType::CreateDir, result)
            }
            Mode::Link => (LogType::Link, link_node(fs, node, &destination)),
        };

        if mode == Mode::Rename && matches!(result, Ok(true)) {
            tree.rebase_descendants(child, &source, &destination);
        }
        if let Err(e) = &result {
            tracing::warn!(
                child = %source.display(),
                error = %e,
                "failed to place child in new directory"
            );
        }

        outcome.children.push(ChildOutcome {
            node: child,
            kind,
            source,
            destination,
            result,
        });
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::OsFileSystem;
    use restage_core::{Metadata, RenameStatus};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_ensure_dir_idempotent() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("Show").join("Season 01");
        let mut node = Node::new(NodeId::new(1), "Season 01", target.clone(), true);
        node.metadata = Some(Metadata::default());

        assert!(ensure_dir(&OsFileSystem, &mut node, &target).unwrap());
        assert!(target.is_dir());
        assert!(!ensure_dir(&OsFileSystem, &mut node, &target).unwrap());
    }

    #[test]
    fn test_ensure_dir_file_in_the_way() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("blocker");
        fs::write(&target, b"x").unwrap();
        let mut node = Node::new(NodeId::new(1), "blocker", target.clone(), true);
        node.metadata = Some(Metadata::default());

        let err = ensure_dir(&OsFileSystem, &mut node, &target).unwrap_err();
        assert!(matches!(err, OpError::NotADirectory { .. }));
    }

    #[test]
    fn test_materialize_moves_children() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("movie.mkv"), b"m").unwrap();
        fs::write(dir.path().join("movie.srt"), b"s").unwrap();

        let mut tree = MediaTree::new(dir.path());
        let vdir = tree.add_virtual_dir(tree.root(), "Movie (2020)", Metadata::default());
        let a = tree.add_existing(
            vdir,
            dir.path().join("movie.mkv"),
            false,
            Metadata::default().with_new_name("Movie (2020).mkv"),
        );
        let b = tree.add_existing(vdir, dir.path().join("movie.srt"), false, Metadata::default());

        let target = dir.path().join("Movie (2020)");
        let outcome =
            materialize_virtual_dir(&OsFileSystem, &mut tree, vdir, &target, Mode::Rename)
                .unwrap();

        assert!(outcome.created);
        assert_eq!(outcome.failed_children(), 0);
        assert!(target.join("Movie (2020).mkv").exists());
        assert!(target.join("movie.srt").exists());
        assert_eq!(tree.get(a).unwrap().path, target.join("Movie (2020).mkv"));
        assert_eq!(tree.get(b).unwrap().path, target.join("movie.srt"));
        let meta = tree.get(vdir).unwrap().metadata.as_ref().unwrap();
        assert!(!meta.is_virtual);
        assert_eq!(meta.rename_status, RenameStatus::Success);
    }

    #[test]
    fn test_materialize_child_failure_is_isolated() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("ok.mkv"), b"m").unwrap();

        let mut tree = MediaTree::new(dir.path());
        let vdir = tree.add_virtual_dir(tree.root(), "Target", Metadata::default());
        let missing = tree.add_existing(
            vdir,
            dir.path().join("missing.mkv"),
            false,
            Metadata::default(),
        );
        let ok = tree.add_existing(vdir, dir.path().join("ok.mkv"), false, Metadata::default());

        let target = dir.path().join("Target");
        let outcome =
            materialize_virtual_dir(&OsFileSystem, &mut tree, vdir, &target, Mode::Rename)
                .unwrap();

        assert_eq!(outcome.failed_children(), 1);
        assert!(target.join("ok.mkv").exists());
        let status = |id| {
            tree.get(id)
                .unwrap()
                .metadata
                .as_ref()
                .unwrap()
                .rename_status
        };
        assert_eq!(status(missing), RenameStatus::Error);
        assert_eq!(status(ok), RenameStatus::Success);
        assert_eq!(status(vdir), RenameStatus::Success);
    }
}
