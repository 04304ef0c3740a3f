//! Tree node and per-node metadata types.

use std::path::PathBuf;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Unique identifier for a node within a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl NodeId {
    /// Create a new NodeId from an arena index.
    pub fn new(id: usize) -> Self {
        Self(id)
    }

    /// Get the arena index.
    pub fn index(self) -> usize {
        self.0
    }
}

/// The kind of media entry a node represents.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MediaType {
    Show,
    Season,
    #[default]
    Episode,
    Movie,
    MovieFile,
}

/// Outcome of the last mutation attempted on a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RenameStatus {
    #[default]
    None,
    Success,
    Error,
}

/// How a node is linked into the target tree in link mode.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LinkMode {
    /// No preference; treated like `Auto`.
    #[default]
    None,
    /// Hard link, falling back to a symlink.
    Auto,
    /// Hard link only.
    Hard,
    /// Symlink only.
    Soft,
}

/// Annotations attached to a node by the naming pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    /// What this entry is.
    #[serde(rename = "type")]
    pub media_type: MediaType,
    /// Proposed file name. Empty means no change.
    pub new_name: String,
    pub rename_status: RenameStatus,
    pub rename_error: Option<String>,
    pub marked_for_deletion: bool,
    /// The directory has to be created before children can move in.
    pub needs_directory: bool,
    /// The node does not exist on disk yet.
    pub is_virtual: bool,
    /// Target location in link mode.
    pub destination_path: Option<PathBuf>,
    pub link_mode: LinkMode,
    /// Path of the link created for this node, once linked.
    pub link_target: Option<PathBuf>,
}

impl Metadata {
    /// Create metadata for the given media type with no proposed change.
    pub fn new(media_type: MediaType) -> Self {
        Self {
            media_type,
            ..Default::default()
        }
    }

    /// Set the proposed name.
    pub fn with_new_name(mut self, name: impl Into<String>) -> Self {
        self.new_name = name.into();
        self
    }

    /// Set the link-mode destination.
    pub fn with_destination(mut self, path: impl Into<PathBuf>) -> Self {
        self.destination_path = Some(path.into());
        self
    }

    /// Set the link mode.
    pub fn with_link_mode(mut self, mode: LinkMode) -> Self {
        self.link_mode = mode;
        self
    }

    /// Mark the node for deletion.
    pub fn marked_for_deletion(mut self) -> Self {
        self.marked_for_deletion = true;
        self
    }

    /// Whether a rename to `new_name` would change anything.
    pub fn has_proposed_change(&self, current_name: &str) -> bool {
        !self.new_name.is_empty() && self.new_name != current_name
    }

    /// Whether this node is a directory that still has to be created.
    pub fn is_unmaterialized_dir(&self) -> bool {
        self.needs_directory && self.is_virtual
    }

    /// Whether a non-empty link destination is set.
    pub fn has_destination(&self) -> bool {
        self.destination_path
            .as_ref()
            .is_some_and(|p| !p.as_os_str().is_empty())
    }

    /// Record a successful mutation.
    pub fn mark_success(&mut self) {
        self.rename_status = RenameStatus::Success;
        self.rename_error = None;
    }

    /// Record a failed mutation.
    pub fn mark_error(&mut self, message: impl Into<String>) {
        self.rename_status = RenameStatus::Error;
        self.rename_error = Some(message.into());
    }
}

/// A single file or directory in the tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier for this node.
    pub id: NodeId,

    /// File/directory name as scanned (not full path).
    pub name: CompactString,

    /// Current location on disk. Updated in place after a successful move.
    pub path: PathBuf,

    /// Whether this entry is a directory.
    pub is_dir: bool,

    /// Parent node, used for traversal only.
    #[serde(default)]
    pub parent: Option<NodeId>,

    /// Child nodes in insertion order.
    #[serde(default)]
    pub children: Vec<NodeId>,

    /// Naming annotations, if the naming pass produced any.
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

impl Node {
    /// Create a new detached node.
    pub fn new(id: NodeId, name: impl Into<CompactString>, path: PathBuf, is_dir: bool) -> Self {
        Self {
            id,
            name: name.into(),
            path,
            is_dir,
            parent: None,
            children: Vec::new(),
            metadata: None,
        }
    }

    /// Name the node currently has on disk.
    pub fn current_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.name.to_string())
    }

    /// Name the node should end up with.
    pub fn target_name(&self) -> String {
        match &self.metadata {
            Some(meta) if !meta.new_name.is_empty() => meta.new_name.clone(),
            _ => self.current_name(),
        }
    }

    /// Whether the node has a pending rename.
    pub fn has_proposed_change(&self) -> bool {
        self.metadata
            .as_ref()
            .is_some_and(|m| m.has_proposed_change(&self.current_name()))
    }

    /// Whether the node is a virtual directory waiting to be created.
    pub fn is_unmaterialized_dir(&self) -> bool {
        self.metadata
            .as_ref()
            .is_some_and(Metadata::is_unmaterialized_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id() {
        let id = NodeId::new(42);
        assert_eq!(id.index(), 42);
    }

    #[test]
    fn test_proposed_change() {
        let meta = Metadata::new(MediaType::Episode);
        assert!(!meta.has_proposed_change("a.mkv"));

        let meta = meta.with_new_name("a.mkv");
        assert!(!meta.has_proposed_change("a.mkv"));
        assert!(meta.has_proposed_change("b.mkv"));
    }

    #[test]
    fn test_mark_status() {
        let mut meta = Metadata::default();
        meta.mark_error("boom");
        assert_eq!(meta.rename_status, RenameStatus::Error);
        assert_eq!(meta.rename_error.as_deref(), Some("boom"));

        meta.mark_success();
        assert_eq!(meta.rename_status, RenameStatus::Success);
        assert!(meta.rename_error.is_none());
    }

    #[test]
    fn test_target_name() {
        let mut node = Node::new(NodeId::new(0), "old.txt", PathBuf::from("/t/old.txt"), false);
        assert_eq!(node.target_name(), "old.txt");

        node.metadata = Some(Metadata::default().with_new_name("new.txt"));
        assert_eq!(node.target_name(), "new.txt");
        assert!(node.has_proposed_change());
    }

    #[test]
    fn test_media_type_names() {
        assert_eq!(MediaType::MovieFile.to_string(), "movie_file");
        assert_eq!("season".parse::<MediaType>().unwrap(), MediaType::Season);
        assert_eq!(
            serde_json::to_string(&MediaType::MovieFile).unwrap(),
            "\"movie_file\""
        );
    }
}
