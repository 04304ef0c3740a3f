//! Arena-backed media tree with the traversal orders the engine needs.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use crate::error::TreeError;
use crate::node::{Metadata, Node, NodeId};

/// Annotated tree of media entries.
///
/// Nodes live in a flat arena and refer to each other by [`NodeId`]. The
/// parent link exists for traversal only; the tree owns every node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaTree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl MediaTree {
    /// Create a tree whose root directory is `root_path`.
    pub fn new(root_path: impl Into<PathBuf>) -> Self {
        let path = root_path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let root = Node::new(NodeId::new(0), name, path, true);
        Self {
            nodes: vec![root],
            root: NodeId::new(0),
        }
    }

    /// Root node id.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// A tree always has its root, so it is never empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add a child entry below `parent`. Its path is `parent.path/name`.
    ///
    /// # Panics
    ///
    /// Panics if `parent` is not a node of this tree.
    pub fn add_child(
        &mut self,
        parent: NodeId,
        name: impl Into<CompactString>,
        is_dir: bool,
    ) -> NodeId {
        let name = name.into();
        let path = self.nodes[parent.index()].path.join(name.as_str());
        let id = NodeId::new(self.nodes.len());
        let mut node = Node::new(id, name, path, is_dir);
        node.parent = Some(parent);
        self.nodes.push(node);
        self.nodes[parent.index()].children.push(id);
        id
    }

    /// Add a child that already carries metadata.
    pub fn add_child_with(
        &mut self,
        parent: NodeId,
        name: impl Into<CompactString>,
        is_dir: bool,
        metadata: Metadata,
    ) -> NodeId {
        let id = self.add_child(parent, name, is_dir);
        self.nodes[id.index()].metadata = Some(metadata);
        id
    }

    /// Add a directory that does not exist on disk yet.
    pub fn add_virtual_dir(
        &mut self,
        parent: NodeId,
        name: impl Into<CompactString>,
        metadata: Metadata,
    ) -> NodeId {
        let mut metadata = metadata;
        metadata.needs_directory = true;
        metadata.is_virtual = true;
        self.add_child_with(parent, name, true, metadata)
    }

    /// Attach an existing on-disk entry below a (usually virtual) parent.
    ///
    /// Unlike [`add_child`](Self::add_child) the node keeps its real path,
    /// since the parent it is grouped under does not contain it yet.
    ///
    /// # Panics
    ///
    /// Panics if `parent` is not a node of this tree.
    pub fn add_existing(
        &mut self,
        parent: NodeId,
        path: impl Into<PathBuf>,
        is_dir: bool,
        metadata: Metadata,
    ) -> NodeId {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let id = NodeId::new(self.nodes.len());
        let mut node = Node::new(id, name, path, is_dir);
        node.parent = Some(parent);
        node.metadata = Some(metadata);
        self.nodes.push(node);
        self.nodes[parent.index()].children.push(id);
        id
    }

    /// Get a node by id.
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// Get a mutable node by id.
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index())
    }

    /// Get a node or a [`TreeError::UnknownNode`].
    pub fn node(&self, id: NodeId) -> Result<&Node, TreeError> {
        self.get(id).ok_or(TreeError::UnknownNode { id })
    }

    /// Get a mutable node or a [`TreeError::UnknownNode`].
    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, TreeError> {
        self.get_mut(id).ok_or(TreeError::UnknownNode { id })
    }

    /// Parent of a node.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.parent)
    }

    /// Direct children of a node.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Iterate over all nodes in arena order.
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// Node ids in pre-order (parent, then each child subtree in order).
    pub fn pre_order(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        out
    }

    /// Node ids level by level, parents before children.
    pub fn breadth_first(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut queue = VecDeque::from([self.root]);
        while let Some(id) = queue.pop_front() {
            out.push(id);
            queue.extend(self.children(id).iter().copied());
        }
        out
    }

    /// Node ids in post-order, every child before its parent.
    pub fn bottom_up(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![(self.root, false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                out.push(id);
                continue;
            }
            stack.push((id, true));
            stack.extend(self.children(id).iter().rev().map(|&c| (c, false)));
        }
        out
    }

    /// Whether any ancestor of `id` is a directory still waiting to be created.
    pub fn has_virtual_ancestor(&self, id: NodeId) -> bool {
        let mut current = self.parent(id);
        while let Some(p) = current {
            if self.get(p).is_some_and(Node::is_unmaterialized_dir) {
                return true;
            }
            current = self.parent(p);
        }
        false
    }

    /// Whether `ancestor` is a strict ancestor of `id`.
    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = self.parent(id);
        while let Some(p) = current {
            if p == ancestor {
                return true;
            }
            current = self.parent(p);
        }
        false
    }

    /// Rewrite the paths of every descendant of `id` that lived under `old`
    /// so they live under `new` instead.
    pub fn rebase_descendants(&mut self, id: NodeId, old: &Path, new: &Path) {
        let mut stack: Vec<NodeId> = self.children(id).to_vec();
        while let Some(child) = stack.pop() {
            stack.extend(self.children(child).iter().copied());
            let Some(node) = self.get_mut(child) else {
                continue;
            };
            if let Ok(rest) = node.path.strip_prefix(old) {
                node.path = new.join(rest);
            }
        }
    }

    /// Load a serialized tree from a JSON file.
    pub fn load(path: &Path) -> Result<Self, TreeError> {
        let data = fs::read_to_string(path).map_err(|e| TreeError::io(path, e))?;
        let tree: Self = serde_json::from_str(&data).map_err(|e| TreeError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        tree.validate()?;
        Ok(tree)
    }

    /// Write the tree as indented JSON.
    pub fn save(&self, path: &Path) -> Result<(), TreeError> {
        let data = serde_json::to_string_pretty(self).map_err(|e| TreeError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        fs::write(path, data).map_err(|e| TreeError::io(path, e))
    }

    /// Check that ids and links are consistent after deserialization.
    ///
    /// Besides matching parent/child links, every node must be reachable from
    /// the root exactly once, so the traversals always terminate.
    pub fn validate(&self) -> Result<(), TreeError> {
        let Some(root) = self.get(self.root) else {
            return Err(TreeError::UnknownNode { id: self.root });
        };
        if let Some(parent) = root.parent {
            return Err(TreeError::Inconsistent {
                message: format!("root has parent {}", parent.index()),
            });
        }
        for (index, node) in self.nodes.iter().enumerate() {
            if node.id.index() != index {
                return Err(TreeError::Inconsistent {
                    message: format!("node at index {index} has id {}", node.id.index()),
                });
            }
            for &child in &node.children {
                let Some(c) = self.get(child) else {
                    return Err(TreeError::UnknownNode { id: child });
                };
                if child == self.root {
                    return Err(TreeError::Inconsistent {
                        message: format!("node {index} lists the root as a child"),
                    });
                }
                if c.parent != Some(node.id) {
                    return Err(TreeError::Inconsistent {
                        message: format!(
                            "node {} lists child {} whose parent differs",
                            index,
                            child.index()
                        ),
                    });
                }
            }
        }

        let mut seen = vec![false; self.nodes.len()];
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            if std::mem::replace(&mut seen[id.index()], true) {
                return Err(TreeError::Inconsistent {
                    message: format!("node {} is reached more than once", id.index()),
                });
            }
            stack.extend(self.children(id).iter().copied());
        }
        if let Some(orphan) = seen.iter().position(|&reached| !reached) {
            return Err(TreeError::Inconsistent {
                message: format!("node {orphan} is not reachable from the root"),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (MediaTree, [NodeId; 4]) {
        // root
        // ├── a
        // │   └── a1
        // └── b
        let mut tree = MediaTree::new("/media");
        let a = tree.add_child(tree.root(), "a", true);
        let a1 = tree.add_child(a, "a1", false);
        let b = tree.add_child(tree.root(), "b", false);
        (tree, [tree_root(), a, a1, b])
    }

    fn tree_root() -> NodeId {
        NodeId::new(0)
    }

    #[test]
    fn test_child_paths() {
        let (tree, [_, a, a1, _]) = sample();
        assert_eq!(tree.get(a).unwrap().path, PathBuf::from("/media/a"));
        assert_eq!(tree.get(a1).unwrap().path, PathBuf::from("/media/a/a1"));
        assert_eq!(tree.parent(a1), Some(a));
    }

    #[test]
    fn test_traversal_orders() {
        let (tree, [root, a, a1, b]) = sample();
        assert_eq!(tree.pre_order(), vec![root, a, a1, b]);
        assert_eq!(tree.breadth_first(), vec![root, a, b, a1]);
        assert_eq!(tree.bottom_up(), vec![a1, a, b, root]);
    }

    #[test]
    fn test_rebase_descendants() {
        let (mut tree, [_, a, a1, _]) = sample();
        tree.rebase_descendants(a, Path::new("/media/a"), Path::new("/media/z"));
        assert_eq!(tree.get(a1).unwrap().path, PathBuf::from("/media/z/a1"));
    }

    #[test]
    fn test_virtual_ancestor() {
        let mut tree = MediaTree::new("/media");
        let dir = tree.add_virtual_dir(tree.root(), "Movie (2020)", Metadata::default());
        let file = tree.add_existing(dir, "/media/movie.mkv", false, Metadata::default());
        assert!(tree.has_virtual_ancestor(file));
        assert!(!tree.has_virtual_ancestor(dir));
        assert!(tree.is_ancestor(dir, file));
        assert_eq!(tree.get(file).unwrap().path, PathBuf::from("/media/movie.mkv"));
    }
}
