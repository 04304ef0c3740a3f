//! Builds the ordered operation queue from an annotated tree.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use restage_core::{MediaTree, Metadata, NodeId};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::operation::Operation;
use crate::rename::planned_destination;

/// Whether a run moves files in place or links them into a target tree.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Mode {
    #[default]
    Rename,
    Link,
}

/// Turns an annotated tree into a flat, dependency-ordered operation list.
///
/// The queue is built in three phases:
///
/// 1. virtual directories, pre-order, so they exist before anything moves
///    into them;
/// 2. deletions, pre-order, skipped entirely in link mode;
/// 3. renames bottom-up (children before parents) in rename mode, or
///    ensure-dir/link breadth-first (parents before children) in link mode.
///
/// Nodes handled in phases 1 and 2, and anything below a virtual directory
/// (placed by that directory's operation), are not queued again in phase 3.
#[derive(Debug, Clone, Default)]
pub struct QueueBuilder {
    mode: Mode,
    link_root: Option<PathBuf>,
}

impl QueueBuilder {
    /// Create a builder for the given mode.
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            link_root: None,
        }
    }

    /// Resolve relative link destinations against `root`.
    pub fn with_link_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.link_root = Some(root.into());
        self
    }

    /// The mode this builder queues for.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Build the queue.
    pub fn build(&self, tree: &MediaTree) -> Vec<Operation> {
        let mut handled: HashSet<NodeId> = HashSet::new();
        let mut ops = Vec::new();
        let pre_order = tree.pre_order();

        for &id in &pre_order {
            let Some(node) = tree.get(id) else { continue };
            let Some(meta) = node.metadata.as_ref() else {
                continue;
            };
            if !meta.is_unmaterialized_dir() {
                continue;
            }
            let path = match self.mode {
                Mode::Rename => {
                    Some(planned_destination(node).unwrap_or_else(|_| node.path.clone()))
                }
                Mode::Link => self.resolve_destination(meta),
            };
            if let Some(path) = path {
                handled.insert(id);
                ops.push(Operation::VirtualDir { node: id, path });
            }
        }

        if self.mode == Mode::Rename {
            for &id in &pre_order {
                if handled.contains(&id) {
                    continue;
                }
                let marked = tree
                    .get(id)
                    .and_then(|n| n.metadata.as_ref())
                    .is_some_and(|m| m.marked_for_deletion);
                if marked {
                    handled.insert(id);
                    ops.push(Operation::Delete { node: id });
                }
            }
        }

        let order = match self.mode {
            Mode::Rename => tree.bottom_up(),
            Mode::Link => tree.breadth_first(),
        };
        for id in order {
            if handled.contains(&id) || tree.has_virtual_ancestor(id) {
                continue;
            }
            let Some(node) = tree.get(id) else { continue };
            let Some(meta) = node.metadata.as_ref() else {
                continue;
            };
            match self.mode {
                Mode::Rename => {
                    if node.has_proposed_change() {
                        ops.push(Operation::Rename { node: id });
                    }
                }
                Mode::Link => {
                    let Some(destination) = self.resolve_destination(meta) else {
                        continue;
                    };
                    if node.is_dir {
                        ops.push(Operation::EnsureDir {
                            node: id,
                            path: destination,
                        });
                    } else {
                        ops.push(Operation::Link {
                            node: id,
                            destination,
                        });
                    }
                }
            }
        }

        tracing::debug!(mode = %self.mode, operations = ops.len(), "built operation queue");
        ops
    }

    fn resolve_destination(&self, meta: &Metadata) -> Option<PathBuf> {
        if !meta.has_destination() {
            return None;
        }
        let dest = meta.destination_path.as_deref()?;
        Some(self.resolve(dest))
    }

    fn resolve(&self, dest: &Path) -> PathBuf {
        match &self.link_root {
            Some(root) if dest.is_relative() => root.join(dest),
            _ => dest.to_path_buf(),
        }
    }
}
