//! Step-wise operation engine.

use std::path::{Path, PathBuf};

use restage_core::{MediaTree, NodeId};

use crate::create::{ensure_dir, materialize_virtual_dir};
use crate::delete::delete_node;
use crate::error::OpError;
use crate::fs::{FileSystem, OsFileSystem};
use crate::journal::{Journal, LogType};
use crate::link::link_node;
use crate::operation::{Operation, OperationError};
use crate::progress::{OperationComplete, OperationProgress};
use crate::queue::{Mode, QueueBuilder};
use crate::rename::{planned_destination, rename_node};

/// Result of one [`OperationEngine::process_next`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// One queue entry was processed.
    Progress(OperationProgress),
    /// The queue is exhausted.
    Complete(OperationComplete),
}

/// Inputs of a run besides the tree itself.
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    /// Rename in place or link into a target tree.
    pub mode: Mode,
    /// Root that relative link destinations are resolved against.
    pub link_root: Option<PathBuf>,
    /// Command name recorded in the journal.
    pub command: String,
    /// Arguments recorded in the journal.
    pub args: Vec<String>,
}

impl EngineOptions {
    /// Options for a run in `mode`.
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    /// Set the link-target root.
    pub fn with_link_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.link_root = Some(root.into());
        self
    }

    /// Set the command provenance written to the journal.
    pub fn with_command(mut self, command: impl Into<String>, args: Vec<String>) -> Self {
        self.command = command.into();
        self.args = args;
        self
    }
}

/// Drains an operation queue one entry per call.
///
/// Callers driving a UI call [`process_next`](Self::process_next) between
/// repaints; batch callers use [`run_to_completion`](Self::run_to_completion).
/// Stopping early is done by simply not calling again.
pub struct OperationEngine<'a, F: FileSystem = OsFileSystem> {
    tree: &'a mut MediaTree,
    journal: &'a mut Journal,
    fs: F,
    options: EngineOptions,
    queue: Vec<Operation>,
    cursor: usize,
    session_started: bool,
    progress: OperationProgress,
    errors: Vec<OperationError>,
    completion: Option<OperationComplete>,
}

impl<'a, F: FileSystem> OperationEngine<'a, F> {
    /// Build the queue for `tree` and prepare to run it.
    pub fn new(
        tree: &'a mut MediaTree,
        journal: &'a mut Journal,
        fs: F,
        options: EngineOptions,
    ) -> Self {
        let mut builder = QueueBuilder::new(options.mode);
        if let Some(root) = &options.link_root {
            builder = builder.with_link_root(root);
        }
        let queue = builder.build(tree);
        let progress = OperationProgress::new(queue.len());
        Self {
            tree,
            journal,
            fs,
            options,
            queue,
            cursor: 0,
            session_started: false,
            progress,
            errors: Vec::new(),
            completion: None,
        }
    }

    /// Number of queued operations.
    pub fn total_operations(&self) -> usize {
        self.queue.len()
    }

    /// The queued operations in execution order.
    pub fn queue(&self) -> &[Operation] {
        &self.queue
    }

    /// Latest progress snapshot.
    pub fn progress(&self) -> &OperationProgress {
        &self.progress
    }

    /// The tree being mutated.
    pub fn tree(&self) -> &MediaTree {
        self.tree
    }

    /// Process the next queue entry.
    ///
    /// The first call starts the journal session. Once the queue is exhausted
    /// the session is finalized and every further call returns the same
    /// completion.
    pub fn process_next(&mut self) -> Step {
        if let Some(done) = &self.completion {
            return Step::Complete(done.clone());
        }

        if !self.session_started {
            self.journal
                .start_session(&self.options.command, &self.options.args);
            self.session_started = true;
        }

        let Some(op) = self.queue.get(self.cursor).cloned() else {
            return Step::Complete(self.finish());
        };
        self.cursor += 1;

        let path = self
            .tree
            .get(op.node())
            .map(|n| n.path.clone())
            .unwrap_or_default();
        tracing::debug!(kind = %op.kind(), path = %path.display(), "dispatching operation");

        let result = self.dispatch(&op);
        if let Err(e) = &result {
            tracing::warn!(
                kind = %op.kind(),
                path = %path.display(),
                error = %e,
                "operation failed"
            );
            self.errors.push(OperationError::from_op(&path, e));
        }
        self.progress.record(op.kind(), path, result.is_ok());
        Step::Progress(self.progress.clone())
    }

    /// Run every remaining entry and return the completion.
    pub fn run_to_completion(&mut self) -> OperationComplete {
        self.run_with(|_| {})
    }

    /// Run every remaining entry, reporting progress after each one.
    pub fn run_with(
        &mut self,
        mut on_progress: impl FnMut(&OperationProgress),
    ) -> OperationComplete {
        loop {
            match self.process_next() {
                Step::Progress(progress) => on_progress(&progress),
                Step::Complete(done) => return done,
            }
        }
    }

    fn finish(&mut self) -> OperationComplete {
        let (journal_path, journal_error) = match self.journal.finish_session() {
            Ok(path) => (path, None),
            Err(e) => {
                tracing::error!(error = %e, "failed to write session journal");
                (None, Some(e.to_string()))
            }
        };
        let done = OperationComplete {
            succeeded: self.progress.success_count,
            failed: self.progress.error_count,
            errors: std::mem::take(&mut self.errors),
            journal_path,
            journal_error,
        };
        tracing::info!(
            succeeded = done.succeeded,
            failed = done.failed,
            "operation run finished"
        );
        self.completion = Some(done.clone());
        done
    }

    fn dispatch(&mut self, op: &Operation) -> Result<(), OpError> {
        match op {
            Operation::VirtualDir { node, path } => self.run_virtual_dir(*node, path),
            Operation::Delete { node } => self.run_delete(*node),
            Operation::Rename { node } => self.run_rename(*node),
            Operation::EnsureDir { node, path } => self.run_ensure_dir(*node, path),
            Operation::Link { node, destination } => self.run_link(*node, destination),
        }
    }

    fn run_rename(&mut self, id: NodeId) -> Result<(), OpError> {
        let node = self.tree.node_mut(id)?;
        let source = node.path.clone();
        let is_dir = node.is_dir;

        let destination = match planned_destination(node) {
            Ok(destination) => destination,
            Err(e) => {
                if let Some(meta) = node.metadata.as_mut() {
                    meta.mark_error(e.to_string());
                }
                self.log(LogType::Rename, &source, None, Some(&e));
                return Err(e);
            }
        };

        let result = rename_node(&self.fs, node, &destination);
        match &result {
            Ok(false) => {}
            Ok(true) => {
                if is_dir {
                    self.tree.rebase_descendants(id, &source, &destination);
                }
                self.log(LogType::Rename, &source, Some(&destination), None);
            }
            Err(e) => self.log(LogType::Rename, &source, Some(&destination), Some(e)),
        }
        result.map(|_| ())
    }

    fn run_link(&mut self, id: NodeId, destination: &Path) -> Result<(), OpError> {
        let node = self.tree.node_mut(id)?;
        let source = node.path.clone();
        let result = link_node(&self.fs, node, destination);
        match &result {
            Ok(false) => {}
            Ok(true) => self.log(LogType::Link, &source, Some(destination), None),
            Err(e) => self.log(LogType::Link, &source, Some(destination), Some(e)),
        }
        result.map(|_| ())
    }

    fn run_ensure_dir(&mut self, id: NodeId, path: &Path) -> Result<(), OpError> {
        let node = self.tree.node_mut(id)?;
        let result = ensure_dir(&self.fs, node, path);
        if result.is_ok() {
            if let Some(meta) = node.metadata.as_mut() {
                meta.link_target = Some(path.to_path_buf());
            }
        }
        match &result {
            Ok(false) => {}
            Ok(true) => self.log(LogType::CreateDir, path, None, None),
            Err(e) => self.log(LogType::CreateDir, path, None, Some(e)),
        }
        result.map(|_| ())
    }

    fn run_delete(&mut self, id: NodeId) -> Result<(), OpError> {
        let node = self.tree.node_mut(id)?;
        let path = node.path.clone();
        let result = delete_node(&self.fs, node);
        self.log(LogType::Delete, &path, None, result.as_ref().err());
        result
    }

    fn run_virtual_dir(&mut self, id: NodeId, path: &Path) -> Result<(), OpError> {
        let outcome =
            match materialize_virtual_dir(&self.fs, &mut *self.tree, id, path, self.options.mode) {
                Ok(outcome) => outcome,
                Err(e) => {
                    self.log(LogType::CreateDir, path, None, Some(&e));
                    return Err(e);
                }
            };

        if outcome.created {
            self.log(LogType::CreateDir, path, None, None);
        }
        for child in &outcome.children {
            // Directories are always journaled under source_path.
            let (source, dest) = if child.kind == LogType::CreateDir {
                (child.destination.as_path(), None)
            } else {
                (child.source.as_path(), Some(child.destination.as_path()))
            };
            match &child.result {
                Ok(false) => {}
                Ok(true) => self.log(child.kind, source, dest, None),
                Err(e) => {
                    self.log(child.kind, source, dest, Some(e));
                    self.errors.push(OperationError::from_op(&child.source, e));
                }
            }
        }
        Ok(())
    }

    fn log(&mut self, kind: LogType, source: &Path, dest: Option<&Path>, error: Option<&OpError>) {
        if let Err(e) = self.journal.record(kind, source, dest, error) {
            tracing::error!(error = %e, "failed to record operation");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use restage_core::{JournalConfig, Metadata};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_empty_queue_completes() {
        let logs = TempDir::new().unwrap();
        let mut journal = Journal::new(JournalConfig::new(logs.path()).without_retention());
        let mut tree = MediaTree::new("/nowhere");

        let mut engine =
            OperationEngine::new(&mut tree, &mut journal, OsFileSystem, EngineOptions::default());
        assert_eq!(engine.total_operations(), 0);
        let done = engine.run_to_completion();
        assert_eq!(done.total(), 0);
        assert!(done.journal_path.is_none());
    }

    #[test]
    fn test_completion_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let logs = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), b"a").unwrap();

        let mut tree = MediaTree::new(dir.path());
        tree.add_child_with(
            tree.root(),
            "a.txt",
            false,
            Metadata::default().with_new_name("b.txt"),
        );
        let mut journal = Journal::new(JournalConfig::new(logs.path()).without_retention());
        let mut engine = OperationEngine::new(
            &mut tree,
            &mut journal,
            OsFileSystem,
            EngineOptions::new(Mode::Rename).with_command("restage", vec![]),
        );

        assert!(matches!(engine.process_next(), Step::Progress(_)));
        let first = engine.process_next();
        let second = engine.process_next();
        assert_eq!(first, second);
        let Step::Complete(done) = first else {
            panic!("expected completion");
        };
        assert_eq!(done.succeeded, 1);
        assert!(done.journal_path.is_some());
        assert_eq!(fs::read_dir(logs.path()).unwrap().count(), 1);
    }
}
