//! Reverses a recorded session by applying compensating actions.

use std::path::Path;

use crate::error::UndoError;
use crate::fs::{FileSystem, OsFileSystem};
use crate::journal::{LogType, OperationLog, Session};

/// Outcome of undoing a session.
#[derive(Debug, Default)]
pub struct UndoReport {
    /// Entries successfully compensated.
    pub success_count: usize,
    /// Entries whose compensation failed.
    pub fail_count: usize,
    /// One error per failed entry, in the order they were attempted.
    pub errors: Vec<UndoError>,
}

impl UndoReport {
    /// Whether every attempted compensation succeeded.
    pub fn is_success(&self) -> bool {
        self.fail_count == 0
    }

    /// Get a human-readable summary.
    pub fn summary(&self) -> String {
        if self.fail_count == 0 {
            format!("Undid {} operations", self.success_count)
        } else {
            format!(
                "Undid {} operations, {} failed",
                self.success_count, self.fail_count
            )
        }
    }
}

/// Applies per-type compensations for journal entries.
#[derive(Debug, Default)]
pub struct UndoEngine<F: FileSystem = OsFileSystem> {
    fs: F,
}

impl<F: FileSystem> UndoEngine<F> {
    /// Create an undo engine over `fs`.
    pub fn new(fs: F) -> Self {
        Self { fs }
    }

    /// Entries of `session` that will be compensated, newest first.
    /// Entries that originally failed are left out.
    pub fn plan(session: &Session) -> impl Iterator<Item = &OperationLog> {
        session.operations.iter().rev().filter(|entry| entry.success)
    }

    /// Undo every successful entry of `session` in reverse order.
    ///
    /// A failing entry does not stop the remaining ones.
    pub fn undo_session(&self, session: &Session) -> UndoReport {
        let mut report = UndoReport::default();
        for entry in Self::plan(session) {
            match self.undo_entry(entry) {
                Ok(()) => report.success_count += 1,
                Err(e) => {
                    tracing::warn!(id = entry.id, kind = %entry.kind, error = %e, "undo failed");
                    report.fail_count += 1;
                    report.errors.push(e);
                }
            }
        }
        tracing::info!(
            session = session.id(),
            undone = report.success_count,
            failed = report.fail_count,
            "undo finished"
        );
        report
    }

    /// Apply the compensation for one entry.
    pub fn undo_entry(&self, entry: &OperationLog) -> Result<(), UndoError> {
        match entry.kind {
            LogType::Rename => self.undo_rename(entry),
            LogType::Link => self.undo_link(entry),
            LogType::CreateDir => self.undo_create_dir(entry),
            LogType::Delete => Err(UndoError::Irreversible {
                path: entry.source_path.clone(),
            }),
            LogType::Unknown => Err(UndoError::UnknownType { id: entry.id }),
        }
    }

    fn undo_rename(&self, entry: &OperationLog) -> Result<(), UndoError> {
        let source = required(&entry.source_path, entry.id, "source_path")?;
        let dest = entry.dest_path.as_deref().ok_or(UndoError::MissingPath {
            id: entry.id,
            field: "dest_path",
        })?;

        if !self.fs.exists(dest) {
            return Err(UndoError::Missing {
                path: dest.to_path_buf(),
            });
        }
        if self.fs.exists(source) {
            return Err(UndoError::Occupied {
                path: source.to_path_buf(),
            });
        }
        self.fs
            .rename(dest, source)
            .map_err(|e| UndoError::io(dest, e))?;
        tracing::debug!(from = %dest.display(), to = %source.display(), "rename undone");
        Ok(())
    }

    fn undo_link(&self, entry: &OperationLog) -> Result<(), UndoError> {
        let dest = entry.dest_path.as_deref().ok_or(UndoError::MissingPath {
            id: entry.id,
            field: "dest_path",
        })?;

        if !self.fs.exists(dest) {
            return Ok(());
        }
        if self.fs.is_symlink(dest) {
            let actual = self.fs.read_link(dest).map_err(|e| UndoError::io(dest, e))?;
            if actual != entry.source_path {
                return Err(UndoError::LinkMismatch {
                    link: dest.to_path_buf(),
                    actual,
                    expected: entry.source_path.clone(),
                });
            }
        }
        self.fs
            .remove_file(dest)
            .map_err(|e| UndoError::io(dest, e))?;
        tracing::debug!(link = %dest.display(), "link removed");
        Ok(())
    }

    fn undo_create_dir(&self, entry: &OperationLog) -> Result<(), UndoError> {
        // Older journals may carry the directory under dest_path only.
        let dir = if !entry.source_path.as_os_str().is_empty() {
            entry.source_path.as_path()
        } else {
            entry
                .dest_path
                .as_deref()
                .filter(|p| !p.as_os_str().is_empty())
                .ok_or(UndoError::MissingPath {
                    id: entry.id,
                    field: "source_path",
                })?
        };

        if !self.fs.exists(dir) {
            return Ok(());
        }
        if !self.fs.is_dir(dir) {
            return Err(UndoError::NotADirectory {
                path: dir.to_path_buf(),
            });
        }
        if !self.fs.is_dir_empty(dir).map_err(|e| UndoError::io(dir, e))? {
            return Err(UndoError::NotEmpty {
                path: dir.to_path_buf(),
            });
        }
        self.fs.remove_dir(dir).map_err(|e| UndoError::io(dir, e))?;
        tracing::debug!(path = %dir.display(), "directory removed");
        Ok(())
    }
}

fn required<'a>(path: &'a Path, id: u64, field: &'static str) -> Result<&'a Path, UndoError> {
    if path.as_os_str().is_empty() {
        return Err(UndoError::MissingPath { id, field });
    }
    Ok(path)
}
