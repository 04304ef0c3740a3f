//! Progress reporting types for the operation engine.

use std::path::PathBuf;

use crate::operation::{OperationError, OperationKind};

/// Snapshot emitted after every engine step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationProgress {
    /// Kind of the operation that just ran.
    pub kind: Option<OperationKind>,
    /// Number of queue entries processed.
    pub completed: usize,
    /// Total number of queue entries.
    pub total: usize,
    /// Entries that succeeded so far.
    pub success_count: usize,
    /// Entries that failed so far.
    pub error_count: usize,
    /// The path the last operation acted on.
    pub current_file: Option<PathBuf>,
}

impl OperationProgress {
    /// Create a progress tracker for a queue of `total` entries.
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    /// Get the progress as a percentage (0.0 to 100.0).
    pub fn percentage(&self) -> f64 {
        if self.total > 0 {
            (self.completed as f64 / self.total as f64) * 100.0
        } else {
            100.0
        }
    }

    /// Whether every queue entry has been processed.
    pub fn is_finished(&self) -> bool {
        self.completed >= self.total
    }

    pub(crate) fn record(&mut self, kind: OperationKind, path: PathBuf, succeeded: bool) {
        self.kind = Some(kind);
        self.current_file = Some(path);
        self.completed += 1;
        if succeeded {
            self.success_count += 1;
        } else {
            self.error_count += 1;
        }
    }
}

/// Result of a finished run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationComplete {
    /// Number of queue entries that succeeded.
    pub succeeded: usize,
    /// Number of queue entries that failed.
    pub failed: usize,
    /// Errors that occurred, including failures of virtual directory children.
    pub errors: Vec<OperationError>,
    /// Where the session journal was written, if anything was recorded.
    pub journal_path: Option<PathBuf>,
    /// Why the journal could not be written. Mutations are not rolled back.
    pub journal_error: Option<String>,
}

impl OperationComplete {
    /// Total number of queue entries processed.
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }

    /// Check if the run was fully successful.
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.errors.is_empty()
    }

    /// Get a human-readable summary of the run.
    pub fn summary(&self) -> String {
        if self.failed == 0 {
            format!("Completed {} operations", self.succeeded)
        } else {
            format!(
                "Completed {} operations, {} failed",
                self.succeeded, self.failed
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage() {
        let mut progress = OperationProgress::new(4);
        assert_eq!(progress.percentage(), 0.0);

        progress.record(OperationKind::Rename, PathBuf::from("/a"), true);
        assert_eq!(progress.percentage(), 25.0);
        assert_eq!(progress.success_count, 1);

        progress.record(OperationKind::Delete, PathBuf::from("/b"), false);
        assert_eq!(progress.error_count, 1);
        assert_eq!(progress.current_file, Some(PathBuf::from("/b")));
    }

    #[test]
    fn test_summary() {
        let done = OperationComplete {
            succeeded: 3,
            failed: 1,
            ..Default::default()
        };
        assert_eq!(done.summary(), "Completed 3 operations, 1 failed");
        assert_eq!(done.total(), 4);
        assert!(!done.is_success());
    }
}
