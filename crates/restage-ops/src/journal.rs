//! Session journal: one JSON file per run, recording every mutation attempt.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use restage_core::JournalConfig;
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::error::{JournalError, OpError};

/// Prefix of every session file name.
pub const SESSION_FILE_PREFIX: &str = "session_";

/// Extension of every session file.
pub const SESSION_FILE_EXT: &str = "json";

/// Timestamp layout embedded in session ids and file names (UTC).
const STAMP_FORMAT: &str = "%Y%m%d_%H%M%S_%3f";

/// Second-resolution prefix of [`STAMP_FORMAT`], used when reading names back.
const STAMP_PREFIX_FORMAT: &str = "%Y%m%d_%H%M%S";
const STAMP_PREFIX_LEN: usize = 15;

/// Kind of a recorded mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LogType {
    Rename,
    Link,
    Delete,
    CreateDir,
    /// A type written by another version. Undo refuses these.
    #[serde(other)]
    Unknown,
}

/// One recorded mutation attempt. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationLog {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: LogType,
    /// For `create_dir` this is the created directory.
    #[serde(default)]
    pub source_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dest_path: Option<PathBuf>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Provenance and totals of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub command_args: Vec<String>,
    pub working_dir: PathBuf,
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub total_operations: usize,
    pub successful_operations: usize,
    pub failed_operations: usize,
}

/// A full session record as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub metadata: SessionMetadata,
    #[serde(default)]
    pub operations: Vec<OperationLog>,
}

impl Session {
    /// Start an empty session stamped `timestamp`.
    pub fn new(command_args: Vec<String>, working_dir: PathBuf, timestamp: DateTime<Utc>) -> Self {
        Self {
            metadata: SessionMetadata {
                command_args,
                working_dir,
                timestamp,
                session_id: timestamp.format(STAMP_FORMAT).to_string(),
                total_operations: 0,
                successful_operations: 0,
                failed_operations: 0,
            },
            operations: Vec::new(),
        }
    }

    /// Session id.
    pub fn id(&self) -> &str {
        &self.metadata.session_id
    }

    /// Recompute the totals from the operation list.
    pub fn update_totals(&mut self) {
        let successful = self.operations.iter().filter(|op| op.success).count();
        self.metadata.total_operations = self.operations.len();
        self.metadata.successful_operations = successful;
        self.metadata.failed_operations = self.operations.len() - successful;
    }

    /// Serialize as 2-space indented JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse a session from JSON.
    pub fn from_json(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }

    /// File name this session is stored under.
    pub fn file_name(&self) -> String {
        format!(
            "{SESSION_FILE_PREFIX}{}.{SESSION_FILE_EXT}",
            self.metadata.session_id
        )
    }
}

/// A session loaded from the log directory.
#[derive(Debug, Clone)]
pub struct SessionFile {
    pub path: PathBuf,
    pub session: Session,
}

/// Session manager: holds the running session and reads/writes the log
/// directory.
///
/// The journal is an explicit object handed to the engine by reference; there
/// is no process-wide "current session".
#[derive(Debug)]
pub struct Journal {
    config: JournalConfig,
    active: Option<Session>,
    next_id: u64,
}

impl Journal {
    /// Create a journal without touching the filesystem.
    pub fn new(config: JournalConfig) -> Self {
        Self {
            config,
            active: None,
            next_id: 0,
        }
    }

    /// Create the log directory and apply retention if enabled.
    ///
    /// A failing cleanup is logged and does not prevent opening.
    pub fn open(config: JournalConfig) -> Result<Self, JournalError> {
        fs::create_dir_all(&config.log_dir).map_err(|source| JournalError::Io {
            path: config.log_dir.clone(),
            source,
        })?;
        let journal = Self::new(config);
        if journal.config.retention_enabled {
            match journal.cleanup_older_than(journal.config.retention_days) {
                Ok(0) => {}
                Ok(removed) => tracing::info!(removed, "pruned old session journals"),
                Err(e) => tracing::warn!(error = %e, "journal retention cleanup failed"),
            }
        }
        Ok(journal)
    }

    /// The configuration this journal was created with.
    pub fn config(&self) -> &JournalConfig {
        &self.config
    }

    /// Directory holding the session files.
    pub fn log_dir(&self) -> &Path {
        &self.config.log_dir
    }

    /// Whether a session is running.
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// The running session, if any.
    pub fn active_session(&self) -> Option<&Session> {
        self.active.as_ref()
    }

    /// Start a session for `command` invoked with `args`.
    ///
    /// If a session is already running it is kept and its id returned.
    pub fn start_session(&mut self, command: &str, args: &[String]) -> String {
        if let Some(session) = &self.active {
            tracing::warn!(session = session.id(), "session already active");
            return session.id().to_string();
        }
        let mut command_args = Vec::with_capacity(args.len() + 1);
        command_args.push(command.to_string());
        command_args.extend(args.iter().cloned());
        let working_dir = std::env::current_dir().unwrap_or_default();

        let session = Session::new(command_args, working_dir, Utc::now());
        let id = session.id().to_string();
        tracing::debug!(session = %id, "journal session started");
        self.active = Some(session);
        self.next_id = 0;
        id
    }

    /// Append an attempted mutation to the running session.
    pub fn record(
        &mut self,
        kind: LogType,
        source: &Path,
        dest: Option<&Path>,
        error: Option<&OpError>,
    ) -> Result<u64, JournalError> {
        let session = self.active.as_mut().ok_or(JournalError::NoActiveSession)?;
        let id = self.next_id;
        self.next_id += 1;
        session.operations.push(OperationLog {
            id,
            timestamp: Utc::now(),
            kind,
            source_path: source.to_path_buf(),
            dest_path: dest.map(Path::to_path_buf),
            success: error.is_none(),
            error: error.map(ToString::to_string),
        });
        Ok(id)
    }

    /// Finalize the running session and write it to the log directory.
    ///
    /// Returns the written path, or `None` if no session was running or it
    /// recorded nothing.
    pub fn finish_session(&mut self) -> Result<Option<PathBuf>, JournalError> {
        let Some(mut session) = self.active.take() else {
            return Ok(None);
        };
        session.update_totals();
        if session.operations.is_empty() {
            tracing::debug!(session = session.id(), "empty session, not persisted");
            return Ok(None);
        }
        let path = self.write_session(&session)?;
        tracing::info!(
            path = %path.display(),
            total = session.metadata.total_operations,
            failed = session.metadata.failed_operations,
            "journal session saved"
        );
        Ok(Some(path))
    }

    fn write_session(&self, session: &Session) -> Result<PathBuf, JournalError> {
        let dir = self.log_dir();
        fs::create_dir_all(dir).map_err(|source| JournalError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut path = dir.join(session.file_name());
        let mut attempt = 1;
        while path.exists() {
            path = dir.join(format!(
                "{SESSION_FILE_PREFIX}{}_{attempt:03}.{SESSION_FILE_EXT}",
                session.id()
            ));
            attempt += 1;
        }

        let data = session.to_json().map_err(|source| JournalError::Format {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, data).map_err(|source| JournalError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    /// Read a session file.
    pub fn load_session(path: &Path) -> Result<Session, JournalError> {
        let data = fs::read_to_string(path).map_err(|source| JournalError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Session::from_json(&data).map_err(|source| JournalError::Format {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Session file paths, most recent first.
    pub fn session_paths(&self) -> Result<Vec<PathBuf>, JournalError> {
        let dir = self.log_dir();
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(JournalError::Io {
                    path: dir.to_path_buf(),
                    source,
                });
            }
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| is_session_file(path))
            .collect();
        paths.sort_by(|a, b| b.file_name().cmp(&a.file_name()));
        Ok(paths)
    }

    /// All readable sessions, most recent first. Corrupt files are skipped.
    pub fn list_sessions(&self) -> Result<Vec<SessionFile>, JournalError> {
        let sessions = self
            .session_paths()?
            .into_iter()
            .filter_map(|path| match Self::load_session(&path) {
                Ok(session) => Some(SessionFile { path, session }),
                Err(e) => {
                    tracing::debug!(error = %e, "skipping unreadable session file");
                    None
                }
            })
            .collect();
        Ok(sessions)
    }

    /// The most recent readable session.
    pub fn latest_session(&self) -> Result<Option<SessionFile>, JournalError> {
        Ok(self.list_sessions()?.into_iter().next())
    }

    /// The session with the given id.
    pub fn find_session(&self, id: &str) -> Result<SessionFile, JournalError> {
        self.list_sessions()?
            .into_iter()
            .find(|file| file.session.id() == id)
            .ok_or_else(|| JournalError::SessionNotFound { id: id.to_string() })
    }

    /// Remove session files older than `days` days. Returns how many were removed.
    ///
    /// A period reaching past the earliest representable date removes nothing.
    pub fn cleanup_older_than(&self, days: u32) -> Result<usize, JournalError> {
        let cutoff = TimeDelta::try_days(i64::from(days))
            .and_then(|age| Utc::now().checked_sub_signed(age));
        match cutoff {
            Some(cutoff) => self.cleanup_before(cutoff),
            None => Ok(0),
        }
    }

    /// Remove session files whose embedded timestamp is before `cutoff`.
    ///
    /// Files whose name carries no parseable timestamp are left alone.
    pub fn cleanup_before(&self, cutoff: DateTime<Utc>) -> Result<usize, JournalError> {
        let mut removed = 0;
        for path in self.session_paths()? {
            let Some(stamp) = session_file_timestamp(&path) else {
                continue;
            };
            if stamp >= cutoff {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "cannot remove old session journal"
                ),
            }
        }
        Ok(removed)
    }
}

fn is_session_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name.starts_with(SESSION_FILE_PREFIX)
        && path.extension().and_then(|e| e.to_str()) == Some(SESSION_FILE_EXT)
        && path.is_file()
}

/// Timestamp embedded in a session file name, to the second.
pub fn session_file_timestamp(path: &Path) -> Option<DateTime<Utc>> {
    let name = path.file_name()?.to_str()?;
    let stamp = name.strip_prefix(SESSION_FILE_PREFIX)?.get(..STAMP_PREFIX_LEN)?;
    NaiveDateTime::parse_from_str(stamp, STAMP_PREFIX_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn journal(dir: &Path) -> Journal {
        Journal::new(JournalConfig::new(dir).without_retention())
    }

    #[test]
    fn test_record_requires_session() {
        let dir = TempDir::new().unwrap();
        let mut journal = journal(dir.path());
        let result = journal.record(LogType::Rename, Path::new("/a"), None, None);
        assert!(matches!(result, Err(JournalError::NoActiveSession)));
    }

    #[test]
    fn test_finish_writes_totals() {
        let dir = TempDir::new().unwrap();
        let mut journal = journal(dir.path());
        journal.start_session("restage", &["apply".to_string()]);

        let err = OpError::Collision {
            path: PathBuf::from("/b"),
        };
        journal
            .record(LogType::Rename, Path::new("/a"), Some(Path::new("/b")), Some(&err))
            .unwrap();
        journal
            .record(LogType::Delete, Path::new("/c"), None, None)
            .unwrap();

        let path = journal.finish_session().unwrap().unwrap();
        assert!(!journal.is_active());

        let session = Journal::load_session(&path).unwrap();
        assert_eq!(session.metadata.command_args, vec!["restage", "apply"]);
        assert_eq!(session.metadata.total_operations, 2);
        assert_eq!(session.metadata.successful_operations, 1);
        assert_eq!(session.metadata.failed_operations, 1);
        assert_eq!(session.operations[0].id, 0);
        assert_eq!(session.operations[1].id, 1);
        assert!(session.operations[0].error.as_ref().unwrap().contains("/b"));
    }

    #[test]
    fn test_empty_session_not_persisted() {
        let dir = TempDir::new().unwrap();
        let mut journal = journal(dir.path());
        journal.start_session("restage", &[]);
        assert!(journal.finish_session().unwrap().is_none());
        assert!(journal.session_paths().unwrap().is_empty());
    }

    #[test]
    fn test_json_layout() {
        let mut session = Session::new(vec!["restage".into()], PathBuf::from("/w"), Utc::now());
        session.operations.push(OperationLog {
            id: 0,
            timestamp: Utc::now(),
            kind: LogType::CreateDir,
            source_path: PathBuf::from("/w/Show"),
            dest_path: None,
            success: true,
            error: None,
        });
        let json = session.to_json().unwrap();
        assert!(json.contains("\n  \"metadata\""));
        assert!(json.contains("\"type\": \"create_dir\""));
        assert!(!json.contains("dest_path"));
    }

    #[test]
    fn test_unknown_type_parses() {
        let json = r#"{
          "id": 4,
          "timestamp": "2024-05-01T10:00:00Z",
          "type": "chmod",
          "source_path": "/a",
          "success": true
        }"#;
        let entry: OperationLog = serde_json::from_str(json).unwrap();
        assert_eq!(entry.kind, LogType::Unknown);
    }

    #[test]
    fn test_cleanup_with_huge_period_keeps_everything() {
        let dir = TempDir::new().unwrap();
        let old = dir.path().join("session_20000101_000000_000.json");
        fs::write(&old, "{}").unwrap();

        let journal = journal(dir.path());
        assert_eq!(journal.cleanup_older_than(u32::MAX).unwrap(), 0);
        assert!(old.exists());

        let config = JournalConfig::new(dir.path()).with_retention_days(u32::MAX);
        Journal::open(config).unwrap();
        assert!(old.exists());
    }

    #[test]
    fn test_same_stamp_sessions_stay_newest_first() {
        let dir = TempDir::new().unwrap();
        let journal = journal(dir.path());
        let mut session = Session::new(vec!["restage".into()], PathBuf::from("/w"), Utc::now());
        session.operations.push(OperationLog {
            id: 0,
            timestamp: Utc::now(),
            kind: LogType::Delete,
            source_path: PathBuf::from("/w/a"),
            dest_path: None,
            success: true,
            error: None,
        });

        let written: Vec<PathBuf> = (0..12)
            .map(|_| journal.write_session(&session).unwrap())
            .collect();
        let listed = journal.session_paths().unwrap();

        let expected: Vec<PathBuf> = written.into_iter().rev().collect();
        assert_eq!(listed, expected);
        assert!(listed[0].to_string_lossy().ends_with("_011.json"));
    }

    #[test]
    fn test_corrupt_session_files_are_skipped() {
        let dir = TempDir::new().unwrap();
        let mut journal = journal(dir.path());
        journal.start_session("restage", &[]);
        journal
            .record(LogType::Delete, Path::new("/a"), None, None)
            .unwrap();
        let valid = journal.finish_session().unwrap().unwrap();
        let id = Journal::load_session(&valid).unwrap().id().to_string();

        // Sorts ahead of the valid file.
        fs::write(dir.path().join("session_99991231_235959_999.json"), "{ not json").unwrap();
        fs::write(dir.path().join("session_99991231_235959_998.json"), "").unwrap();

        let sessions = journal.list_sessions().unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].path, valid);
        assert_eq!(journal.latest_session().unwrap().unwrap().path, valid);
        assert_eq!(journal.find_session(&id).unwrap().path, valid);
    }

    #[test]
    fn test_file_timestamp() {
        let path = Path::new("/logs/session_20240501_101500_123.json");
        let stamp = session_file_timestamp(path).unwrap();
        assert_eq!(stamp.to_rfc3339(), "2024-05-01T10:15:00+00:00");
        assert!(session_file_timestamp(Path::new("/logs/other.json")).is_none());
    }
}
