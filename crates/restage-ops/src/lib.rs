//! Operation engine for restage.
//!
//! This crate turns an annotated [`MediaTree`](restage_core::MediaTree) into a
//! phased operation queue, executes it one step at a time through a
//! [`FileSystem`] capability, records every mutation in a per-session
//! [`Journal`], and can later reverse a recorded session with the
//! [`UndoEngine`].
//!
//! # Example
//!
//! ```rust,no_run
//! use restage_core::{JournalConfig, MediaTree, Metadata};
//! use restage_ops::{EngineOptions, Journal, Mode, OperationEngine, OsFileSystem};
//!
//! let mut tree = MediaTree::new("/media/tv");
//! tree.add_child_with(
//!     tree.root(),
//!     "show.s01e01.mkv",
//!     false,
//!     Metadata::default().with_new_name("Show - S01E01.mkv"),
//! );
//!
//! let mut journal = Journal::open(JournalConfig::default()).unwrap();
//! let mut engine = OperationEngine::new(
//!     &mut tree,
//!     &mut journal,
//!     OsFileSystem,
//!     EngineOptions::new(Mode::Rename),
//! );
//! let done = engine.run_to_completion();
//! println!("{}", done.summary());
//! ```

mod create;
mod delete;
mod error;
mod executor;
mod fs;
mod journal;
mod link;
mod operation;
mod progress;
mod queue;
mod rename;
mod undo;

pub use create::{ensure_dir, materialize_virtual_dir, ChildOutcome, MaterializeOutcome};
pub use delete::delete_node;
pub use error::{JournalError, OpError, UndoError};
pub use executor::{EngineOptions, OperationEngine, Step};
pub use fs::{FileSystem, OsFileSystem};
pub use journal::{
    session_file_timestamp, Journal, LogType, OperationLog, Session, SessionFile,
    SessionMetadata, SESSION_FILE_EXT, SESSION_FILE_PREFIX,
};
pub use link::link_node;
pub use operation::{Operation, OperationError, OperationKind};
pub use progress::{OperationComplete, OperationProgress};
pub use queue::{Mode, QueueBuilder};
pub use rename::{planned_destination, rename_node, validate_filename};
pub use undo::{UndoEngine, UndoReport};
