//! Core types for restage.
//!
//! This crate provides the annotated media tree the operation engine works
//! on, the per-node metadata written by the naming pass, and configuration.

mod config;
mod error;
mod node;
mod tree;

pub use config::{
    default_config_dir, default_log_dir, Config, JournalConfig, JournalConfigBuilder,
    APP_DIR_NAME, DEFAULT_RETENTION_DAYS,
};
pub use error::{ConfigError, TreeError};
pub use node::{LinkMode, MediaType, Metadata, Node, NodeId, RenameStatus};
pub use tree::MediaTree;
