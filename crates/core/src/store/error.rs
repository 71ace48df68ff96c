//! Error types for the store module.

use std::path::PathBuf;
use thiserror::Error;

use super::rename::FileMove;

/// Errors from a transactional rename.
#[derive(Debug, Error)]
pub enum RenameError {
    /// A source file does not exist.
    #[error("Rename source not found: {path}")]
    SourceMissing { path: PathBuf },

    /// A destination already exists.
    #[error("Rename destination already exists: {path}")]
    DestinationExists { path: PathBuf },

    /// Two moves target the same destination.
    #[error("Duplicate rename destination: {path}")]
    DuplicateDestination { path: PathBuf },

    /// A move failed; every completed move was undone.
    #[error("Failed to move {from} to {to} ({rolled_back} moves rolled back)")]
    MoveFailed {
        from: PathBuf,
        to: PathBuf,
        rolled_back: usize,
        #[source]
        source: std::io::Error,
    },

    /// A move failed and undoing it failed too.
    #[error("Rename failed ({cause}) and rollback left {} paths needing repair", .needs_repair.len())]
    RollbackFailed {
        cause: String,
        needs_repair: Vec<FileMove>,
    },
}

/// Errors from a record store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record not found: {name}")]
    NotFound { name: String },

    #[error("Record already exists: {name}")]
    AlreadyExists { name: String },

    /// Names must be plain file stems.
    #[error("Invalid record name: {name}")]
    InvalidName { name: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to (de)serialize record {name}: {reason}")]
    Serialization { name: String, reason: String },

    #[error(transparent)]
    Rename(#[from] RenameError),
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
