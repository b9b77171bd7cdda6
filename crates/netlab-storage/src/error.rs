//! Storage error types for netlab-storage.
//!
//! [`StorageError`] covers all anticipated failure modes in the storage layer:
//! filesystem I/O, serialization, document validation, and archive handling.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The file parsed but is not a usable topology document.
    #[error("invalid topology {path}: {reason}")]
    InvalidDocument { path: PathBuf, reason: String },

    /// The document was written by a newer release.
    #[error("topology revision {revision} is newer than the supported revision {supported}")]
    UnsupportedRevision { revision: u32, supported: u32 },

    /// A snapshot name cannot be turned into a file name.
    #[error("invalid snapshot name: '{name}'")]
    InvalidSnapshotName { name: String },

    /// A project archive is malformed.
    #[error("invalid project archive: {reason}")]
    Archive { reason: String },
}
