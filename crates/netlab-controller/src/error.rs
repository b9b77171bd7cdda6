//! Controller error types and their mapping onto a transport status.
//!
//! [`ControllerError`] is the unified failure type of every project operation.
//! It carries a kind and a human-readable message; a transport layer turns it
//! into a response with [`ControllerError::status_code`] and
//! [`ControllerError::detail`].

use serde::Serialize;

use netlab_core::CoreError;
use netlab_storage::StorageError;

use crate::compute::ComputeError;

/// Structured error detail, as a transport layer would render it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "CONFLICT").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// Failures of controller operations.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// Unknown project, node, link, drawing, snapshot, compute or appliance (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Duplicate names, running nodes, refused duplication, removal failures (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Disallowed path or operation on a closed project (403).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Malformed request input, e.g. an invalid UUID (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Directory creation or document write failure (500).
    #[error("internal error: {0}")]
    InternalError(String),

    /// A compute backend call failed (502).
    #[error("compute error: {0}")]
    Backend(#[from] ComputeError),
}

impl ControllerError {
    /// Machine-readable error code.
    pub fn kind(&self) -> &'static str {
        match self {
            ControllerError::NotFound(_) => "NOT_FOUND",
            ControllerError::Conflict(_) => "CONFLICT",
            ControllerError::Forbidden(_) => "FORBIDDEN",
            ControllerError::BadRequest(_) => "BAD_REQUEST",
            ControllerError::InternalError(_) => "INTERNAL_ERROR",
            ControllerError::Backend(_) => "BACKEND_ERROR",
        }
    }

    /// HTTP status a transport layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            ControllerError::NotFound(_) => 404,
            ControllerError::Conflict(_) => 409,
            ControllerError::Forbidden(_) => 403,
            ControllerError::BadRequest(_) => 400,
            ControllerError::InternalError(_) => 500,
            ControllerError::Backend(_) => 502,
        }
    }

    /// Message without the kind prefix.
    pub fn message(&self) -> String {
        match self {
            ControllerError::NotFound(msg)
            | ControllerError::Conflict(msg)
            | ControllerError::Forbidden(msg)
            | ControllerError::BadRequest(msg)
            | ControllerError::InternalError(msg) => msg.clone(),
            ControllerError::Backend(err) => err.to_string(),
        }
    }

    pub fn detail(&self) -> ErrorDetail {
        ErrorDetail {
            code: self.kind().to_string(),
            message: self.message(),
        }
    }

    /// Backend failures become conflicts; everything else is kept.
    pub(crate) fn backend_as_conflict(self) -> Self {
        match self {
            ControllerError::Backend(err) => ControllerError::Conflict(err.to_string()),
            other => other,
        }
    }
}

impl From<CoreError> for ControllerError {
    fn from(err: CoreError) -> Self {
        ControllerError::Conflict(err.to_string())
    }
}

impl From<StorageError> for ControllerError {
    fn from(err: StorageError) -> Self {
        match &err {
            StorageError::InvalidDocument { .. }
            | StorageError::UnsupportedRevision { .. }
            | StorageError::Serialization(_)
            | StorageError::Archive { .. } => {
                ControllerError::Conflict(format!("Could not load topology: {}", err))
            }
            StorageError::InvalidSnapshotName { .. } => ControllerError::BadRequest(err.to_string()),
            StorageError::Io(_) => ControllerError::InternalError(err.to_string()),
        }
    }
}
