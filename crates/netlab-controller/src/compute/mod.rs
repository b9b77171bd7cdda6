//! Compute backends: the remote endpoints that actually run nodes.
//!
//! The controller only needs two verbs from a backend, `post` and `delete`,
//! keyed by an API path. [`Compute`] is the seam; [`HttpCompute`] is the
//! production implementation and tests plug in their own.

pub mod http;

pub use http::HttpCompute;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use netlab_core::{ComputeId, ComputeSpec};

/// Timeout policy of a single backend request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Timeout {
    /// The backend's configured default.
    #[default]
    Default,
    /// Wait as long as the backend needs (data duplication).
    Never,
    After(Duration),
}

/// Errors from backend calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ComputeError {
    #[error("Cannot connect to compute '{compute_id}': {reason}")]
    Unreachable { compute_id: String, reason: String },

    #[error("Timeout when talking to compute '{compute_id}'")]
    Timeout { compute_id: String },

    #[error("Compute '{compute_id}' answered {status}: {message}")]
    Http {
        compute_id: String,
        status: u16,
        message: String,
    },

    #[error("Invalid answer from compute '{compute_id}': {reason}")]
    InvalidResponse { compute_id: String, reason: String },
}

impl ComputeError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ComputeError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    pub fn is_conflict(&self) -> bool {
        self.status() == Some(409)
    }
}

/// A remote execution backend.
#[async_trait]
pub trait Compute: Send + Sync {
    fn id(&self) -> &ComputeId;

    /// Connection record stored in topology documents.
    fn spec(&self) -> ComputeSpec;

    async fn post(&self, path: &str, body: Value, timeout: Timeout) -> Result<Value, ComputeError>;

    async fn delete(&self, path: &str) -> Result<(), ComputeError>;
}

impl std::fmt::Debug for dyn Compute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Compute({})", self.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_classification() {
        let not_found = ComputeError::Http {
            compute_id: "local".into(),
            status: 404,
            message: "no such node".into(),
        };
        assert!(not_found.is_not_found());
        assert!(!not_found.is_conflict());

        let timeout = ComputeError::Timeout {
            compute_id: "local".into(),
        };
        assert_eq!(timeout.status(), None);
        assert!(!timeout.is_not_found());
    }
}
