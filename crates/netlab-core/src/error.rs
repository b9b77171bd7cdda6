//! Core error types for netlab-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering the
//! allocation failures of the topology data model.

use thiserror::Error;

/// Core errors produced by the netlab-core crate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A name template references a placeholder that cannot be substituted.
    #[error("{{{placeholder}}} is not a valid replacement string in the node name")]
    InvalidPlaceholder { placeholder: String },

    /// A name template is structurally malformed (unbalanced braces, bad index).
    #[error("{template} is not a valid replacement string in the node name")]
    MalformedTemplate { template: String },

    /// Every candidate name within the search bound is taken.
    #[error("A node name could not be allocated (node limit reached?)")]
    NameSpaceExhausted,

    /// Every application id in the allowed range is in use.
    #[error("Cannot create a new node requiring an application id (limit of {max} nodes reached)")]
    ApplicationIdExhausted { max: u32 },
}
