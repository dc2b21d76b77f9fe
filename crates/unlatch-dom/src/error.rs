//! Document errors.

use thiserror::Error;

use crate::dom_types::NodeId;

/// Errors raised by page queries and mutations.
#[derive(Debug, Error)]
pub enum DomError {
    /// No element with this identity was ever created.
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// The element exists but was removed from the tree.
    #[error("Node {0} is detached from the document")]
    Detached(NodeId),

    /// Native activation threw.
    #[error("Activation of {node} failed: {reason}")]
    ActivationFailed { node: NodeId, reason: String },

    /// Native form submission threw.
    #[error("Submission of {node} failed: {reason}")]
    SubmissionFailed { node: NodeId, reason: String },

    /// Selector text could not be parsed.
    #[error("Invalid selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },

    /// Snapshot could not be loaded.
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for document operations.
pub type DomResult<T> = Result<T, DomError>;
