//! Error types for the engine.

use thiserror::Error;
use unlatch_dom::DomError;

/// Errors that can occur in the engine.
///
/// None of these is allowed to reach the page: storage errors degrade to
/// "allow", host list errors to an empty list, and activation errors to a
/// fallback path.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Key-value store read or write failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Remote host list could not be fetched.
    #[error("Host list error: {0}")]
    HostList(String),

    /// Page query or mutation failed.
    #[error("Document error: {0}")]
    Dom(#[from] DomError),

    /// The scheduler task is gone.
    #[error("Channel closed")]
    ChannelClosed,

    /// Host pattern could not be compiled.
    #[error("Invalid host pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;
    use unlatch_dom::NodeId;

    #[test]
    fn test_storage_error_display() {
        let err = EngineError::Storage("disk full".to_string());
        assert_eq!(err.to_string(), "Storage error: disk full");
    }

    #[test]
    fn test_invalid_pattern_display() {
        let err = EngineError::InvalidPattern {
            pattern: "a*b*".to_string(),
            message: "more than one wildcard".to_string(),
        };
        assert!(err.to_string().contains("a*b*"));
        assert!(err.to_string().contains("more than one wildcard"));
    }

    #[test]
    fn test_from_dom_error() {
        let err: EngineError = DomError::Detached(NodeId(4)).into();
        assert!(matches!(err, EngineError::Dom(_)));
        assert!(err.to_string().contains("#4"));
    }

    #[test]
    fn test_from_serde_error() {
        let json_err = serde_json::from_str::<Vec<i64>>("not json").unwrap_err();
        let err: EngineError = json_err.into();
        assert!(matches!(err, EngineError::Serialization(_)));
    }
}
