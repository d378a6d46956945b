//! Error types for the log retrieval system.

use thiserror::Error;

use crate::ulid::Ulid;

/// Errors that can occur in the log retrieval system.
#[derive(Debug, Error)]
pub enum LogError {
    /// Malformed identifier or level: out-of-range fields, wrong length, invalid alphabet.
    #[error("validation error: {0}")]
    Validation(String),

    /// Unsupported or malformed query requested at the boundary.
    #[error("query error: {0}")]
    Query(String),

    /// A required field was not provided.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// A record with the given ID was not found.
    #[error("log record not found: {0}")]
    NotFound(Ulid),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A background scan task failed to complete.
    #[error("background task failed: {0}")]
    Task(String),
}

impl LogError {
    /// Creates a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Creates a query error.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }
}

/// Result type alias for log operations.
pub type Result<T> = std::result::Result<T, LogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let err = LogError::MissingField("timestamp");
        assert_eq!(err.to_string(), "missing required field: timestamp");

        let err = LogError::validation("ULID must be 26 characters");
        assert_eq!(err.to_string(), "validation error: ULID must be 26 characters");

        let err = LogError::query("unsupported search mode: vector");
        assert_eq!(err.to_string(), "query error: unsupported search mode: vector");

        let err = LogError::Task("join failed".to_string());
        assert_eq!(err.to_string(), "background task failed: join failed");
    }

    #[test]
    fn error_not_found_renders_ulid() {
        let id = Ulid::nil();
        let err = LogError::NotFound(id);
        assert_eq!(
            err.to_string(),
            "log record not found: 00000000000000000000000000"
        );
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<LogError>();
    }

    #[test]
    fn error_io_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: LogError = io_err.into();
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn error_serialization_conversion() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{not json");
        let err: LogError = match parse_err {
            Ok(_) => panic!("invalid JSON parsed"),
            Err(e) => e.into(),
        };
        assert!(matches!(err, LogError::Serialization(_)));
    }

    #[test]
    fn error_debug_format_all_variants() {
        let errors = vec![
            LogError::MissingField("test"),
            LogError::validation("test"),
            LogError::query("test"),
            LogError::NotFound(Ulid::nil()),
            LogError::Task("test".to_string()),
        ];

        for err in errors {
            let debug = format!("{err:?}");
            assert!(!debug.is_empty());
        }
    }
}
