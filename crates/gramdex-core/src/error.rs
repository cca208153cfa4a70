//! Error types for Gramdex core operations.
//!
//! This module defines well-structured error types using `thiserror` for
//! library-level errors, while higher-level code can use `anyhow` for
//! convenient error handling.
//!
//! Per-file problems (unreadable files, inspector vetoes) are not errors at
//! this level: they are logged and counted by the build, never returned.

use thiserror::Error;

/// Result type alias using IndexError
pub type Result<T> = std::result::Result<T, IndexError>;

/// Core error types for Gramdex operations.
#[derive(Error, Debug)]
pub enum IndexError {
    // === Configuration Errors ===
    /// N-gram arity must be at least one character
    #[error("invalid n-gram arity {n}: must be at least 1")]
    InvalidArity { n: usize },

    /// A build was requested while another one is still running
    #[error("a build is already in progress")]
    BuildInProgress,

    /// The builder hit an unexpected failure earlier and no longer accepts builds
    #[error("builder is in a failed state and accepts no further builds")]
    BuilderFailed,

    /// Configuration value or file is invalid
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    // === Query Errors ===
    /// Query pattern is empty
    #[error("query pattern is empty")]
    EmptyPattern,

    /// Query pattern is shorter than the index arity
    #[error("query pattern {pattern:?} has {len} characters, index needs at least {n}")]
    PatternTooShort { pattern: String, len: usize, n: usize },

    // === Build Errors ===
    /// Unexpected failure while building an index
    #[error("index build failed: {reason}")]
    BuildFailed { reason: String },

    // === I/O Errors ===
    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl IndexError {
    /// Returns true if this error stems from builder configuration or lifecycle misuse
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            IndexError::InvalidArity { .. }
                | IndexError::BuildInProgress
                | IndexError::BuilderFailed
                | IndexError::ConfigError { .. }
        )
    }

    /// Returns true if this error is a rejected query
    pub fn is_query_error(&self) -> bool {
        matches!(
            self,
            IndexError::EmptyPattern | IndexError::PatternTooShort { .. }
        )
    }

    /// Create a configuration error
    pub fn config(reason: impl Into<String>) -> Self {
        IndexError::ConfigError {
            reason: reason.into(),
        }
    }

    /// Create a build failure
    pub fn build_failed(reason: impl Into<String>) -> Self {
        IndexError::BuildFailed {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(IndexError::InvalidArity { n: 0 }.is_configuration_error());
        assert!(IndexError::BuildInProgress.is_configuration_error());
        assert!(!IndexError::BuildInProgress.is_query_error());

        let err = IndexError::PatternTooShort {
            pattern: "Wo".to_string(),
            len: 2,
            n: 3,
        };
        assert!(err.is_query_error());
        assert!(!err.is_configuration_error());

        assert!(!IndexError::build_failed("boom").is_query_error());
    }

    #[test]
    fn test_display() {
        let err = IndexError::PatternTooShort {
            pattern: "Wo".to_string(),
            len: 2,
            n: 3,
        };
        assert_eq!(
            err.to_string(),
            "query pattern \"Wo\" has 2 characters, index needs at least 3"
        );
    }
}
