//! Error types for Hornmine Core

use thiserror::Error;

/// Result type alias using Hornmine's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Hornmine error types
///
/// Deadline expiry is not represented here: it produces a partial
/// [`Bounded`](crate::Bounded) value instead.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Unknown predicate: no subject/object types for {0}")]
    UnknownPredicate(String),

    #[error("Query execution failed: {0}")]
    QueryExecution(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Malformed cached example at line {line}: {reason}")]
    CacheFormat { line: usize, reason: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid rule syntax: {0}")]
    RuleSyntax(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the error is a cached-example format problem that callers
    /// recover from by regenerating the examples.
    pub fn is_cache_format(&self) -> bool {
        matches!(self, Self::CacheFormat { .. })
    }
}

impl From<crate::limits::ValidationError> for Error {
    fn from(err: crate::limits::ValidationError) -> Self {
        match err {
            crate::limits::ValidationError::RuleLengthOutOfRange { .. }
            | crate::limits::ValidationError::ZeroLimit { .. } => {
                Self::InvalidConfiguration(err.to_string())
            }
            _ => Self::Validation(err.to_string()),
        }
    }
}
