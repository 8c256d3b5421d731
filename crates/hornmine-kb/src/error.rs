//! Knowledge base error types

use thiserror::Error;

/// Result type alias for knowledge base operations
pub type KbResult<T> = std::result::Result<T, KbError>;

/// Knowledge base error types.
///
/// Every failure to answer a query is an error; "nothing matched" is an
/// empty result, never one of these.
#[derive(Error, Debug)]
pub enum KbError {
    #[error("Query error: {0}")]
    Query(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Parse error at line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("Malformed cached example at line {line}: {reason}")]
    CacheFormat { line: usize, reason: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "redb")]
    #[error("ReDB error: {0}")]
    Redb(#[from] ::redb::Error),

    #[cfg(feature = "redb")]
    #[error("ReDB database error: {0}")]
    RedbDatabase(#[from] ::redb::DatabaseError),

    #[cfg(feature = "redb")]
    #[error("ReDB table error: {0}")]
    RedbTable(#[from] ::redb::TableError),

    #[cfg(feature = "redb")]
    #[error("ReDB storage error: {0}")]
    RedbStorage(#[from] ::redb::StorageError),

    #[cfg(feature = "redb")]
    #[error("ReDB commit error: {0}")]
    RedbCommit(#[from] ::redb::CommitError),

    #[cfg(feature = "redb")]
    #[error("ReDB transaction error: {0}")]
    RedbTransaction(#[from] ::redb::TransactionError),
}

impl From<hornmine_core::limits::ValidationError> for KbError {
    fn from(err: hornmine_core::limits::ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<KbError> for hornmine_core::Error {
    fn from(err: KbError) -> Self {
        match err {
            KbError::CacheFormat { line, reason } => Self::CacheFormat { line, reason },
            KbError::Validation(msg) => Self::Validation(msg),
            KbError::Parse { line, reason } => {
                Self::Validation(format!("line {}: {}", line, reason))
            }
            KbError::Io(e) => Self::Io(e),
            other => Self::QueryExecution(other.to_string()),
        }
    }
}
