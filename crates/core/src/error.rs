//! Error types for Quarry
//!
//! Each layer has its own error enum; all of them derive `thiserror::Error`.
//! - `ValidationError`: a `Query` that can never be executed
//! - `TransformError`: an injected transformer failed
//! - `EngineIoError`: the embedded engine or the filesystem failed
//! - `StateError`: lifecycle misuse of an indexer (never worth retrying)
//! - `IndexError` / `QueryError`: what the write and read paths return

use std::error::Error as StdError;
use thiserror::Error;

/// Boxed underlying cause
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Result type alias for the write path
pub type IndexResult<T> = std::result::Result<T, IndexError>;

/// Result type alias for the read path
pub type QueryResult<T> = std::result::Result<T, QueryError>;

// ============================================================================
// Leaf errors
// ============================================================================

/// A query that fails its structural invariants
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Query string was empty
    #[error("query string must not be empty")]
    EmptyQuery,

    /// Page size of zero
    #[error("rows must be greater than zero")]
    ZeroRows,

    /// Cursor pagination with an empty token
    #[error("cursor mark must not be empty")]
    EmptyCursorMark,

    /// Cursor pagination whose sort does not end on the unique key
    #[error("cursor pagination requires the last sort clause to be '{expected}', found '{found}'")]
    CursorRequiresUniqueSort {
        /// Unique key field the sort must end on
        expected: String,
        /// Field of the trailing sort clause
        found: String,
    },
}

/// An entity or document transformation failed
#[derive(Debug, Error)]
#[error("transform failed: {message}")]
pub struct TransformError {
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl TransformError {
    /// Create a transform error with a message only
    pub fn new(message: impl Into<String>) -> Self {
        TransformError {
            message: message.into(),
            source: None,
        }
    }

    /// Create a transform error wrapping an underlying cause
    pub fn with_source(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        TransformError {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Missing required field on a document
    pub fn missing_field(field: &str) -> Self {
        TransformError::new(format!("missing field '{}'", field))
    }
}

/// The embedded engine or the filesystem failed
#[derive(Debug, Error)]
#[error("engine error during {context}: {source}")]
pub struct EngineIoError {
    context: String,
    #[source]
    source: BoxError,
}

impl EngineIoError {
    /// Wrap an engine failure with the operation it happened in
    pub fn new(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        EngineIoError {
            context: context.into(),
            source: source.into(),
        }
    }

    /// Operation that failed
    pub fn context(&self) -> &str {
        &self.context
    }
}

/// Lifecycle misuse of an indexer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StateError {
    /// `open` called twice
    #[error("indexer is already open")]
    AlreadyOpen,

    /// Operation before `open`
    #[error("indexer is not open")]
    NotOpen,

    /// Operation after `close`
    #[error("indexer is closed")]
    Closed,

    /// `begin_transaction` while one is active
    #[error("a transaction is already in progress")]
    TransactionInProgress,

    /// Operation that needs an active transaction
    #[error("no transaction in progress")]
    NoTransaction,

    /// Mutation or commit after the transaction committed
    #[error("transaction already committed")]
    AlreadyCommitted,

    /// Mutation, commit or rollback after the transaction rolled back
    #[error("transaction already rolled back")]
    AlreadyRolledBack,

    /// `end_transaction` before commit or rollback
    #[error("transaction must be committed or rolled back before it ends")]
    NotFinished,

    /// A previous rollback failed after the writer was dropped
    #[error("index writer unavailable after a failed rollback")]
    WriterUnavailable,
}

// ============================================================================
// Layer errors
// ============================================================================

/// Errors returned by indexers
#[derive(Debug, Error)]
pub enum IndexError {
    /// Lifecycle misuse
    #[error(transparent)]
    State(#[from] StateError),

    /// Engine failure
    #[error(transparent)]
    Engine(#[from] EngineIoError),

    /// Entity could not be turned into a document
    #[error(transparent)]
    Transform(#[from] TransformError),

    /// Document names a field the schema does not declare
    #[error("unknown field '{0}'")]
    UnknownField(String),
}

/// Errors returned by the query and retrieval services
#[derive(Debug, Error)]
pub enum QueryError {
    /// Stored document could not be turned into a result
    #[error(transparent)]
    Transform(#[from] TransformError),

    /// Engine failure
    #[error(transparent)]
    Engine(#[from] EngineIoError),

    /// Query string could not be parsed
    #[error("query parse error: {message}")]
    Parse {
        /// Parser message
        message: String,
        /// Underlying parser error
        #[source]
        source: BoxError,
    },

    /// Cursor token could not be decoded or does not match the sort
    #[error("invalid cursor mark: {0}")]
    InvalidCursor(String),

    /// Sort, facet or highlight field unusable for that purpose
    #[error("invalid field '{field}': {reason}")]
    InvalidField {
        /// Offending field
        field: String,
        /// Why it cannot be used
        reason: String,
    },

    /// Query well-formed but not executable against this index
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Query failed validation
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Single-result lookup matched more than one document
    #[error("expected at most one result, found {count}")]
    MultipleResults {
        /// Number of matching documents
        count: usize,
    },
}

impl QueryError {
    /// Shorthand for an `InvalidField` error
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        QueryError::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use std::io;

    #[test]
    fn test_validation_display() {
        let err = ValidationError::CursorRequiresUniqueSort {
            expected: "id".to_string(),
            found: "create_date".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("'id'"));
        assert!(msg.contains("create_date"));
    }

    #[test]
    fn test_engine_error_keeps_source() {
        let err = EngineIoError::new(
            "commit",
            io::Error::new(io::ErrorKind::Other, "disk full"),
        );
        assert_eq!(err.context(), "commit");
        assert!(err.to_string().contains("disk full"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_transform_error_without_source() {
        let err = TransformError::missing_field("title");
        assert!(err.source().is_none());
        assert!(err.to_string().contains("title"));
    }

    #[test]
    fn test_index_error_from_state() {
        let err: IndexError = StateError::NotFinished.into();
        assert!(matches!(err, IndexError::State(StateError::NotFinished)));
        assert!(err.to_string().contains("committed or rolled back"));
    }

    #[test]
    fn test_query_error_from_validation() {
        let err: QueryError = ValidationError::ZeroRows.into();
        assert!(matches!(err, QueryError::Validation(ValidationError::ZeroRows)));
    }

    #[test]
    fn test_multiple_results_display() {
        let err = QueryError::MultipleResults { count: 3 };
        assert_eq!(err.to_string(), "expected at most one result, found 3");
    }
}
