//! Index-write error types.
//!
//! This module defines the unified error type for all index-write operations,
//! including both low-level backend errors and request validation errors.

use thiserror::Error;

/// Unified errors from index-write operations.
///
/// Used by the `IndexWriter` trait for every backend. `Unsupported` is returned by
/// backends that do not implement an optional operation; callers decide whether that
/// is fatal.
#[derive(Debug, Clone, Error)]
pub enum IndexWriteError {
    /// Validation error (e.g., a document without an id).
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Failed to establish connection to the search backend.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Failed to index a single document.
    #[error("Index error: {0}")]
    IndexError(String),

    /// Bulk request failed as a whole.
    #[error("Bulk index error: {0}")]
    BulkIndexError(String),

    /// Failed to delete a document.
    #[error("Delete error: {0}")]
    DeleteError(String),

    /// Failed to create a collection.
    #[error("Collection creation error: {0}")]
    CollectionCreationError(String),

    /// Failed to parse a response from the backend.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// The backend does not implement this operation.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

impl IndexWriteError {
    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create an index error.
    pub fn index(msg: impl Into<String>) -> Self {
        Self::IndexError(msg.into())
    }

    /// Create a bulk index error.
    pub fn bulk_index(msg: impl Into<String>) -> Self {
        Self::BulkIndexError(msg.into())
    }

    /// Create a delete error.
    pub fn delete(msg: impl Into<String>) -> Self {
        Self::DeleteError(msg.into())
    }

    /// Create a collection creation error.
    pub fn collection_creation(msg: impl Into<String>) -> Self {
        Self::CollectionCreationError(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Create an unsupported-operation error.
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported(operation.into())
    }

    /// Whether this error means the backend lacks the operation entirely.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported(_))
    }
}
