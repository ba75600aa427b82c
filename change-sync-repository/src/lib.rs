//! # Change Sync Repository
//!
//! This crate provides the index-write collaborator used by the change-sync pipeline:
//! the [`IndexWriter`] trait, its error type, the collection schema and bulk summary
//! types, and a concrete implementation for OpenSearch.

pub mod errors;
pub mod interfaces;
pub mod opensearch;
pub mod types;

pub use errors::IndexWriteError;
pub use interfaces::IndexWriter;
pub use opensearch::OpenSearchWriter;
pub use types::{
    document_id, BatchOperationResult, BatchOperationSummary, CollectionSchema, FieldSchema,
    FieldType, IndexDocument,
};
