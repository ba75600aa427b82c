//! Index writer trait definition.
//!
//! This module defines the abstract interface for index-write operations, allowing
//! different backend implementations (OpenSearch, Typesense, in-memory mocks).

use async_trait::async_trait;

use crate::errors::IndexWriteError;
use crate::types::{BatchOperationSummary, CollectionSchema, IndexDocument};

/// Abstracts the search backend the pipeline writes into.
///
/// The pipeline only calls these methods; it never manages connections itself.
///
/// # Note on Document Creation
///
/// There is no separate `insert` function. `index_documents` performs an upsert keyed
/// by each document's `id` field: it creates the document if it doesn't exist and
/// replaces it if it does. Applying the same documents twice leaves the index in the
/// same state as applying them once.
///
/// # Deletion
///
/// `delete_documents` is optional. The default implementation returns
/// [`IndexWriteError::Unsupported`], which callers treat as "recorded but not applied".
#[async_trait]
pub trait IndexWriter: Send + Sync {
    /// Create a collection (index) with the given schema if it does not exist yet.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the collection exists after the call
    /// * `Err(IndexWriteError)` - If creation fails
    async fn create_collection(
        &self,
        name: &str,
        schema: &CollectionSchema,
    ) -> Result<(), IndexWriteError>;

    /// Upsert documents into a collection and report per-document outcomes.
    ///
    /// # Arguments
    ///
    /// * `name` - Collection name
    /// * `documents` - Documents to write, each carrying an `id` field
    ///
    /// # Returns
    ///
    /// * `Ok(BatchOperationSummary)` - Aggregate statistics and one result per input
    ///   document, in input order
    /// * `Err(IndexWriteError)` - If the request fails entirely
    async fn index_documents(
        &self,
        name: &str,
        documents: &[IndexDocument],
    ) -> Result<BatchOperationSummary, IndexWriteError>;

    /// Delete documents by id. Documents that don't exist count as deleted.
    async fn delete_documents(
        &self,
        name: &str,
        document_ids: &[String],
    ) -> Result<BatchOperationSummary, IndexWriteError> {
        let _ = (name, document_ids);
        Err(IndexWriteError::unsupported("delete_documents"))
    }
}
