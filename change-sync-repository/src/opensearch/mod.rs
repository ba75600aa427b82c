//! OpenSearch implementation of the index writer.
//!
//! This module provides a concrete implementation of `IndexWriter` using OpenSearch
//! as the backend.

mod mappings;
mod writer;

pub use mappings::collection_body;
pub use writer::OpenSearchWriter;
