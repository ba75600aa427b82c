//! Processor module for applying change events to the search index.
//!
//! Routes each document kind to its collection, shapes payloads into index documents,
//! and writes them in grouped bulk calls.

mod change_processor;
mod document;
mod routing;

pub use change_processor::{
    BatchResult, ChangeProcessor, ProcessorHealth, MAX_BATCH_ERRORS, UNHEALTHY_FAILURE_THRESHOLD,
};
pub use document::to_index_document;
pub use routing::{collection_name, collection_schema};
