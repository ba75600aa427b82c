//! Error types for the change-sync repository.
//!
//! This module provides a unified error type for all index-write operations.

mod index_write_error;

pub use index_write_error::IndexWriteError;
