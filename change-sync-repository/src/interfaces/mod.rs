//! Interface definitions for the index-write collaborator.
//!
//! This module defines the abstract `IndexWriter` trait that allows the pipeline to be
//! wired against any search backend, or against a mock in tests.

mod index_writer;

pub use index_writer::IndexWriter;
