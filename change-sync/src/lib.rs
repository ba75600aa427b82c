//! # Change Sync
//!
//! Change-data-capture sync for the search index - consumes change notifications from
//! SQS, normalizes them into canonical change events, and projects them into
//! OpenSearch collections.
//!
//! ## Architecture
//!
//! Every event follows the same path, whether it arrives from the queue or through a
//! manual call:
//!
//! 1. **Normalizer**: Detects the raw shape and builds a canonical event
//! 2. **Processor**: Groups events and writes them to their collection
//! 3. **Consumer**: Polls the queue and decides which messages to delete
//! 4. **Manager**: Owns the lifecycle, health and metrics export
//!
//! ## Modules
//!
//! - [`config`]: Settings and dependency initialization
//! - [`normalizer`]: Raw payload to [`ChangeEvent`](change_sync_shared::ChangeEvent)
//! - [`processor`]: Batch application against the index writer
//! - [`consumer`]: Queue polling loop and the SQS transport
//! - [`metrics`]: Counters, duration window and Prometheus exposition
//! - [`manager`]: Lifecycle and manual entry points
//! - [`errors`]: Error types for the pipeline

pub mod config;
pub mod consumer;
pub mod errors;
pub mod manager;
pub mod metrics;
pub mod normalizer;
pub mod pipeline;
pub mod processor;

pub use config::{Dependencies, SyncConfig};
pub use errors::{IngestError, NormalizeError};
pub use manager::SyncManager;

use change_sync_repository::IndexWriteError;
use thiserror::Error;

/// Errors that can occur while starting or wiring the sync system.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Index backend error.
    #[error("Index error: {0}")]
    IndexError(#[from] IndexWriteError),
}

impl SyncError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
