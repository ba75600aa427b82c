//! Configuration and dependency initialization.

mod dependencies;
mod settings;

pub use dependencies::{ConnectionMode, Dependencies};
pub use settings::{
    QueueSettings, SyncConfig, DEFAULT_BATCH_SIZE, DEFAULT_DELETE_SUCCESS_RATIO,
    DEFAULT_ERROR_RATE_THRESHOLD, DEFAULT_MAX_RETRIES, DEFAULT_POLL_INTERVAL_MS,
    DEFAULT_VISIBILITY_TIMEOUT_SECS, DEFAULT_WAIT_TIME_SECS,
};
