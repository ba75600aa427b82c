//! Queue transport trait definition.

use async_trait::async_trait;

use crate::consumer::messages::{QueueMessage, ReceiveOptions};
use crate::errors::IngestError;

/// Abstracts the message queue the consumer polls.
///
/// Implementations must be safe to share between the poll loop and the manager.
#[async_trait]
pub trait QueueTransport: Send + Sync {
    /// Receive up to `options.max_messages` messages, long-polling for at most
    /// `options.wait_time_secs`. Received messages stay invisible for
    /// `options.visibility_timeout_secs` unless deleted.
    async fn receive(&self, options: &ReceiveOptions) -> Result<Vec<QueueMessage>, IngestError>;

    /// Delete a message by its receipt handle.
    async fn delete(&self, receipt_handle: &str) -> Result<(), IngestError>;
}
