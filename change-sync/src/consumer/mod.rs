//! Consumer module for receiving change notifications from the queue.

mod messages;
mod queue_consumer;
mod sqs_transport;
mod transport;

pub use messages::{
    decode_body, PollSummary, QueueMessage, ReceiveOptions, RECEIVE_COUNT_ATTRIBUTE,
    RETRY_COUNT_ATTRIBUTE,
};
pub use queue_consumer::{ConsumerSettings, ConsumerStats, QueueConsumer, QUEUE_SOURCE};
pub use sqs_transport::SqsTransport;
pub use transport::QueueTransport;
