//! SQS implementation of the queue transport.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_sqs::config::Region;
use aws_sdk_sqs::error::DisplayErrorContext;
use aws_sdk_sqs::types::{Message, MessageSystemAttributeName};
use aws_sdk_sqs::Client;
use tracing::{debug, info, warn};

use crate::config::QueueSettings;
use crate::consumer::messages::{QueueMessage, ReceiveOptions, RETRY_COUNT_ATTRIBUTE};
use crate::consumer::transport::QueueTransport;
use crate::errors::IngestError;

/// Queue transport backed by Amazon SQS.
pub struct SqsTransport {
    client: Client,
    queue_url: String,
}

impl SqsTransport {
    /// Wrap an existing SQS client.
    pub fn new(client: Client, queue_url: impl Into<String>) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
        }
    }

    /// Build a client from the default AWS provider chain, applying the region and
    /// endpoint overrides from `settings`.
    pub async fn from_settings(settings: &QueueSettings) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &settings.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(endpoint) = &settings.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        info!(
            queue_url = %settings.queue_url,
            region = ?settings.region,
            endpoint = ?settings.endpoint_url,
            "Created SQS transport"
        );

        Self::new(Client::new(&sdk_config), settings.queue_url.clone())
    }
}

/// Convert an SQS message, flattening system attributes and the retry-count message
/// attribute into one string map.
fn to_queue_message(message: Message) -> QueueMessage {
    let mut attributes: HashMap<String, String> = message
        .attributes
        .unwrap_or_default()
        .into_iter()
        .map(|(name, value)| (name.as_str().to_string(), value))
        .collect();

    if let Some(retry) = message
        .message_attributes
        .as_ref()
        .and_then(|attrs| attrs.get(RETRY_COUNT_ATTRIBUTE))
        .and_then(|value| value.string_value.clone())
    {
        attributes.insert(RETRY_COUNT_ATTRIBUTE.to_string(), retry);
    }

    QueueMessage {
        id: message.message_id.unwrap_or_default(),
        body: message.body.unwrap_or_default(),
        attributes,
        receipt_handle: message.receipt_handle.unwrap_or_default(),
    }
}

#[async_trait]
impl QueueTransport for SqsTransport {
    async fn receive(&self, options: &ReceiveOptions) -> Result<Vec<QueueMessage>, IngestError> {
        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(options.max_messages)
            .wait_time_seconds(options.wait_time_secs)
            .visibility_timeout(options.visibility_timeout_secs)
            .message_system_attribute_names(MessageSystemAttributeName::All)
            .message_attribute_names(RETRY_COUNT_ATTRIBUTE)
            .send()
            .await
            .map_err(|e| {
                IngestError::queue(format!("Receive failed: {}", DisplayErrorContext(&e)))
            })?;

        let messages: Vec<QueueMessage> = output
            .messages
            .unwrap_or_default()
            .into_iter()
            .map(to_queue_message)
            .collect();

        for message in messages.iter().filter(|m| m.receipt_handle.is_empty()) {
            warn!(message_id = %message.id, "Message has no receipt handle and cannot be deleted");
        }
        debug!(count = messages.len(), "Received messages from SQS");
        Ok(messages)
    }

    async fn delete(&self, receipt_handle: &str) -> Result<(), IngestError> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| IngestError::queue(format!("Delete failed: {}", DisplayErrorContext(&e))))?;
        Ok(())
    }
}
