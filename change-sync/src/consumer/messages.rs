//! Queue message types and envelope decoding.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use crate::errors::NormalizeError;

/// Attribute carrying the number of times a message has been received.
pub const RECEIVE_COUNT_ATTRIBUTE: &str = "ApproximateReceiveCount";

/// Fallback attribute set by producers that track retries themselves.
pub const RETRY_COUNT_ATTRIBUTE: &str = "retryCount";

/// Nesting depth at which envelope unwrapping stops.
const MAX_ENVELOPE_DEPTH: usize = 4;

/// A message received from the queue.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueMessage {
    pub id: String,
    /// Raw JSON body, possibly wrapped in a notification envelope.
    pub body: String,
    pub attributes: HashMap<String, String>,
    /// Handle used to delete the message after processing.
    pub receipt_handle: String,
}

impl QueueMessage {
    /// How many times the message has been delivered, if the queue reports it.
    pub fn receive_count(&self) -> Option<u32> {
        [RECEIVE_COUNT_ATTRIBUTE, RETRY_COUNT_ATTRIBUTE]
            .iter()
            .find_map(|key| self.attributes.get(*key))
            .and_then(|raw| raw.trim().parse().ok())
    }
}

/// Parameters of one receive call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReceiveOptions {
    pub max_messages: i32,
    pub wait_time_secs: i32,
    pub visibility_timeout_secs: i32,
}

/// Outcome of one poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollSummary {
    pub received: usize,
    /// Messages rejected by normalization or validation (deleted immediately).
    pub invalid: usize,
    pub processed: usize,
    pub failed: usize,
    pub deleted: usize,
    /// Valid messages left on the queue for redelivery.
    pub retained: usize,
    /// Messages whose receive count is past the retry ceiling.
    pub over_retry_limit: usize,
}

impl PollSummary {
    /// `processed / (processed + failed)` over every polled message, rejected ones
    /// included. A cycle with nothing to count is fully successful.
    pub fn success_ratio(&self) -> f64 {
        let total = self.processed + self.failed;
        if total == 0 {
            1.0
        } else {
            self.processed as f64 / total as f64
        }
    }
}

/// Decode a message body, unwrapping notification envelopes.
///
/// A `{"Type": "Notification", "Message": "<json>"}` envelope is replaced by its
/// decoded `Message`, repeatedly, so double-wrapped bodies are handled. A body that
/// decodes to a JSON string is decoded again.
pub fn decode_body(body: &str) -> Result<Value, NormalizeError> {
    let mut value: Value = serde_json::from_str(body)
        .map_err(|e| NormalizeError::transform(format!("Body is not valid JSON: {}", e)))?;

    for _ in 0..MAX_ENVELOPE_DEPTH {
        let next = match &value {
            Value::String(s) => parse_inner(s)?,
            Value::Object(obj)
                if obj.get("Type").and_then(Value::as_str) == Some("Notification") =>
            {
                match obj.get("Message") {
                    Some(Value::String(s)) => parse_inner(s)?,
                    Some(other) => other.clone(),
                    None => {
                        return Err(NormalizeError::transform(
                            "Notification envelope has no Message",
                        ))
                    }
                }
            }
            _ => break,
        };
        value = next;
    }

    Ok(value)
}

fn parse_inner(raw: &str) -> Result<Value, NormalizeError> {
    serde_json::from_str(raw).map_err(|e| {
        NormalizeError::transform(format!("Envelope message is not valid JSON: {}", e))
    })
}
