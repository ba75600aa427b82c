//! Event normalization.
//!
//! Converts raw notifications of any supported shape into the canonical
//! [`ChangeEvent`] and validates the result before it reaches the processor.

pub mod detectors;
mod document_kind;
mod timestamp;
mod unmarshal;

pub use detectors::RawShape;
pub use timestamp::parse_timestamp;
pub use unmarshal::{unmarshal_image, unmarshal_value};

use change_sync_shared::{
    bulk_document_ids, bulk_documents, resolve_document_id, ChangeEvent, DocumentKind,
    EventKind,
};
use chrono::Utc;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::NormalizeError;
use detectors::{DetectContext, DETECTORS};

/// Oldest accepted event age.
pub const MAX_EVENT_AGE_MS: i64 = 24 * 60 * 60 * 1000;

/// Furthest an event may lie in the future, to absorb clock skew.
pub const MAX_CLOCK_SKEW_MS: i64 = 60 * 1000;

/// Converts raw notifications into canonical events and validates them.
///
/// Stateless apart from its validation window; one instance is shared by the queue
/// consumer and the manual entry points.
#[derive(Debug, Clone)]
pub struct EventNormalizer {
    max_age_ms: i64,
    max_skew_ms: i64,
}

impl Default for EventNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl EventNormalizer {
    pub fn new() -> Self {
        Self {
            max_age_ms: MAX_EVENT_AGE_MS,
            max_skew_ms: MAX_CLOCK_SKEW_MS,
        }
    }

    /// Convert a raw notification into a canonical event.
    ///
    /// # Arguments
    ///
    /// * `raw` - The decoded notification body
    /// * `source` - The channel it arrived on, recorded in the event origin
    ///
    /// # Returns
    ///
    /// * `Ok(ChangeEvent)` - The canonical event (not yet validated)
    /// * `Err(NormalizeError)` - If no detector recognizes the shape or decoding fails
    pub fn transform(&self, raw: &Value, source: &str) -> Result<ChangeEvent, NormalizeError> {
        self.transform_at(raw, source, now_ms())
    }

    /// [`transform`](Self::transform) with an explicit "now" for the timestamp fallback.
    pub fn transform_at(
        &self,
        raw: &Value,
        source: &str,
        now_ms: i64,
    ) -> Result<ChangeEvent, NormalizeError> {
        let obj = raw.as_object().ok_or_else(|| {
            NormalizeError::transform(format!("Expected a JSON object, got {}", type_name(raw)))
        })?;
        let ctx = DetectContext { source, now_ms };

        for (shape, detect) in DETECTORS {
            if let Some(mut event) = detect(obj, &ctx)? {
                finalize(&mut event);
                debug!(
                    shape = shape.as_str(),
                    event_id = %event.id,
                    event_kind = %event.event_kind,
                    document_kind = ?event.document_kind,
                    "Normalized event"
                );
                return Ok(event);
            }
        }

        Err(NormalizeError::transform("Unrecognized event shape"))
    }

    /// Decode a JSON string and transform it.
    pub fn transform_str(&self, body: &str, source: &str) -> Result<ChangeEvent, NormalizeError> {
        let raw: Value = serde_json::from_str(body)
            .map_err(|e| NormalizeError::transform(format!("Body is not valid JSON: {}", e)))?;
        self.transform(&raw, source)
    }

    /// Transform and validate in one step.
    pub fn normalize(&self, raw: &Value, source: &str) -> Result<ChangeEvent, NormalizeError> {
        let now = now_ms();
        let event = self.transform_at(raw, source, now)?;
        self.check_at(&event, now)?;
        Ok(event)
    }

    /// Whether the event may be applied. Logs the rejection reason.
    pub fn validate(&self, event: &ChangeEvent) -> bool {
        match self.check(event) {
            Ok(()) => true,
            Err(e) => {
                warn!(event_id = %event.id, reason = %e, "Rejected event");
                false
            }
        }
    }

    /// Validate against the current time, returning the rejection reason.
    pub fn check(&self, event: &ChangeEvent) -> Result<(), NormalizeError> {
        self.check_at(event, now_ms())
    }

    /// Validate against an explicit "now".
    pub fn check_at(&self, event: &ChangeEvent, now_ms: i64) -> Result<(), NormalizeError> {
        if event.id.trim().is_empty() {
            return Err(NormalizeError::invalid("Event has no id"));
        }
        if event.document_kind.is_none() {
            return Err(NormalizeError::invalid("Could not resolve document kind"));
        }

        let age = now_ms.saturating_sub(event.occurred_at_ms);
        if age > self.max_age_ms {
            return Err(NormalizeError::invalid(format!(
                "Event is {}s old, older than {}s",
                age / 1000,
                self.max_age_ms / 1000
            )));
        }
        if age.saturating_neg() > self.max_skew_ms {
            return Err(NormalizeError::invalid(format!(
                "Event is {}ms in the future",
                age.saturating_neg()
            )));
        }

        match event.event_kind {
            EventKind::Insert | EventKind::Update => {
                if !event.payload.is_object() {
                    return Err(NormalizeError::invalid(format!(
                        "{} payload must be an object, got {}",
                        event.event_kind,
                        type_name(&event.payload)
                    )));
                }
            }
            EventKind::Delete => {
                if resolve_document_id(&event.payload, event.document_kind).is_none() {
                    return Err(NormalizeError::invalid(
                        "Delete payload does not resolve to a document id",
                    ));
                }
            }
            EventKind::BulkUpdate => {
                if !bulk_documents(&event.payload).is_some_and(|docs| !docs.is_empty()) {
                    return Err(NormalizeError::invalid(
                        "Bulk update requires a non-empty documents list",
                    ));
                }
            }
            EventKind::BulkDelete => {
                if !bulk_document_ids(&event.payload, event.document_kind)
                    .is_some_and(|ids| !ids.is_empty())
                {
                    return Err(NormalizeError::invalid(
                        "Bulk delete requires a non-empty list of resolvable document ids",
                    ));
                }
            }
        }

        Ok(())
    }

    /// Resolve the document kind of a raw notification without transforming it.
    pub fn infer_document_kind(&self, raw: &Value) -> Option<DocumentKind> {
        raw.as_object().and_then(detectors::infer_kind)
    }
}

/// Fill the generated id and tag single-document payloads with their kind.
fn finalize(event: &mut ChangeEvent) {
    if event.id.trim().is_empty() {
        event.id = Uuid::new_v4().to_string();
    }
    if matches!(event.event_kind, EventKind::Insert | EventKind::Update) {
        if let (Some(kind), Some(payload)) = (event.document_kind, event.payload.as_object_mut()) {
            payload
                .entry("document_type")
                .or_insert_with(|| Value::String(kind.as_str().to_string()));
        }
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
