//! Raw notification shape detectors.
//!
//! Each detector inspects a raw JSON object and either claims it, returning the
//! canonical event, or declines with `Ok(None)` so the next detector can try.
//! A detector that claims a shape but cannot decode it returns an error.

use change_sync_shared::{ChangeEvent, DocumentKind, EventKind, EventOrigin};
use serde_json::{Map, Value};

use crate::errors::NormalizeError;
use crate::normalizer::document_kind;
use crate::normalizer::timestamp::parse_timestamp;
use crate::normalizer::unmarshal::unmarshal_image;

/// Shapes a raw notification can take, in detection order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawShape {
    /// Already in the canonical event layout.
    Canonical,
    /// Column/row change-stream record with typed-wrapper images.
    ChangeStream,
    /// Generic `{action, payload, ts}` webhook.
    Webhook,
    /// Anything else submitted through the API.
    Api,
}

impl RawShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            RawShape::Canonical => "canonical",
            RawShape::ChangeStream => "change_stream",
            RawShape::Webhook => "webhook",
            RawShape::Api => "api",
        }
    }
}

/// Inputs shared by every detector.
pub struct DetectContext<'a> {
    pub source: &'a str,
    pub now_ms: i64,
}

pub type Detector =
    fn(&Map<String, Value>, &DetectContext<'_>) -> Result<Option<ChangeEvent>, NormalizeError>;

/// The detectors, most specific first.
pub const DETECTORS: &[(RawShape, Detector)] = &[
    (RawShape::Canonical, detect_canonical),
    (RawShape::ChangeStream, detect_change_stream),
    (RawShape::Webhook, detect_webhook),
    (RawShape::Api, detect_api),
];

const KIND_FIELDS: &[&str] = &["eventKind", "eventType", "event_type", "eventName", "operation"];
const TIME_FIELDS: &[&str] = &["occurredAtMs", "timestamp", "ts", "occurredAt", "eventTime"];
const DATA_FIELDS: &[&str] = &["payload", "data", "document"];

/// Top-level keys that describe the event rather than the document.
const META_FIELDS: &[&str] = &[
    "eventId",
    "eventKind",
    "eventType",
    "event_type",
    "operation",
    "documentType",
    "document_type",
    "document_kind",
    "documentKind",
    "occurredAtMs",
    "timestamp",
    "ts",
    "occurredAt",
    "eventTime",
    "source",
    "userId",
    "actor",
    "correlationId",
    "batchId",
    "origin",
    "previousPayload",
    "previous",
];

/// An event already in canonical layout: an id, a kind, a document kind, a time and
/// a payload.
pub fn detect_canonical(
    obj: &Map<String, Value>,
    ctx: &DetectContext<'_>,
) -> Result<Option<ChangeEvent>, NormalizeError> {
    let has = |fields: &[&str]| fields.iter().any(|f| obj.contains_key(*f));
    let is_canonical = obj.get("id").and_then(Value::as_str).is_some()
        && has(&["eventKind", "eventType"])
        && has(&["documentKind", "documentType"])
        && has(&["occurredAtMs", "timestamp"])
        && has(&["payload", "data"]);
    if !is_canonical {
        return Ok(None);
    }

    let payload = first_of(obj, DATA_FIELDS).cloned().unwrap_or(Value::Null);
    let event = ChangeEvent {
        id: string_field(obj, &["id"]).unwrap_or_default(),
        event_kind: event_kind(obj),
        document_kind: document_kind::resolve(obj, &payload),
        occurred_at_ms: parse_timestamp(first_of(obj, TIME_FIELDS), ctx.now_ms),
        previous_payload: first_of(obj, &["previousPayload", "previous"]).cloned(),
        payload,
        origin: origin(obj, ctx.source),
    };
    Ok(Some(event))
}

/// A change-stream record: `{eventID, eventName, eventSourceARN, dynamodb: {Keys,
/// NewImage, OldImage, ApproximateCreationDateTime}}`. The image block may also sit at
/// the top level.
pub fn detect_change_stream(
    obj: &Map<String, Value>,
    ctx: &DetectContext<'_>,
) -> Result<Option<ChangeEvent>, NormalizeError> {
    let images = match obj.get("dynamodb").and_then(Value::as_object) {
        Some(images) => images,
        None if ["NewImage", "OldImage", "Keys"]
            .iter()
            .any(|k| obj.contains_key(*k)) =>
        {
            obj
        }
        None => return Ok(None),
    };

    let event_kind = event_kind(obj);
    let new_image = images.get("NewImage").map(unmarshal_image).transpose()?;
    let old_image = images.get("OldImage").map(unmarshal_image).transpose()?;
    let keys = images.get("Keys").map(unmarshal_image).transpose()?;

    let payload = if event_kind.is_delete() {
        keys.or_else(|| old_image.clone())
    } else {
        new_image
    };
    let payload = payload.unwrap_or(Value::Null);

    let kind = document_kind::resolve(obj, &payload).or_else(|| {
        old_image
            .as_ref()
            .and_then(document_kind::infer_from_payload)
    });

    let event = ChangeEvent {
        id: string_field(obj, &["eventID", "eventId"]).unwrap_or_default(),
        event_kind,
        document_kind: kind,
        occurred_at_ms: parse_timestamp(
            images
                .get("ApproximateCreationDateTime")
                .or_else(|| first_of(obj, TIME_FIELDS)),
            ctx.now_ms,
        ),
        payload,
        previous_payload: old_image,
        origin: EventOrigin {
            actor: obj
                .get("userIdentity")
                .and_then(|u| u.get("principalId"))
                .and_then(Value::as_str)
                .map(str::to_string),
            ..origin(obj, ctx.source)
        },
    };
    Ok(Some(event))
}

/// A generic webhook: `{action, payload, ts}`.
pub fn detect_webhook(
    obj: &Map<String, Value>,
    ctx: &DetectContext<'_>,
) -> Result<Option<ChangeEvent>, NormalizeError> {
    let Some(action) = obj.get("action").and_then(Value::as_str) else {
        return Ok(None);
    };
    let Some(payload) = obj.get("payload") else {
        return Ok(None);
    };

    let event = ChangeEvent {
        id: string_field(obj, &["eventId", "deliveryId", "webhookId"]).unwrap_or_default(),
        event_kind: EventKind::from_label(action),
        document_kind: document_kind::resolve(obj, payload),
        occurred_at_ms: parse_timestamp(
            obj.get("ts").or_else(|| first_of(obj, TIME_FIELDS)),
            ctx.now_ms,
        ),
        payload: payload.clone(),
        previous_payload: obj.get("previous").cloned(),
        origin: origin(obj, ctx.source),
    };
    Ok(Some(event))
}

/// Any other object. The document is the `data`/`payload`/`document` field when one is
/// present, otherwise the object itself minus its event metadata.
pub fn detect_api(
    obj: &Map<String, Value>,
    ctx: &DetectContext<'_>,
) -> Result<Option<ChangeEvent>, NormalizeError> {
    let wrapped = first_of(obj, DATA_FIELDS);
    let payload = match wrapped {
        Some(data) => data.clone(),
        None => Value::Object(
            obj.iter()
                .filter(|(k, _)| !META_FIELDS.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        ),
    };

    // Without a wrapper, `id` belongs to the document, not the event.
    let id_fields: &[&str] = if wrapped.is_some() {
        &["eventId", "id"]
    } else {
        &["eventId"]
    };

    let event = ChangeEvent {
        id: string_field(obj, id_fields).unwrap_or_default(),
        event_kind: event_kind(obj),
        document_kind: document_kind::resolve(obj, &payload),
        occurred_at_ms: parse_timestamp(first_of(obj, TIME_FIELDS), ctx.now_ms),
        previous_payload: first_of(obj, &["previousPayload", "previous"]).cloned(),
        payload,
        origin: origin(obj, ctx.source),
    };
    Ok(Some(event))
}

fn event_kind(obj: &Map<String, Value>) -> EventKind {
    KIND_FIELDS
        .iter()
        .find_map(|f| obj.get(*f).and_then(Value::as_str))
        .map(EventKind::from_label)
        .unwrap_or(EventKind::Update)
}

/// Build the origin from an `origin` object, top-level metadata, and the channel.
fn origin(obj: &Map<String, Value>, source: &str) -> EventOrigin {
    let nested = obj.get("origin").and_then(Value::as_object);
    let lookup = |fields: &[&str]| -> Option<String> {
        nested
            .and_then(|o| string_field(o, fields))
            .or_else(|| string_field(obj, fields))
    };

    EventOrigin {
        source: nested
            .and_then(|o| string_field(o, &["source"]))
            .or_else(|| string_field(obj, &["source"]))
            .unwrap_or_else(|| source.to_string()),
        actor: lookup(&["actor", "userId", "user_id"]),
        correlation_id: lookup(&["correlationId", "correlation_id"]),
        batch_id: lookup(&["batchId", "batch_id"]),
    }
}

fn first_of<'a>(obj: &'a Map<String, Value>, fields: &[&str]) -> Option<&'a Value> {
    fields
        .iter()
        .find_map(|f| obj.get(*f).filter(|v| !v.is_null()))
}

fn string_field(obj: &Map<String, Value>, fields: &[&str]) -> Option<String> {
    fields.iter().find_map(|f| match obj.get(*f) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Resolve a document kind for a raw object without building an event.
pub fn infer_kind(obj: &Map<String, Value>) -> Option<DocumentKind> {
    document_kind::explicit_kind(obj)
        .or_else(|| document_kind::table_kind(obj))
        .or_else(|| {
            let images = obj.get("dynamodb").and_then(Value::as_object).unwrap_or(obj);
            images
                .get("NewImage")
                .or_else(|| images.get("OldImage"))
                .and_then(|image| unmarshal_image(image).ok())
                .and_then(|plain| document_kind::infer_from_payload(&plain))
        })
        .or_else(|| {
            first_of(obj, DATA_FIELDS).and_then(|data| {
                data.as_object()
                    .and_then(document_kind::explicit_kind)
                    .or_else(|| document_kind::infer_from_payload(data))
            })
        })
        .or_else(|| document_kind::infer_from_payload(&Value::Object(obj.clone())))
}
