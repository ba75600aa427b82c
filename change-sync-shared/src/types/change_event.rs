//! Canonical change-event types.
//!
//! This module defines the single normalized representation every raw notification is
//! converted into before it flows through the pipeline.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::types::document_kind::DocumentKind;

/// Kinds of change an event can describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// A new document was created.
    Insert,
    /// An existing document changed.
    Update,
    /// A single document was removed.
    Delete,
    /// Many documents changed at once; payload is `{documents: [...]}`.
    BulkUpdate,
    /// Many documents were removed; payload is `{documentIds: [...]}`.
    BulkDelete,
}

impl EventKind {
    /// Returns the canonical name of the event kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Insert => "Insert",
            EventKind::Update => "Update",
            EventKind::Delete => "Delete",
            EventKind::BulkUpdate => "BulkUpdate",
            EventKind::BulkDelete => "BulkDelete",
        }
    }

    /// Map an upstream action label onto an event kind.
    ///
    /// Matching ignores case, underscores, dashes and spaces, so `bulk_update`,
    /// `BULK-UPDATE` and `BulkUpdate` are equivalent. Unrecognized labels map to
    /// [`EventKind::Update`]: upstream systems only emit change events for meaningful
    /// mutations, and an upsert of the new state is always safe.
    pub fn from_label(label: &str) -> Self {
        let normalized: String = label
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .collect::<String>()
            .to_ascii_uppercase();

        match normalized.as_str() {
            "INSERT" | "INSERTED" | "CREATE" | "CREATED" | "ADD" | "ADDED" | "NEW" => {
                Self::Insert
            }
            "DELETE" | "DELETED" | "REMOVE" | "REMOVED" | "DESTROY" | "DESTROYED" => {
                Self::Delete
            }
            "BULKUPDATE" | "BATCHUPDATE" | "BULKUPSERT" | "BULKINSERT" => Self::BulkUpdate,
            "BULKDELETE" | "BATCHDELETE" | "BULKREMOVE" => Self::BulkDelete,
            // UPDATE, MODIFY, CHANGE, UPSERT and anything unknown
            _ => Self::Update,
        }
    }

    /// Whether the event removes documents from the index.
    pub fn is_delete(&self) -> bool {
        matches!(self, EventKind::Delete | EventKind::BulkDelete)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where an event came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventOrigin {
    /// Name of the channel the event arrived on (e.g. `sqs`, `api`, `webhook`).
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
}

impl EventOrigin {
    /// Create an origin with only a source channel.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            actor: None,
            correlation_id: None,
            batch_id: None,
        }
    }
}

/// The canonical change event.
///
/// `document_kind` is optional because normalization may fail to resolve it; such
/// events are rejected by validation and never reach the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub id: String,
    pub event_kind: EventKind,
    pub document_kind: Option<DocumentKind>,
    /// Event time in epoch milliseconds.
    pub occurred_at_ms: i64,
    pub payload: Value,
    /// Prior document state, informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_payload: Option<Value>,
    pub origin: EventOrigin,
}

impl ChangeEvent {
    /// Create an event stamped with a fresh id and the current time.
    ///
    /// # Example
    ///
    /// ```
    /// use change_sync_shared::{ChangeEvent, DocumentKind, EventKind};
    /// use serde_json::json;
    ///
    /// let event = ChangeEvent::new(
    ///     EventKind::Insert,
    ///     Some(DocumentKind::Claims),
    ///     json!({"claimId": "c-1"}),
    ///     "api",
    /// );
    /// assert_eq!(event.origin.source, "api");
    /// ```
    pub fn new(
        event_kind: EventKind,
        document_kind: Option<DocumentKind>,
        payload: Value,
        source: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            event_kind,
            document_kind,
            occurred_at_ms: Utc::now().timestamp_millis(),
            payload,
            previous_payload: None,
            origin: EventOrigin::new(source),
        }
    }

    /// Override the event time.
    pub fn at(mut self, occurred_at_ms: i64) -> Self {
        self.occurred_at_ms = occurred_at_ms;
        self
    }
}
