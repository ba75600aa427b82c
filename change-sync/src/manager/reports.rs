//! Structured results returned by the manager's entry points.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use change_sync_shared::{DocumentKind, EventKind};

use crate::consumer::ConsumerStats;
use crate::metrics::MetricsSnapshot;
use crate::processor::ProcessorHealth;

/// Result of submitting one raw event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_kind: Option<EventKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_kind: Option<DocumentKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The submitted event, returned on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original: Option<Value>,
    pub duration_ms: u64,
}

/// A raw event of a batch that failed normalization or validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rejection {
    /// Position in the submitted batch.
    pub index: usize,
    pub error: String,
    pub original: Value,
}

/// Result of submitting a batch of raw events.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    pub success: bool,
    pub total: usize,
    pub processed: usize,
    /// Rejected events plus events whose write failed.
    pub failed: usize,
    pub rejections: Vec<Rejection>,
    /// Write errors reported by the processor.
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

/// Aggregated health of the sync system.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub healthy: bool,
    /// Why the system is unhealthy; `None` when healthy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub running: bool,
    pub processor_healthy: bool,
    pub error_rate: f64,
    pub error_rate_threshold: f64,
    pub checked_at: DateTime<Utc>,
}

/// Full status of the sync system.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub running: bool,
    pub queue_enabled: bool,
    /// Whether the queue poll loop is active; always false without a queue.
    pub consumer_running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumer: Option<ConsumerStats>,
    pub processor: ProcessorHealth,
    pub metrics: MetricsSnapshot,
}

/// Metrics in both export formats.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsExport {
    pub snapshot: MetricsSnapshot,
    /// Prometheus text exposition; `None` if rendering failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exposition: Option<String>,
}
