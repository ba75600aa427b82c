//! The normalize → validate → apply path shared by the queue consumer and the manual
//! entry points.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::warn;

use change_sync_shared::ChangeEvent;

use crate::consumer::decode_body;
use crate::errors::NormalizeError;
use crate::metrics::MetricsCollector;
use crate::normalizer::EventNormalizer;
use crate::processor::{BatchResult, ChangeProcessor};

/// Normalizer, processor and metrics wired together.
///
/// Every event entering the system passes through [`admit`](Self::admit) and
/// [`apply`](Self::apply), so queue and manual traffic are counted the same way.
pub struct SyncPipeline {
    normalizer: EventNormalizer,
    processor: Arc<ChangeProcessor>,
    metrics: Arc<MetricsCollector>,
}

impl SyncPipeline {
    pub fn new(
        normalizer: EventNormalizer,
        processor: Arc<ChangeProcessor>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            normalizer,
            processor,
            metrics,
        }
    }

    pub fn normalizer(&self) -> &EventNormalizer {
        &self.normalizer
    }

    pub fn processor(&self) -> &Arc<ChangeProcessor> {
        &self.processor
    }

    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    /// Normalize and validate one raw event.
    ///
    /// Counts the event as received; a rejected event is also counted as failed.
    pub fn admit(&self, raw: &Value, source: &str) -> Result<ChangeEvent, NormalizeError> {
        self.metrics.record_received(1);
        self.normalizer.normalize(raw, source).inspect_err(|e| {
            warn!(source = %source, error = %e, "Event rejected");
            self.metrics.record_rejected(1);
        })
    }

    /// Decode a queue message body and admit the event it carries.
    pub fn admit_body(&self, body: &str, source: &str) -> Result<ChangeEvent, NormalizeError> {
        match decode_body(body) {
            Ok(raw) => self.admit(&raw, source),
            Err(e) => {
                self.metrics.record_received(1);
                self.metrics.record_rejected(1);
                Err(e)
            }
        }
    }

    /// Apply admitted events and record the outcome.
    pub async fn apply(&self, events: &[ChangeEvent]) -> BatchResult {
        if events.is_empty() {
            return BatchResult::default();
        }
        let start = Instant::now();
        let result = self.processor.apply_batch(events).await;
        self.metrics
            .record_batch(result.processed as u64, result.failed as u64, start.elapsed());
        result
    }
}
