//! Sync manager implementation.
//!
//! Top-level lifecycle owner of the pipeline. It wires the normalizer, processor,
//! metrics and (when a queue is configured) the consumer, and is the only entry point
//! the surrounding service talks to.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{info, instrument, warn};

use change_sync_repository::IndexWriter;

use crate::config::SyncConfig;
use crate::consumer::{ConsumerSettings, QueueConsumer, QueueTransport};
use crate::manager::reports::{
    BatchOutcome, HealthReport, MetricsExport, ProcessOutcome, Rejection, SyncStatus,
};
use crate::metrics::MetricsCollector;
use crate::normalizer::EventNormalizer;
use crate::pipeline::SyncPipeline;
use crate::processor::ChangeProcessor;
use crate::SyncError;

/// Owns the sync pipeline and its lifecycle.
///
/// The manager's own running flag is the one reported by status and health. Without
/// a queue the manager still runs; only manual processing is available.
pub struct SyncManager {
    config: SyncConfig,
    pipeline: Arc<SyncPipeline>,
    consumer: Option<Arc<QueueConsumer>>,
    running: AtomicBool,
    started_at: Mutex<Option<DateTime<Utc>>>,
}

impl SyncManager {
    /// Wire the pipeline.
    ///
    /// # Arguments
    ///
    /// * `config` - Pipeline settings
    /// * `writer` - Index-write collaborator
    /// * `transport` - Queue transport; `None` runs without a consumer
    /// * `metrics` - Metrics collector shared with the caller
    pub fn new(
        config: SyncConfig,
        writer: Arc<dyn IndexWriter>,
        transport: Option<Arc<dyn QueueTransport>>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        let processor = Arc::new(ChangeProcessor::new(writer));
        let pipeline = Arc::new(SyncPipeline::new(
            EventNormalizer::new(),
            processor,
            metrics,
        ));

        let consumer = match transport {
            Some(transport) => Some(Arc::new(QueueConsumer::new(
                transport,
                Arc::clone(&pipeline),
                ConsumerSettings::from_config(&config),
            ))),
            None => {
                info!("No queue configured; queue consumer disabled, manual processing only");
                None
            }
        };

        Self {
            config,
            pipeline,
            consumer,
            running: AtomicBool::new(false),
            started_at: Mutex::new(None),
        }
    }

    fn started_at_lock(&self) -> MutexGuard<'_, Option<DateTime<Utc>>> {
        self.started_at.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Validate configuration, create the collections, and start the consumer.
    ///
    /// Configuration and collection errors are returned here and nowhere else.
    pub async fn start(&self) -> Result<(), SyncError> {
        self.config.validate()?;
        self.pipeline.processor().ensure_collections().await?;

        match &self.consumer {
            Some(consumer) => consumer.start().await,
            None => info!("Sync manager started without a queue consumer"),
        }
        if !self.running.swap(true, Ordering::SeqCst) {
            *self.started_at_lock() = Some(Utc::now());
        }
        Ok(())
    }

    /// Stop the consumer. An in-flight poll cycle finishes in the background.
    pub async fn stop(&self) {
        if let Some(consumer) = &self.consumer {
            consumer.stop().await;
        }
        self.running.store(false, Ordering::SeqCst);
        *self.started_at_lock() = None;
    }

    /// Stop the consumer and wait for its poll loop to exit.
    pub async fn shutdown(&self) {
        self.stop().await;
        if let Some(consumer) = &self.consumer {
            consumer.join().await;
        }
        info!("Sync manager shut down");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn get_status(&self) -> SyncStatus {
        SyncStatus {
            running: self.is_running(),
            queue_enabled: self.consumer.is_some(),
            consumer_running: self.consumer.as_ref().is_some_and(|c| c.is_running()),
            started_at: *self.started_at_lock(),
            consumer: self.consumer.as_ref().map(|c| c.stats()),
            processor: self.pipeline.processor().health(),
            metrics: self.pipeline.metrics().snapshot(),
        }
    }

    /// Normalize, validate and apply one raw event.
    #[instrument(skip(self, raw))]
    pub async fn process_event(&self, raw: &Value, source: &str) -> ProcessOutcome {
        let start = Instant::now();

        let event = match self.pipeline.admit(raw, source) {
            Ok(event) => event,
            Err(e) => {
                return ProcessOutcome {
                    success: false,
                    event_id: None,
                    event_kind: None,
                    document_kind: None,
                    error: Some(e.to_string()),
                    original: Some(raw.clone()),
                    duration_ms: start.elapsed().as_millis() as u64,
                }
            }
        };

        let result = self.pipeline.apply(std::slice::from_ref(&event)).await;
        let success = result.failed == 0;
        ProcessOutcome {
            success,
            event_id: Some(event.id),
            event_kind: Some(event.event_kind),
            document_kind: event.document_kind,
            error: result.errors.into_iter().next(),
            original: (!success).then(|| raw.clone()),
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// Normalize and validate every raw event, then apply the valid ones together.
    #[instrument(skip(self, raws), fields(event_count = raws.len()))]
    pub async fn process_batch(&self, raws: &[Value], source: &str) -> BatchOutcome {
        let start = Instant::now();
        let mut rejections = Vec::new();
        let mut events = Vec::with_capacity(raws.len());

        for (index, raw) in raws.iter().enumerate() {
            match self.pipeline.admit(raw, source) {
                Ok(event) => events.push(event),
                Err(e) => rejections.push(Rejection {
                    index,
                    error: e.to_string(),
                    original: raw.clone(),
                }),
            }
        }

        let result = self.pipeline.apply(&events).await;
        let failed = rejections.len() + result.failed;
        BatchOutcome {
            success: failed == 0,
            total: raws.len(),
            processed: result.processed,
            failed,
            rejections,
            errors: result.errors,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// Healthy when the manager runs, the processor is healthy, and the error rate is
    /// below the configured ceiling.
    pub fn health_check(&self) -> HealthReport {
        let running = self.is_running();
        let processor_healthy = self.pipeline.processor().is_healthy();
        let error_rate = self.pipeline.metrics().error_rate();
        let threshold = self.config.error_rate_threshold;

        let mut reasons = Vec::new();
        if !running {
            reasons.push("sync manager is not running".to_string());
        }
        if !processor_healthy {
            reasons.push("processor has too many recent failures".to_string());
        }
        if error_rate >= threshold {
            reasons.push(format!(
                "error rate {:.3} is at or above {:.3}",
                error_rate, threshold
            ));
        }

        let healthy = reasons.is_empty();
        if !healthy {
            warn!(reasons = ?reasons, "Health check failed");
        }
        HealthReport {
            healthy,
            reason: (!healthy).then(|| reasons.join("; ")),
            running,
            processor_healthy,
            error_rate,
            error_rate_threshold: threshold,
            checked_at: Utc::now(),
        }
    }

    /// Metrics as a JSON-ready snapshot and as Prometheus text.
    pub fn export_metrics(&self) -> MetricsExport {
        let metrics = self.pipeline.metrics();
        let exposition = metrics
            .render_prometheus()
            .inspect_err(|e| warn!(error = %e, "Failed to render metrics"))
            .ok();
        MetricsExport {
            snapshot: metrics.snapshot(),
            exposition,
        }
    }

    /// Zero the metrics and clear the processor's failure count.
    pub fn reset_metrics(&self) {
        self.pipeline.metrics().reset();
        self.pipeline.processor().reset_health();
    }
}
