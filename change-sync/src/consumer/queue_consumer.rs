//! Queue consumer implementation.
//!
//! Polls the queue on a fixed interval, runs every message through the shared
//! pipeline, and deletes messages according to the batch outcome:
//!
//! - messages that fail decoding or validation are deleted immediately (retrying
//!   cannot fix them)
//! - valid messages are deleted together only when the success ratio of the whole
//!   polled batch, rejected messages included, reaches the configured threshold;
//!   otherwise all of them stay on the queue for redelivery

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use change_sync_shared::ChangeEvent;

use crate::config::SyncConfig;
use crate::consumer::messages::{PollSummary, QueueMessage, ReceiveOptions};
use crate::consumer::transport::QueueTransport;
use crate::errors::IngestError;
use crate::pipeline::SyncPipeline;

/// Origin source recorded on events that arrive through the queue.
pub const QUEUE_SOURCE: &str = "sqs";

/// Polling and deletion settings of the consumer.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumerSettings {
    pub receive: ReceiveOptions,
    pub poll_interval: Duration,
    /// Receive count past which a message is flagged for dead-letter handling.
    pub max_retries: u32,
    /// Minimum `processed / (processed + failed)` for the valid messages to be deleted.
    pub delete_success_ratio: f64,
}

impl ConsumerSettings {
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            receive: ReceiveOptions {
                max_messages: config.batch_size,
                wait_time_secs: config.wait_time_secs,
                visibility_timeout_secs: config.visibility_timeout_secs,
            },
            poll_interval: config.poll_interval,
            max_retries: config.max_retries,
            delete_success_ratio: config.delete_success_ratio,
        }
    }
}

/// Running totals of the consumer since it was created.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerStats {
    pub polls: u64,
    pub messages_received: u64,
    pub messages_deleted: u64,
    pub messages_retained: u64,
    pub invalid_messages: u64,
    pub poll_errors: u64,
    pub last_error: Option<String>,
    pub last_poll_at: Option<DateTime<Utc>>,
    pub last_poll: Option<PollSummary>,
}

#[derive(Default)]
struct LoopControl {
    cancel: Option<watch::Sender<bool>>,
    handle: Option<JoinHandle<()>>,
}

/// Consumer that moves queue messages into the index.
///
/// States are `Stopped` and `Running`. `start` while running and `stop` while stopped
/// are no-ops. At most one poll loop exists at a time: `start` waits for a previous
/// loop to finish its in-flight cycle before spawning a new one.
pub struct QueueConsumer {
    transport: Arc<dyn QueueTransport>,
    pipeline: Arc<SyncPipeline>,
    settings: ConsumerSettings,
    running: AtomicBool,
    stats: Mutex<ConsumerStats>,
    control: tokio::sync::Mutex<LoopControl>,
}

impl QueueConsumer {
    pub fn new(
        transport: Arc<dyn QueueTransport>,
        pipeline: Arc<SyncPipeline>,
        settings: ConsumerSettings,
    ) -> Self {
        Self {
            transport,
            pipeline,
            settings,
            running: AtomicBool::new(false),
            stats: Mutex::new(ConsumerStats::default()),
            control: tokio::sync::Mutex::new(LoopControl::default()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> ConsumerStats {
        self.stats_lock().clone()
    }

    fn stats_lock(&self) -> MutexGuard<'_, ConsumerStats> {
        self.stats.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Spawn the poll loop. The first cycle starts immediately.
    pub async fn start(self: &Arc<Self>) {
        let mut control = self.control.lock().await;
        if self.is_running() {
            debug!("Queue consumer already running");
            return;
        }

        if let Some(previous) = control.handle.take() {
            debug!("Waiting for previous poll loop to finish");
            if let Err(e) = previous.await {
                warn!(error = %e, "Previous poll loop ended abnormally");
            }
        }

        let (cancel_tx, cancel_rx) = watch::channel(false);
        self.running.store(true, Ordering::SeqCst);

        let consumer = Arc::clone(self);
        control.handle = Some(tokio::spawn(async move {
            consumer.run(cancel_rx).await;
        }));
        control.cancel = Some(cancel_tx);

        info!(
            poll_interval_ms = self.settings.poll_interval.as_millis() as u64,
            batch_size = self.settings.receive.max_messages,
            "Queue consumer started"
        );
    }

    /// Stop scheduling new cycles. A cycle already in flight runs to completion in
    /// the background.
    pub async fn stop(&self) {
        let mut control = self.control.lock().await;
        if !self.running.swap(false, Ordering::SeqCst) {
            debug!("Queue consumer already stopped");
            return;
        }
        if let Some(cancel) = control.cancel.take() {
            let _ = cancel.send(true);
        }
        info!("Queue consumer stopped");
    }

    /// Wait for the poll loop to exit. Call after [`stop`](Self::stop) for a graceful
    /// shutdown.
    pub async fn join(&self) {
        let handle = self.control.lock().await.handle.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "Poll loop ended abnormally");
            }
        }
    }

    async fn run(self: Arc<Self>, mut cancel: watch::Receiver<bool>) {
        loop {
            if *cancel.borrow() {
                break;
            }

            match self.poll_once().await {
                Ok(summary) if summary.received > 0 => {
                    info!(
                        received = summary.received,
                        processed = summary.processed,
                        failed = summary.failed,
                        deleted = summary.deleted,
                        retained = summary.retained,
                        "Poll cycle complete"
                    );
                }
                Ok(_) => debug!("Poll cycle found no messages"),
                Err(e) => {
                    error!(error = %e, "Poll cycle failed");
                    let mut stats = self.stats_lock();
                    stats.poll_errors += 1;
                    stats.last_error = Some(e.to_string());
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
                changed = cancel.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        debug!("Poll loop exited");
    }

    /// Run one receive → normalize → apply → delete cycle.
    #[instrument(skip(self))]
    pub async fn poll_once(&self) -> Result<PollSummary, IngestError> {
        let messages = self.transport.receive(&self.settings.receive).await?;
        let mut summary = PollSummary {
            received: messages.len(),
            ..PollSummary::default()
        };

        let mut valid_messages: Vec<QueueMessage> = Vec::with_capacity(messages.len());
        let mut events: Vec<ChangeEvent> = Vec::with_capacity(messages.len());

        for message in messages {
            if let Some(count) = message.receive_count() {
                if count > self.settings.max_retries {
                    summary.over_retry_limit += 1;
                    warn!(
                        message_id = %message.id,
                        receive_count = count,
                        max_retries = self.settings.max_retries,
                        "Message exceeded retry limit; should be moved to the dead-letter queue"
                    );
                }
            }

            match self.pipeline.admit_body(&message.body, QUEUE_SOURCE) {
                Ok(event) => {
                    events.push(event);
                    valid_messages.push(message);
                }
                Err(e) => {
                    warn!(message_id = %message.id, error = %e, "Discarding invalid message");
                    summary.invalid += 1;
                    summary.failed += 1;
                    summary.deleted += self.delete_all(std::slice::from_ref(&message)).await;
                }
            }
        }

        if !events.is_empty() {
            let result = self.pipeline.apply(&events).await;
            summary.processed = result.processed;
            summary.failed += result.failed;

            let ratio = summary.success_ratio();
            if ratio >= self.settings.delete_success_ratio {
                summary.deleted += self.delete_all(&valid_messages).await;
            } else {
                summary.retained = valid_messages.len();
                warn!(
                    success_ratio = ratio,
                    threshold = self.settings.delete_success_ratio,
                    retained = summary.retained,
                    errors = ?result.errors,
                    "Batch below success threshold; leaving messages for redelivery"
                );
            }
        }

        self.record_poll(&summary);
        Ok(summary)
    }

    /// Delete messages concurrently. Returns how many were deleted.
    async fn delete_all(&self, messages: &[QueueMessage]) -> usize {
        let deletions = messages
            .iter()
            .filter(|m| !m.receipt_handle.is_empty())
            .map(|m| async move {
                match self.transport.delete(&m.receipt_handle).await {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(message_id = %m.id, error = %e, "Failed to delete message");
                        false
                    }
                }
            });
        join_all(deletions).await.into_iter().filter(|ok| *ok).count()
    }

    fn record_poll(&self, summary: &PollSummary) {
        let mut stats = self.stats_lock();
        stats.polls += 1;
        stats.messages_received += summary.received as u64;
        stats.messages_deleted += summary.deleted as u64;
        stats.messages_retained += summary.retained as u64;
        stats.invalid_messages += summary.invalid as u64;
        stats.last_poll_at = Some(Utc::now());
        stats.last_poll = Some(summary.clone());
    }
}
