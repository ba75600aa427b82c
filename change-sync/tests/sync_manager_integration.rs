//! Integration tests for the sync manager.
//!
//! These tests run the real manager, consumer and processor against in-memory
//! recorders of the queue transport and the index writer.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::time::{sleep, timeout};

use change_sync::config::{QueueSettings, SyncConfig};
use change_sync::consumer::{QueueMessage, QueueTransport, ReceiveOptions};
use change_sync::errors::IngestError;
use change_sync::metrics::MetricsCollector;
use change_sync::SyncManager;
use change_sync_repository::{
    BatchOperationResult, BatchOperationSummary, CollectionSchema, IndexDocument,
    IndexWriteError, IndexWriter,
};

// Mock queue: hands out scripted batches and records deletions
#[derive(Default)]
struct RecordingQueue {
    batches: Mutex<VecDeque<Vec<QueueMessage>>>,
    deleted: Mutex<Vec<String>>,
    receives: AtomicUsize,
}

impl RecordingQueue {
    fn push(&self, batch: Vec<QueueMessage>) {
        self.batches.lock().unwrap().push_back(batch);
    }

    fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueueTransport for RecordingQueue {
    async fn receive(&self, _options: &ReceiveOptions) -> Result<Vec<QueueMessage>, IngestError> {
        self.receives.fetch_add(1, Ordering::SeqCst);
        Ok(self.batches.lock().unwrap().pop_front().unwrap_or_default())
    }

    async fn delete(&self, receipt_handle: &str) -> Result<(), IngestError> {
        self.deleted.lock().unwrap().push(receipt_handle.to_string());
        Ok(())
    }
}

// Mock index writer: records every write, optionally failing all of them
#[derive(Default)]
struct RecordingWriter {
    collections: Mutex<Vec<String>>,
    writes: Mutex<Vec<(String, Vec<IndexDocument>)>>,
    deletes: Mutex<Vec<(String, Vec<String>)>>,
    fail_writes: AtomicBool,
}

impl RecordingWriter {
    fn written_ids(&self, collection: &str) -> Vec<String> {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _)| name == collection)
            .flat_map(|(_, docs)| docs.iter().map(|d| d["id"].as_str().unwrap().to_string()))
            .collect()
    }
}

#[async_trait]
impl IndexWriter for RecordingWriter {
    async fn create_collection(
        &self,
        name: &str,
        _schema: &CollectionSchema,
    ) -> Result<(), IndexWriteError> {
        self.collections.lock().unwrap().push(name.to_string());
        Ok(())
    }

    async fn index_documents(
        &self,
        name: &str,
        documents: &[IndexDocument],
    ) -> Result<BatchOperationSummary, IndexWriteError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(IndexWriteError::bulk_index("cluster unavailable"));
        }
        self.writes
            .lock()
            .unwrap()
            .push((name.to_string(), documents.to_vec()));
        Ok(BatchOperationSummary::from_results(
            documents
                .iter()
                .map(|d| BatchOperationResult::success(d["id"].as_str().unwrap_or_default()))
                .collect(),
        ))
    }

    async fn delete_documents(
        &self,
        name: &str,
        document_ids: &[String],
    ) -> Result<BatchOperationSummary, IndexWriteError> {
        self.deletes
            .lock()
            .unwrap()
            .push((name.to_string(), document_ids.to_vec()));
        Ok(BatchOperationSummary::from_results(
            document_ids.iter().map(BatchOperationResult::success).collect(),
        ))
    }
}

fn config() -> SyncConfig {
    SyncConfig {
        queue: Some(QueueSettings {
            queue_url: "http://localhost:4566/000000000000/changes".to_string(),
            region: Some("us-east-1".to_string()),
            endpoint_url: None,
        }),
        poll_interval: Duration::from_millis(10),
        wait_time_secs: 0,
        ..SyncConfig::default()
    }
}

fn setup() -> (Arc<SyncManager>, Arc<RecordingQueue>, Arc<RecordingWriter>) {
    let queue = Arc::new(RecordingQueue::default());
    let writer = Arc::new(RecordingWriter::default());
    let manager = Arc::new(SyncManager::new(
        config(),
        writer.clone(),
        Some(queue.clone() as Arc<dyn QueueTransport>),
        Arc::new(MetricsCollector::new()),
    ));
    (manager, queue, writer)
}

fn message(n: usize, body: String) -> QueueMessage {
    QueueMessage {
        id: format!("m-{}", n),
        body,
        attributes: HashMap::new(),
        receipt_handle: format!("r-{}", n),
    }
}

fn catalog_insert(n: usize) -> QueueMessage {
    let body = json!({
        "eventType": "INSERT",
        "documentType": "catalog",
        "data": {"sku": format!("sku-{}", n), "price": 9.5, "stock_quantity": 3}
    });
    message(n, body.to_string())
}

fn garbage(n: usize) -> QueueMessage {
    message(n, "definitely not json".to_string())
}

/// Wait until `condition` holds, failing the test after two seconds.
async fn wait_for<F>(condition: F)
where
    F: Fn() -> bool,
{
    timeout(Duration::from_secs(2), async {
        while !condition() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn test_valid_and_invalid_messages_from_queue() {
    let (manager, queue, writer) = setup();
    queue.push(vec![
        catalog_insert(1),
        catalog_insert(2),
        catalog_insert(3),
        catalog_insert(4),
        garbage(5),
    ]);

    manager.start().await.unwrap();
    wait_for(|| queue.deleted().len() == 5).await;
    manager.shutdown().await;

    let mut ids = writer.written_ids("catalog");
    ids.sort();
    assert_eq!(ids, vec!["sku-1", "sku-2", "sku-3", "sku-4"]);

    let status = manager.get_status();
    assert_eq!(status.metrics.received, 5);
    assert_eq!(status.metrics.processed, 4);
    assert_eq!(status.metrics.failed, 1);
    let consumer = status.consumer.unwrap();
    assert_eq!(consumer.messages_deleted, 5);
    assert_eq!(consumer.invalid_messages, 1);
}

#[tokio::test]
async fn test_failed_writes_leave_messages_on_queue() {
    let (manager, queue, writer) = setup();
    writer.fail_writes.store(true, Ordering::SeqCst);
    queue.push(vec![catalog_insert(1), catalog_insert(2), garbage(3)]);

    manager.start().await.unwrap();
    wait_for(|| {
        manager
            .get_status()
            .consumer
            .is_some_and(|c| c.messages_retained == 2)
    })
    .await;
    manager.shutdown().await;

    // Only the undecodable message is discarded
    assert_eq!(queue.deleted(), vec!["r-3".to_string()]);
    assert_eq!(manager.get_status().metrics.failed, 3);
}

#[tokio::test]
async fn test_stop_and_resume_polling() {
    let (manager, queue, writer) = setup();

    manager.start().await.unwrap();
    assert!(manager.is_running());
    wait_for(|| queue.receives.load(Ordering::SeqCst) > 0).await;

    manager.stop().await;
    assert!(!manager.is_running());
    let status = manager.get_status();
    assert!(status.started_at.is_none());
    assert!(!status.consumer_running);

    queue.push(vec![catalog_insert(7)]);
    manager.start().await.unwrap();
    assert!(manager.is_running());
    assert!(manager.get_status().consumer_running);
    wait_for(|| queue.deleted() == vec!["r-7".to_string()]).await;
    manager.shutdown().await;

    assert_eq!(writer.written_ids("catalog"), vec!["sku-7"]);
    assert!(!manager.is_running());
}

#[tokio::test]
async fn test_health_check_while_running() {
    let (manager, queue, _writer) = setup();
    queue.push(vec![catalog_insert(1), catalog_insert(2)]);

    manager.start().await.unwrap();
    wait_for(|| queue.deleted().len() == 2).await;

    let health = manager.health_check();
    assert!(health.healthy, "{:?}", health.reason);
    assert!(health.reason.is_none());
    assert_eq!(health.error_rate, 0.0);

    manager.shutdown().await;
    let health = manager.health_check();
    assert!(!health.healthy);
    assert!(!health.running);
}

#[tokio::test]
async fn test_process_batch_manually() {
    let (manager, _queue, writer) = setup();
    let raws = vec![
        json!({
            "eventType": "INSERT",
            "documentType": "claims",
            "data": {"claimId": "c-1", "claimStatus": "pending"}
        }),
        json!({
            "eventType": "DELETE",
            "documentType": "locations",
            "data": {"locationId": "loc-9"}
        }),
        json!({
            "eventType": "BULK_UPDATE",
            "documentType": "catalog",
            "data": {"documents": []}
        }),
        json!(42),
    ];

    let outcome = manager.process_batch(&raws, "manual").await;

    assert!(!outcome.success);
    assert_eq!(outcome.total, 4);
    assert_eq!(outcome.processed, 2);
    assert_eq!(outcome.failed, 2);
    let rejected: Vec<usize> = outcome.rejections.iter().map(|r| r.index).collect();
    assert_eq!(rejected, vec![2, 3]);
    assert_eq!(outcome.rejections[1].original, json!(42));

    assert_eq!(writer.written_ids("claims"), vec!["c-1"]);
    let deletes = writer.deletes.lock().unwrap().clone();
    assert_eq!(deletes, vec![("locations".to_string(), vec!["loc-9".to_string()])]);
}

#[tokio::test]
async fn test_upsert_twice_keeps_one_document_id() {
    let (manager, _queue, writer) = setup();
    let raw = json!({
        "eventType": "UPDATE",
        "documentType": "claims",
        "data": {"claimId": "c-2", "claimStatus": "approved"}
    });

    assert!(manager.process_event(&raw, "manual").await.success);
    assert!(manager.process_event(&raw, "manual").await.success);

    // Both writes target the same document id, so the index holds one document
    assert_eq!(writer.written_ids("claims"), vec!["c-2", "c-2"]);
    let writes = writer.writes.lock().unwrap();
    assert_eq!(writes[0].1[0]["claimStatus"], writes[1].1[0]["claimStatus"]);
}

#[tokio::test]
async fn test_export_metrics() {
    let (manager, _queue, _writer) = setup();
    let raw = json!({
        "eventType": "INSERT",
        "documentType": "catalog",
        "data": {"sku": "sku-1", "price": 1.0, "stock_quantity": 1}
    });
    manager.process_event(&raw, "manual").await;
    manager.process_event(&json!("nope"), "manual").await;

    let export = manager.export_metrics();

    assert_eq!(export.snapshot.received, 2);
    assert_eq!(export.snapshot.processed, 1);
    assert_eq!(export.snapshot.failed, 1);
    assert!((export.snapshot.error_rate - 0.5).abs() < 1e-9);
    let text = export.exposition.unwrap();
    assert!(text.contains("change_sync_events_processed_total 1"));
    assert!(text.contains("change_sync_events_failed_total 1"));
}
