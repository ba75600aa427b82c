//! Change processor implementation.
//!
//! Applies canonical change events to the search index. Events are grouped by
//! `(document kind, event kind)` so each group becomes one bulk write.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use change_sync_repository::{BatchOperationSummary, IndexWriteError, IndexWriter};
use change_sync_shared::{
    bulk_document_ids, bulk_documents, resolve_document_id, ChangeEvent, DocumentKind,
    EventKind,
};

use crate::metrics::error_rate;
use crate::processor::document::to_index_document;
use crate::processor::routing::{collection_name, collection_schema};

/// Maximum number of error strings kept in a [`BatchResult`].
pub const MAX_BATCH_ERRORS: usize = 100;

/// Failures since the last health reset at which the processor reports unhealthy.
pub const UNHEALTHY_FAILURE_THRESHOLD: u64 = 10;

/// Outcome of applying a batch of events.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    /// Events applied, including deletes recorded but not applied.
    pub processed: usize,
    pub failed: usize,
    /// One entry per failed unit, capped at [`MAX_BATCH_ERRORS`].
    pub errors: Vec<String>,
    pub duration_ms: u64,
    /// Deletes counted as processed although the index does not support deletion.
    pub unapplied: usize,
}

impl BatchResult {
    fn push_error(&mut self, message: String) {
        if self.errors.len() < MAX_BATCH_ERRORS {
            self.errors.push(message);
        }
    }

    fn fail(&mut self, event: &ChangeEvent, message: impl std::fmt::Display) {
        self.failed += 1;
        self.push_error(format!("{}: {}", event.id, message));
    }
}

/// Health view of the processor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessorHealth {
    pub healthy: bool,
    pub failures_since_reset: u64,
    pub processed_total: u64,
    pub failed_total: u64,
    pub error_rate: f64,
    pub last_processed_at: Option<DateTime<Utc>>,
}

/// Applies canonical events to the index through an [`IndexWriter`].
///
/// Holds no state across calls beyond its health counters, so one instance is safely
/// shared by the poll loop and concurrent manual calls.
pub struct ChangeProcessor {
    writer: Arc<dyn IndexWriter>,
    processed_total: AtomicU64,
    failed_total: AtomicU64,
    failures_since_reset: AtomicU64,
    last_processed_at: Mutex<Option<DateTime<Utc>>>,
}

impl ChangeProcessor {
    /// Create a new processor writing through the given writer.
    pub fn new(writer: Arc<dyn IndexWriter>) -> Self {
        Self {
            writer,
            processed_total: AtomicU64::new(0),
            failed_total: AtomicU64::new(0),
            failures_since_reset: AtomicU64::new(0),
            last_processed_at: Mutex::new(None),
        }
    }

    /// Create every routed collection that does not exist yet.
    pub async fn ensure_collections(&self) -> Result<(), IndexWriteError> {
        for kind in DocumentKind::ALL {
            let schema = collection_schema(kind);
            self.writer
                .create_collection(collection_name(kind), &schema)
                .await?;
        }
        info!(collections = DocumentKind::ALL.len(), "Collections ready");
        Ok(())
    }

    /// Apply a single event. Returns whether it was applied (or recorded).
    pub async fn apply_one(&self, event: &ChangeEvent) -> bool {
        let result = self.apply_batch(std::slice::from_ref(event)).await;
        result.failed == 0
    }

    /// Apply a batch of events.
    ///
    /// Events are grouped by `(document kind, event kind)`; each group is written with
    /// one bulk call. A failing group does not affect the others. Order within a group
    /// is not preserved.
    #[instrument(skip(self, events), fields(event_count = events.len()))]
    pub async fn apply_batch(&self, events: &[ChangeEvent]) -> BatchResult {
        let start = Instant::now();
        let mut result = BatchResult::default();

        let mut groups: Vec<((DocumentKind, EventKind), Vec<&ChangeEvent>)> = Vec::new();
        for event in events {
            let Some(kind) = event.document_kind else {
                result.fail(event, "no document kind");
                continue;
            };
            let key = (kind, event.event_kind);
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, members)) => members.push(event),
                None => groups.push((key, vec![event])),
            }
        }

        for ((kind, event_kind), members) in groups {
            match event_kind {
                EventKind::Insert | EventKind::Update | EventKind::BulkUpdate => {
                    self.apply_upserts(kind, &members, &mut result).await
                }
                EventKind::Delete | EventKind::BulkDelete => {
                    self.apply_deletes(kind, &members, &mut result).await
                }
            }
        }

        result.duration_ms = start.elapsed().as_millis() as u64;
        self.record(&result);

        if result.failed > 0 {
            warn!(
                processed = result.processed,
                failed = result.failed,
                duration_ms = result.duration_ms,
                "Batch applied with failures"
            );
        } else {
            debug!(
                processed = result.processed,
                duration_ms = result.duration_ms,
                "Batch applied"
            );
        }
        result
    }

    /// Upsert every document of a group in one call.
    ///
    /// `owners[i]` is the index in `members` of the event that produced document `i`,
    /// so bulk updates with several documents map failures back to their event.
    async fn apply_upserts(
        &self,
        kind: DocumentKind,
        members: &[&ChangeEvent],
        result: &mut BatchResult,
    ) {
        let name = collection_name(kind);
        let schema = collection_schema(kind);
        let mut documents = Vec::new();
        let mut owners = Vec::new();
        let mut rejected = vec![false; members.len()];

        for (pos, event) in members.iter().enumerate() {
            let payloads: Vec<(&serde_json::Value, String)> = match event.event_kind {
                EventKind::BulkUpdate => bulk_documents(&event.payload)
                    .map(|docs| {
                        docs.iter()
                            .enumerate()
                            .map(|(i, doc)| (doc, format!("{}-{}", event.id, i)))
                            .collect()
                    })
                    .unwrap_or_default(),
                _ => vec![(&event.payload, event.id.clone())],
            };
            if payloads.is_empty() {
                rejected[pos] = true;
                result.fail(event, "bulk update without documents");
                continue;
            }

            let built: Result<Vec<_>, _> = payloads
                .iter()
                .map(|(payload, fallback_id)| {
                    to_index_document(payload, kind, fallback_id, event.occurred_at_ms, &schema)
                })
                .collect();
            match built {
                Ok(docs) => {
                    owners.extend(std::iter::repeat(pos).take(docs.len()));
                    documents.extend(docs);
                }
                Err(e) => {
                    rejected[pos] = true;
                    result.fail(event, e);
                }
            }
        }

        if documents.is_empty() {
            return;
        }

        match self.writer.index_documents(name, &documents).await {
            Ok(summary) => {
                let failures = per_event_failures(&summary, &owners, members.len());
                for (pos, event) in members.iter().enumerate() {
                    if rejected[pos] {
                        continue;
                    }
                    match &failures[pos] {
                        Some(message) => result.fail(event, message),
                        None => result.processed += 1,
                    }
                }
            }
            Err(e) => {
                error!(collection = %name, error = %e, documents = documents.len(), "Upsert failed");
                for (pos, event) in members.iter().enumerate() {
                    if !rejected[pos] {
                        result.fail(event, &e);
                    }
                }
            }
        }
    }

    /// Delete every identifier of a group in one call.
    async fn apply_deletes(
        &self,
        kind: DocumentKind,
        members: &[&ChangeEvent],
        result: &mut BatchResult,
    ) {
        let name = collection_name(kind);
        let mut ids = Vec::new();
        let mut owners = Vec::new();
        let mut accepted = Vec::new();

        for (pos, event) in members.iter().enumerate() {
            let resolved = match event.event_kind {
                EventKind::BulkDelete => bulk_document_ids(&event.payload, Some(kind)),
                _ => resolve_document_id(&event.payload, Some(kind)).map(|id| vec![id]),
            };
            match resolved {
                Some(event_ids) if !event_ids.is_empty() => {
                    owners.extend(std::iter::repeat(pos).take(event_ids.len()));
                    ids.extend(event_ids);
                    accepted.push(pos);
                }
                _ => result.fail(event, "could not resolve document id"),
            }
        }

        if ids.is_empty() {
            return;
        }

        match self.writer.delete_documents(name, &ids).await {
            Ok(summary) => {
                let failures = per_event_failures(&summary, &owners, members.len());
                for pos in accepted {
                    match &failures[pos] {
                        Some(message) => result.fail(members[pos], message),
                        None => result.processed += 1,
                    }
                }
            }
            Err(e) if e.is_unsupported() => {
                warn!(
                    collection = %name,
                    documents = ids.len(),
                    "Index does not support deletion; delete recorded but not applied"
                );
                result.processed += accepted.len();
                result.unapplied += accepted.len();
            }
            Err(e) => {
                error!(collection = %name, error = %e, documents = ids.len(), "Delete failed");
                for pos in accepted {
                    result.fail(members[pos], &e);
                }
            }
        }
    }

    fn record(&self, result: &BatchResult) {
        self.processed_total
            .fetch_add(result.processed as u64, Ordering::Relaxed);
        self.failed_total
            .fetch_add(result.failed as u64, Ordering::Relaxed);
        self.failures_since_reset
            .fetch_add(result.failed as u64, Ordering::Relaxed);
        if result.processed > 0 {
            *self.last_processed_lock() = Some(Utc::now());
        }
    }

    fn last_processed_lock(&self) -> std::sync::MutexGuard<'_, Option<DateTime<Utc>>> {
        self.last_processed_at
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    /// False once failures since the last reset reach the threshold.
    pub fn is_healthy(&self) -> bool {
        self.failures_since_reset.load(Ordering::Relaxed) < UNHEALTHY_FAILURE_THRESHOLD
    }

    /// When an event was last applied.
    pub fn last_processed_at(&self) -> Option<DateTime<Utc>> {
        *self.last_processed_lock()
    }

    /// Lifetime `failed / (processed + failed)`.
    pub fn error_rate(&self) -> f64 {
        error_rate(
            self.processed_total.load(Ordering::Relaxed),
            self.failed_total.load(Ordering::Relaxed),
        )
    }

    pub fn health(&self) -> ProcessorHealth {
        ProcessorHealth {
            healthy: self.is_healthy(),
            failures_since_reset: self.failures_since_reset.load(Ordering::Relaxed),
            processed_total: self.processed_total.load(Ordering::Relaxed),
            failed_total: self.failed_total.load(Ordering::Relaxed),
            error_rate: self.error_rate(),
            last_processed_at: self.last_processed_at(),
        }
    }

    /// Clear the failure count that drives [`is_healthy`](Self::is_healthy).
    pub fn reset_health(&self) {
        self.failures_since_reset.store(0, Ordering::Relaxed);
    }
}

/// Map per-document results back to the events that produced them.
///
/// Returns one slot per event holding the first failure message, if any. When the
/// writer reports fewer results than documents sent, the missing ones count as failed.
fn per_event_failures(
    summary: &BatchOperationSummary,
    owners: &[usize],
    event_count: usize,
) -> Vec<Option<String>> {
    let mut failures: Vec<Option<String>> = vec![None; event_count];
    for (doc_pos, owner) in owners.iter().enumerate() {
        if failures[*owner].is_some() {
            continue;
        }
        failures[*owner] = match summary.results.get(doc_pos) {
            Some(r) if r.success => None,
            Some(r) => Some(
                r.error
                    .as_ref()
                    .map(|e| format!("document {}: {}", r.document_id, e))
                    .unwrap_or_else(|| format!("document {} failed", r.document_id)),
            ),
            None => Some("missing result from index writer".to_string()),
        };
    }
    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use change_sync_repository::{BatchOperationResult, CollectionSchema, IndexDocument};
    use serde_json::{json, Value};

    /// Writer that keeps documents in memory, keyed by collection and id.
    #[derive(Default)]
    struct MemoryWriter {
        collections: Mutex<std::collections::HashMap<String, std::collections::BTreeMap<String, IndexDocument>>>,
        index_calls: Mutex<Vec<(String, usize)>>,
        fail_collection: Option<&'static str>,
        reject_id: Option<&'static str>,
        supports_delete: bool,
    }

    impl MemoryWriter {
        fn docs(&self, name: &str) -> Vec<IndexDocument> {
            self.collections
                .lock()
                .unwrap()
                .get(name)
                .map(|c| c.values().cloned().collect())
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl IndexWriter for MemoryWriter {
        async fn create_collection(
            &self,
            name: &str,
            _schema: &CollectionSchema,
        ) -> Result<(), IndexWriteError> {
            self.collections
                .lock()
                .unwrap()
                .entry(name.to_string())
                .or_default();
            Ok(())
        }

        async fn index_documents(
            &self,
            name: &str,
            documents: &[IndexDocument],
        ) -> Result<BatchOperationSummary, IndexWriteError> {
            self.index_calls
                .lock()
                .unwrap()
                .push((name.to_string(), documents.len()));
            if self.fail_collection == Some(name) {
                return Err(IndexWriteError::bulk_index("connection reset"));
            }
            let mut collections = self.collections.lock().unwrap();
            let collection = collections.entry(name.to_string()).or_default();
            let results = documents
                .iter()
                .map(|doc| {
                    let id = doc["id"].as_str().unwrap_or_default().to_string();
                    if self.reject_id == Some(id.as_str()) {
                        return BatchOperationResult::failure(id, IndexWriteError::index("mapping"));
                    }
                    collection.insert(id.clone(), doc.clone());
                    BatchOperationResult::success(id)
                })
                .collect();
            Ok(BatchOperationSummary::from_results(results))
        }

        async fn delete_documents(
            &self,
            name: &str,
            document_ids: &[String],
        ) -> Result<BatchOperationSummary, IndexWriteError> {
            if !self.supports_delete {
                return Err(IndexWriteError::unsupported("delete_documents"));
            }
            let mut collections = self.collections.lock().unwrap();
            let collection = collections.entry(name.to_string()).or_default();
            let results = document_ids
                .iter()
                .map(|id| {
                    collection.remove(id);
                    BatchOperationResult::success(id.clone())
                })
                .collect();
            Ok(BatchOperationSummary::from_results(results))
        }
    }

    fn event(kind: EventKind, doc: DocumentKind, payload: Value) -> ChangeEvent {
        ChangeEvent::new(kind, Some(doc), payload, "test")
    }

    #[tokio::test]
    async fn test_claims_insert_is_one_upsert() {
        let writer = Arc::new(MemoryWriter::default());
        let processor = ChangeProcessor::new(writer.clone());

        let ev = event(
            EventKind::Insert,
            DocumentKind::Claims,
            json!({"claimId": "c-1", "claimStatus": "pending", "document_type": "claims"}),
        );
        assert!(processor.apply_one(&ev).await);

        assert_eq!(*writer.index_calls.lock().unwrap(), vec![("claims".to_string(), 1)]);
        let docs = writer.docs("claims");
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["id"], json!("c-1"));
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let writer = Arc::new(MemoryWriter::default());
        let processor = ChangeProcessor::new(writer.clone());
        let ev = event(
            EventKind::Update,
            DocumentKind::Catalog,
            json!({"sku": "A-1", "price": 10.0}),
        );

        processor.apply_one(&ev).await;
        let once = writer.docs("catalog");
        processor.apply_one(&ev).await;
        let twice = writer.docs("catalog");

        assert_eq!(once, twice);
        assert_eq!(twice.len(), 1);
    }

    #[tokio::test]
    async fn test_batch_groups_by_kind_and_event() {
        let writer = Arc::new(MemoryWriter::default());
        let processor = ChangeProcessor::new(writer.clone());

        let events = vec![
            event(EventKind::Insert, DocumentKind::Catalog, json!({"sku": "a"})),
            event(EventKind::Insert, DocumentKind::Catalog, json!({"sku": "b"})),
            event(EventKind::Update, DocumentKind::Catalog, json!({"sku": "c"})),
            event(EventKind::Insert, DocumentKind::Locations, json!({"storeId": "s"})),
        ];
        let result = processor.apply_batch(&events).await;

        assert_eq!(result.processed, 4);
        assert_eq!(result.failed, 0);
        let calls = writer.index_calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 3);
        assert!(calls.contains(&("catalog".to_string(), 2)));
        assert!(calls.contains(&("catalog".to_string(), 1)));
        assert!(calls.contains(&("locations".to_string(), 1)));
    }

    #[tokio::test]
    async fn test_bulk_update_writes_every_document() {
        let writer = Arc::new(MemoryWriter::default());
        let processor = ChangeProcessor::new(writer.clone());

        let ev = event(
            EventKind::BulkUpdate,
            DocumentKind::Catalog,
            json!({"documents": [{"sku": "a"}, {"sku": "b"}, {"sku": "c"}]}),
        );
        let result = processor.apply_batch(&[ev]).await;

        assert_eq!(result.processed, 1);
        assert_eq!(*writer.index_calls.lock().unwrap(), vec![("catalog".to_string(), 3)]);
        assert_eq!(writer.docs("catalog").len(), 3);
    }

    #[tokio::test]
    async fn test_group_failure_is_isolated() {
        let writer = Arc::new(MemoryWriter {
            fail_collection: Some("claims"),
            ..Default::default()
        });
        let processor = ChangeProcessor::new(writer.clone());

        let events = vec![
            event(EventKind::Insert, DocumentKind::Claims, json!({"claimId": "c-1"})),
            event(EventKind::Insert, DocumentKind::Claims, json!({"claimId": "c-2"})),
            event(EventKind::Insert, DocumentKind::Catalog, json!({"sku": "a"})),
        ];
        let result = processor.apply_batch(&events).await;

        assert_eq!(result.processed, 1);
        assert_eq!(result.failed, 2);
        assert_eq!(result.errors.len(), 2);
        assert!(result.errors[0].contains("connection reset"));
        assert_eq!(writer.docs("catalog").len(), 1);
    }

    #[tokio::test]
    async fn test_partial_document_failure_fails_only_its_event() {
        let writer = Arc::new(MemoryWriter {
            reject_id: Some("bad"),
            ..Default::default()
        });
        let processor = ChangeProcessor::new(writer.clone());

        let events = vec![
            event(EventKind::Insert, DocumentKind::Catalog, json!({"sku": "good"})),
            event(EventKind::Insert, DocumentKind::Catalog, json!({"sku": "bad"})),
        ];
        let result = processor.apply_batch(&events).await;

        assert_eq!(result.processed, 1);
        assert_eq!(result.failed, 1);
        assert!(result.errors[0].contains("document bad"));
    }

    #[tokio::test]
    async fn test_delete_applied_when_supported() {
        let writer = Arc::new(MemoryWriter {
            supports_delete: true,
            ..Default::default()
        });
        let processor = ChangeProcessor::new(writer.clone());

        processor
            .apply_one(&event(EventKind::Insert, DocumentKind::Claims, json!({"claimId": "c-1"})))
            .await;
        let result = processor
            .apply_batch(&[event(EventKind::Delete, DocumentKind::Claims, json!("c-1"))])
            .await;

        assert_eq!(result.processed, 1);
        assert_eq!(result.unapplied, 0);
        assert!(writer.docs("claims").is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_delete_is_recorded_not_applied() {
        let writer = Arc::new(MemoryWriter::default());
        let processor = ChangeProcessor::new(writer.clone());

        let result = processor
            .apply_batch(&[
                event(EventKind::Delete, DocumentKind::Catalog, json!({"sku": "a"})),
                event(EventKind::BulkDelete, DocumentKind::Catalog, json!({"documentIds": ["b", "c"]})),
            ])
            .await;

        assert_eq!(result.processed, 2);
        assert_eq!(result.failed, 0);
        assert_eq!(result.unapplied, 2);
    }

    #[tokio::test]
    async fn test_unresolvable_delete_fails() {
        let processor = ChangeProcessor::new(Arc::new(MemoryWriter::default()));
        let result = processor
            .apply_batch(&[event(EventKind::Delete, DocumentKind::Catalog, json!({"name": "?"}))])
            .await;
        assert_eq!(result.failed, 1);
    }

    #[tokio::test]
    async fn test_health_after_repeated_failures() {
        let writer = Arc::new(MemoryWriter {
            fail_collection: Some("catalog"),
            ..Default::default()
        });
        let processor = ChangeProcessor::new(writer);
        assert!(processor.is_healthy());

        let events: Vec<_> = (0..UNHEALTHY_FAILURE_THRESHOLD)
            .map(|i| event(EventKind::Insert, DocumentKind::Catalog, json!({"sku": i})))
            .collect();
        processor.apply_batch(&events).await;

        assert!(!processor.is_healthy());
        assert_eq!(processor.error_rate(), 1.0);
        assert!(processor.last_processed_at().is_none());

        processor.reset_health();
        assert!(processor.is_healthy());
    }

    #[tokio::test]
    async fn test_error_list_is_bounded() {
        let processor = ChangeProcessor::new(Arc::new(MemoryWriter::default()));
        let events: Vec<_> = (0..MAX_BATCH_ERRORS + 20)
            .map(|_| ChangeEvent::new(EventKind::Insert, None, json!({}), "test"))
            .collect();

        let result = processor.apply_batch(&events).await;
        assert_eq!(result.failed, MAX_BATCH_ERRORS + 20);
        assert_eq!(result.errors.len(), MAX_BATCH_ERRORS);
    }

    #[tokio::test]
    async fn test_ensure_collections_creates_all() {
        let writer = Arc::new(MemoryWriter::default());
        let processor = ChangeProcessor::new(writer.clone());
        processor.ensure_collections().await.unwrap();

        let names: std::collections::BTreeSet<String> =
            writer.collections.lock().unwrap().keys().cloned().collect();
        assert_eq!(names.len(), 3);
        assert!(names.contains("claims"));
    }
}
