//! OpenSearch writer implementation.
//!
//! This module provides the concrete implementation of `IndexWriter` using the
//! OpenSearch Rust crate. Writes go through the bulk API; `index` actions keyed by
//! `_id` give upsert semantics.

use async_trait::async_trait;
use opensearch::{
    http::request::JsonBody,
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    indices::{IndicesCreateParts, IndicesExistsParts},
    BulkParts, OpenSearch,
};
use serde_json::{json, Value};
use tracing::{debug, error, info};
use url::Url;

use crate::errors::IndexWriteError;
use crate::interfaces::IndexWriter;
use crate::opensearch::mappings::collection_body;
use crate::types::{
    document_id, BatchOperationResult, BatchOperationSummary, CollectionSchema, IndexDocument,
};

/// Bulk action used for writes.
#[derive(Debug, Clone, Copy)]
enum BulkAction {
    Index,
    Delete,
}

impl BulkAction {
    fn as_str(&self) -> &'static str {
        match self {
            BulkAction::Index => "index",
            BulkAction::Delete => "delete",
        }
    }
}

/// OpenSearch writer implementation.
///
/// # Example
///
/// ```ignore
/// use change_sync_repository::{IndexWriter, OpenSearchWriter};
///
/// let writer = OpenSearchWriter::new("http://localhost:9200").await?;
/// let doc = serde_json::json!({"id": "c-1", "claim_status": "pending"});
/// writer.index_documents("claims", &[doc.as_object().cloned().unwrap()]).await?;
/// ```
pub struct OpenSearchWriter {
    client: OpenSearch,
}

impl OpenSearchWriter {
    /// Create a new OpenSearch writer connected to the specified URL.
    ///
    /// # Arguments
    ///
    /// * `url` - The OpenSearch server URL (e.g., "http://localhost:9200")
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchWriter)` - A new writer instance
    /// * `Err(IndexWriteError)` - If connection setup fails
    pub async fn new(url: &str) -> Result<Self, IndexWriteError> {
        let parsed_url = Url::parse(url).map_err(|e| IndexWriteError::connection(e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let transport = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .build()
            .map_err(|e| IndexWriteError::connection(e.to_string()))?;

        let client = OpenSearch::new(transport);

        info!(url = %url, "Created OpenSearch writer");

        Ok(Self { client })
    }

    /// Verify the cluster is reachable.
    pub async fn check_connection(&self) -> Result<(), IndexWriteError> {
        let response = self
            .client
            .ping()
            .send()
            .await
            .map_err(|e| IndexWriteError::connection(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            return Err(IndexWriteError::connection(format!(
                "Ping returned status {}",
                status
            )));
        }
        debug!("OpenSearch ping succeeded");
        Ok(())
    }

    /// Send one bulk request and map every item back to a per-document result.
    ///
    /// `lines` holds the NDJSON body; `ids` holds the document id of each action, in
    /// the order the actions appear in the body.
    async fn send_bulk(
        &self,
        name: &str,
        action: BulkAction,
        lines: Vec<JsonBody<Value>>,
        ids: &[String],
    ) -> Result<Vec<BatchOperationResult>, IndexWriteError> {
        let response = self
            .client
            .bulk(BulkParts::Index(name))
            .body(lines)
            .send()
            .await
            .map_err(|e| IndexWriteError::bulk_index(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Bulk request failed");
            return Err(IndexWriteError::bulk_index(format!(
                "Bulk {} failed with status {}: {}",
                action.as_str(),
                status,
                error_body
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| IndexWriteError::parse(e.to_string()))?;
        let items = body["items"].as_array().cloned().unwrap_or_default();

        Ok(ids
            .iter()
            .enumerate()
            .map(|(pos, id)| {
                let item = items.get(pos).and_then(|i| i.get(action.as_str()));
                item_result(id, item, action)
            })
            .collect())
    }
}

/// Interpret one item of a bulk response.
///
/// A `404` on delete counts as success: the document is already gone.
fn item_result(document_id: &str, item: Option<&Value>, action: BulkAction) -> BatchOperationResult {
    let Some(item) = item else {
        return BatchOperationResult::failure(
            document_id,
            IndexWriteError::parse("Missing item in bulk response"),
        );
    };

    let status = item["status"].as_u64().unwrap_or(0);
    let ok = (200..300).contains(&status)
        || (matches!(action, BulkAction::Delete) && status == 404);
    if ok {
        return BatchOperationResult::success(document_id);
    }

    let reason = item["error"]["reason"]
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| format!("status {}", status));
    let error = match action {
        BulkAction::Index => IndexWriteError::index(reason),
        BulkAction::Delete => IndexWriteError::delete(reason),
    };
    BatchOperationResult::failure(document_id, error)
}

#[async_trait]
impl IndexWriter for OpenSearchWriter {
    /// Create the index for a collection, treating an existing index as success.
    async fn create_collection(
        &self,
        name: &str,
        schema: &CollectionSchema,
    ) -> Result<(), IndexWriteError> {
        let exists = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[name]))
            .send()
            .await
            .map_err(|e| IndexWriteError::connection(e.to_string()))?;

        if exists.status_code().is_success() {
            debug!(collection = %name, "Collection already exists");
            return Ok(());
        }

        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(name))
            .body(collection_body(schema))
            .send()
            .await
            .map_err(|e| IndexWriteError::collection_creation(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            // Another instance may have created it between the check and the create.
            if error_body.contains("resource_already_exists_exception") {
                return Ok(());
            }
            error!(status = %status, body = %error_body, "Create index request failed");
            return Err(IndexWriteError::collection_creation(format!(
                "Create index {} failed with status {}: {}",
                name, status, error_body
            )));
        }

        info!(collection = %name, fields = schema.fields.len(), "Created collection");
        Ok(())
    }

    /// Upsert documents with bulk `index` actions keyed by the document id.
    ///
    /// Documents without an id are reported as failed without being sent.
    async fn index_documents(
        &self,
        name: &str,
        documents: &[IndexDocument],
    ) -> Result<BatchOperationSummary, IndexWriteError> {
        let mut results: Vec<Option<BatchOperationResult>> = vec![None; documents.len()];
        let mut lines: Vec<JsonBody<Value>> = Vec::with_capacity(documents.len() * 2);
        let mut sent_ids = Vec::with_capacity(documents.len());
        let mut sent_positions = Vec::with_capacity(documents.len());

        for (pos, document) in documents.iter().enumerate() {
            match document_id(document) {
                Some(id) => {
                    lines.push(json!({ "index": { "_id": id } }).into());
                    lines.push(Value::Object(document.clone()).into());
                    sent_ids.push(id);
                    sent_positions.push(pos);
                }
                None => {
                    results[pos] = Some(BatchOperationResult::failure(
                        "",
                        IndexWriteError::validation("Document has no id"),
                    ));
                }
            }
        }

        if !sent_ids.is_empty() {
            let sent = self
                .send_bulk(name, BulkAction::Index, lines, &sent_ids)
                .await?;
            for (pos, result) in sent_positions.into_iter().zip(sent) {
                results[pos] = Some(result);
            }
        }

        let summary = BatchOperationSummary::from_results(results.into_iter().flatten().collect());
        debug!(
            collection = %name,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Indexed documents"
        );
        Ok(summary)
    }

    /// Delete documents with bulk `delete` actions. Missing documents count as deleted.
    async fn delete_documents(
        &self,
        name: &str,
        document_ids: &[String],
    ) -> Result<BatchOperationSummary, IndexWriteError> {
        if document_ids.is_empty() {
            return Ok(BatchOperationSummary::default());
        }

        let lines: Vec<JsonBody<Value>> = document_ids
            .iter()
            .map(|id| json!({ "delete": { "_id": id } }).into())
            .collect();

        let results = self
            .send_bulk(name, BulkAction::Delete, lines, document_ids)
            .await?;

        let summary = BatchOperationSummary::from_results(results);
        debug!(
            collection = %name,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Deleted documents"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_result_success() {
        let item = json!({"_id": "a", "status": 201});
        let result = item_result("a", Some(&item), BulkAction::Index);
        assert!(result.success);
        assert_eq!(result.document_id, "a");
    }

    #[test]
    fn test_item_result_index_failure_carries_reason() {
        let item = json!({
            "_id": "a",
            "status": 400,
            "error": {"type": "mapper_parsing_exception", "reason": "failed to parse field [price]"}
        });
        let result = item_result("a", Some(&item), BulkAction::Index);
        assert!(!result.success);
        assert!(matches!(result.error, Some(IndexWriteError::IndexError(ref r)) if r.contains("price")));
    }

    #[test]
    fn test_item_result_delete_not_found_is_success() {
        let item = json!({"_id": "gone", "status": 404, "result": "not_found"});
        assert!(item_result("gone", Some(&item), BulkAction::Delete).success);
        // The same status on an index action is a failure.
        assert!(!item_result("gone", Some(&item), BulkAction::Index).success);
    }

    #[test]
    fn test_item_result_missing_item() {
        let result = item_result("x", None, BulkAction::Index);
        assert!(!result.success);
        assert!(matches!(result.error, Some(IndexWriteError::ParseError(_))));
    }
}
