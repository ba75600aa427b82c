//! Request and response types for index-write operations.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::IndexWriteError;

/// A document as written to the index: a JSON object with an `id` field.
pub type IndexDocument = Map<String, Value>;

/// Read the `id` field of a document as a string.
///
/// Numeric ids are stringified; any other shape yields `None`.
pub fn document_id(document: &IndexDocument) -> Option<String> {
    match document.get("id") {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

/// Field types a collection schema can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Full-text searchable string.
    Text,
    /// Exact-match string (ids, statuses).
    Keyword,
    Int,
    Float,
    Bool,
    /// Epoch milliseconds.
    Timestamp,
}

impl FieldType {
    /// Whether documents must carry a numeric value for this field.
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Int | FieldType::Float | FieldType::Timestamp)
    }
}

/// One field of a collection schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    pub field_type: FieldType,
    /// Optional fields may be absent from documents.
    pub optional: bool,
}

/// Schema of an index collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub name: String,
    pub fields: Vec<FieldSchema>,
}

impl CollectionSchema {
    /// Create an empty schema for a collection.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Add a required field.
    pub fn field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.push(FieldSchema {
            name: name.into(),
            field_type,
            optional: false,
        });
        self
    }

    /// Add an optional field.
    pub fn optional_field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.push(FieldSchema {
            name: name.into(),
            field_type,
            optional: true,
        });
        self
    }

    /// Required numeric fields, which writers expect to always be present.
    pub fn required_numeric_fields(&self) -> impl Iterator<Item = &FieldSchema> {
        self.fields
            .iter()
            .filter(|f| !f.optional && f.field_type.is_numeric())
    }
}

/// Result of a batch operation for a single document.
#[derive(Debug, Clone)]
pub struct BatchOperationResult {
    /// The document's identifier (empty if the document had none).
    pub document_id: String,
    /// Whether the operation succeeded.
    pub success: bool,
    /// Error if the operation failed.
    pub error: Option<IndexWriteError>,
}

impl BatchOperationResult {
    /// A successful outcome.
    pub fn success(document_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            success: true,
            error: None,
        }
    }

    /// A failed outcome.
    pub fn failure(document_id: impl Into<String>, error: IndexWriteError) -> Self {
        Self {
            document_id: document_id.into(),
            success: false,
            error: Some(error),
        }
    }
}

/// Summary of a batch operation containing aggregate statistics and individual results.
///
/// `results` is aligned with the request order, so callers can map failures back to
/// the documents they sent.
#[derive(Debug, Clone, Default)]
pub struct BatchOperationSummary {
    /// Total number of documents in the batch.
    pub total: usize,
    /// Number of successful operations.
    pub succeeded: usize,
    /// Number of failed operations.
    pub failed: usize,
    /// Individual results for each document, in request order.
    pub results: Vec<BatchOperationResult>,
}

impl BatchOperationSummary {
    /// Build a summary from per-document results.
    pub fn from_results(results: Vec<BatchOperationResult>) -> Self {
        let succeeded = results.iter().filter(|r| r.success).count();
        Self {
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_id() {
        let doc = json!({"id": "c-1"}).as_object().cloned().unwrap();
        assert_eq!(document_id(&doc), Some("c-1".to_string()));

        let doc = json!({"id": 7}).as_object().cloned().unwrap();
        assert_eq!(document_id(&doc), Some("7".to_string()));

        let doc = json!({"id": ""}).as_object().cloned().unwrap();
        assert_eq!(document_id(&doc), None);

        let doc = json!({"name": "x"}).as_object().cloned().unwrap();
        assert_eq!(document_id(&doc), None);
    }

    #[test]
    fn test_required_numeric_fields() {
        let schema = CollectionSchema::new("catalog")
            .field("id", FieldType::Keyword)
            .field("price", FieldType::Float)
            .optional_field("rating", FieldType::Float)
            .field("updated_at", FieldType::Timestamp);

        let names: Vec<&str> = schema
            .required_numeric_fields()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(names, vec!["price", "updated_at"]);
    }

    #[test]
    fn test_summary_from_results() {
        let summary = BatchOperationSummary::from_results(vec![
            BatchOperationResult::success("a"),
            BatchOperationResult::failure("b", IndexWriteError::index("boom")),
            BatchOperationResult::success("c"),
        ]);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert!(!summary.results[1].success);
    }
}
