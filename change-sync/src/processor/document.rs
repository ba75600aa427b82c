//! Conversion of event payloads into index documents.

use change_sync_repository::{CollectionSchema, FieldType, IndexDocument};
use change_sync_shared::{resolve_document_id, DocumentKind};
use serde_json::{Number, Value};
use tracing::debug;

use crate::errors::IngestError;

/// Build the document written to the index for one payload.
///
/// - `document_type` is set to the document kind
/// - `id` is the payload's identifier, or `fallback_id` when it has none
/// - required numeric fields of `schema` are coerced to numbers, defaulting to zero
///   (timestamps default to `occurred_at_ms`)
///
/// The result depends only on the inputs, so re-applying an event writes the same
/// document.
pub fn to_index_document(
    payload: &Value,
    kind: DocumentKind,
    fallback_id: &str,
    occurred_at_ms: i64,
    schema: &CollectionSchema,
) -> Result<IndexDocument, IngestError> {
    let mut document = payload
        .as_object()
        .cloned()
        .ok_or_else(|| IngestError::parse("Document payload is not an object"))?;

    let id = resolve_document_id(payload, Some(kind)).unwrap_or_else(|| fallback_id.to_string());
    document.insert("id".to_string(), Value::String(id));
    document.insert(
        "document_type".to_string(),
        Value::String(kind.as_str().to_string()),
    );

    for field in schema.required_numeric_fields() {
        let current = document.get(&field.name);
        if current.is_some_and(Value::is_number) {
            continue;
        }

        let coerced = current
            .and_then(Value::as_str)
            .and_then(|s| numeric(s.trim(), field.field_type));
        let value = coerced.unwrap_or_else(|| {
            if current.is_some_and(|v| !v.is_null()) {
                debug!(field = %field.name, "Replacing non-numeric value with default");
            }
            default_for(field.field_type, occurred_at_ms)
        });
        document.insert(field.name.clone(), value);
    }

    Ok(document)
}

fn numeric(raw: &str, field_type: FieldType) -> Option<Value> {
    match field_type {
        FieldType::Int | FieldType::Timestamp => raw.parse::<i64>().ok().map(Value::from),
        _ => raw
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number),
    }
}

fn default_for(field_type: FieldType, occurred_at_ms: i64) -> Value {
    match field_type {
        FieldType::Timestamp => Value::from(occurred_at_ms),
        FieldType::Int => Value::from(0),
        _ => Value::from(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::routing::collection_schema;
    use serde_json::json;

    fn build(payload: Value, kind: DocumentKind) -> IndexDocument {
        to_index_document(&payload, kind, "evt-1", 1_000, &collection_schema(kind)).unwrap()
    }

    #[test]
    fn test_natural_key_becomes_id() {
        let doc = build(
            json!({"claimId": "c-1", "claimStatus": "pending"}),
            DocumentKind::Claims,
        );
        assert_eq!(doc["id"], json!("c-1"));
        assert_eq!(doc["document_type"], json!("claims"));
        assert_eq!(doc["claimStatus"], json!("pending"));
    }

    #[test]
    fn test_missing_id_falls_back() {
        let doc = build(json!({"name": "Depot"}), DocumentKind::Locations);
        assert_eq!(doc["id"], json!("evt-1"));
    }

    #[test]
    fn test_required_numeric_defaults() {
        let doc = build(
            json!({"sku": "A-1", "price": "12.50", "stock_quantity": null}),
            DocumentKind::Catalog,
        );
        assert_eq!(doc["price"], json!(12.5));
        assert_eq!(doc["stock_quantity"], json!(0));
        assert_eq!(doc["updated_at"], json!(1_000));
    }

    #[test]
    fn test_existing_numbers_are_kept() {
        let doc = build(
            json!({"locationId": "l-1", "latitude": 38.7, "longitude": -9.1, "updated_at": 5}),
            DocumentKind::Locations,
        );
        assert_eq!(doc["latitude"], json!(38.7));
        assert_eq!(doc["longitude"], json!(-9.1));
        assert_eq!(doc["updated_at"], json!(5));
    }

    #[test]
    fn test_non_object_payload_is_error() {
        let schema = collection_schema(DocumentKind::Catalog);
        assert!(to_index_document(&json!("sku"), DocumentKind::Catalog, "e", 0, &schema).is_err());
    }
}
