//! Helpers for reading identifiers and document lists out of event payloads.

use serde_json::Value;

use crate::types::document_kind::DocumentKind;

/// Generic identifier fields, checked before any kind-specific field.
const GENERIC_ID_FIELDS: &[&str] = &["id", "documentId", "document_id", "_id"];

/// Resolve a document identifier from a payload value.
///
/// A bare string or number is the identifier itself. For objects the generic id
/// fields are checked first, then the natural-key fields of `kind`.
///
/// # Returns
///
/// * `Some(String)` - The resolved, non-empty identifier
/// * `None` - If no identifier could be found
pub fn resolve_document_id(payload: &Value, kind: Option<DocumentKind>) -> Option<String> {
    match payload {
        Value::String(s) => non_empty(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => {
            let kind_fields = kind.map(|k| k.id_fields()).unwrap_or(&[]);
            GENERIC_ID_FIELDS
                .iter()
                .chain(kind_fields.iter())
                .filter_map(|field| map.get(*field))
                .find_map(|value| match value {
                    Value::String(s) => non_empty(s),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
        }
        _ => None,
    }
}

/// The `documents` list of a bulk-update payload.
pub fn bulk_documents(payload: &Value) -> Option<&Vec<Value>> {
    payload.get("documents").and_then(Value::as_array)
}

/// The identifiers of a bulk-delete payload.
///
/// Reads `documentIds` (or `document_ids`). Returns `None` when the list is missing
/// or any entry does not resolve to an identifier.
pub fn bulk_document_ids(payload: &Value, kind: Option<DocumentKind>) -> Option<Vec<String>> {
    let ids = payload
        .get("documentIds")
        .or_else(|| payload.get("document_ids"))
        .and_then(Value::as_array)?;

    ids.iter()
        .map(|item| resolve_document_id(item, kind))
        .collect()
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
