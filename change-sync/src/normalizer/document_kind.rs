//! Document-kind resolution for raw notifications.
//!
//! Resolution order: an explicit kind field, then a table or collection name, then
//! structural inference from the payload's fields.

use change_sync_shared::{bulk_documents, DocumentKind};
use serde_json::{Map, Value};

/// Fields that name the document kind directly.
const EXPLICIT_FIELDS: &[&str] = &["documentType", "document_type", "documentKind", "document_kind"];

/// Fields that carry a table, collection or fully-qualified resource name.
const TABLE_FIELDS: &[&str] = &[
    "tableName",
    "table_name",
    "table",
    "collection",
    "collectionName",
    "resource",
    "eventSourceARN",
    "eventSourceArn",
];

/// Table-name fragments and the kind they map to. First match wins.
const TABLE_KINDS: &[(&str, DocumentKind)] = &[
    ("claim", DocumentKind::Claims),
    ("location", DocumentKind::Locations),
    ("store", DocumentKind::Locations),
    ("catalog", DocumentKind::Catalog),
    ("product", DocumentKind::Catalog),
    ("item", DocumentKind::Catalog),
];

const CLAIM_FIELDS: &[&str] = &[
    "claimId",
    "claim_id",
    "claimNumber",
    "claim_number",
    "claimStatus",
    "claim_status",
];
const LATITUDE_FIELDS: &[&str] = &["latitude", "lat"];
const LONGITUDE_FIELDS: &[&str] = &["longitude", "lng", "lon", "long"];
const COORDINATE_FIELDS: &[&str] = &["coordinates", "geo", "geolocation", "location"];
const CATALOG_FIELDS: &[&str] = &["sku", "productId", "product_id", "catalogId", "catalog_id"];

/// Read an explicit kind field.
pub fn explicit_kind(obj: &Map<String, Value>) -> Option<DocumentKind> {
    EXPLICIT_FIELDS
        .iter()
        .filter_map(|field| obj.get(*field).and_then(Value::as_str))
        .find_map(DocumentKind::parse)
}

/// Map a table, collection or resource name onto a kind.
pub fn kind_from_table_name(name: &str) -> Option<DocumentKind> {
    let table = table_segment(name).to_ascii_lowercase();
    if let Some(kind) = DocumentKind::parse(&table) {
        return Some(kind);
    }
    TABLE_KINDS
        .iter()
        .find(|(fragment, _)| table.contains(fragment))
        .map(|(_, kind)| *kind)
}

/// Look up a kind from any table-name field on the object.
pub fn table_kind(obj: &Map<String, Value>) -> Option<DocumentKind> {
    TABLE_FIELDS
        .iter()
        .filter_map(|field| obj.get(*field).and_then(Value::as_str))
        .find_map(kind_from_table_name)
}

/// Infer a kind from the fields a payload carries.
///
/// Bulk payloads are inferred from their first document.
pub fn infer_from_payload(payload: &Value) -> Option<DocumentKind> {
    if let Some(first) = bulk_documents(payload).and_then(|docs| docs.first()) {
        return infer_from_payload(first);
    }
    let obj = payload.as_object()?;

    if has_any(obj, CLAIM_FIELDS) {
        return Some(DocumentKind::Claims);
    }
    if (has_any(obj, LATITUDE_FIELDS) && has_any(obj, LONGITUDE_FIELDS))
        || COORDINATE_FIELDS
            .iter()
            .any(|f| obj.get(*f).is_some_and(|v| v.is_object() || v.is_array()))
    {
        return Some(DocumentKind::Locations);
    }
    if has_any(obj, CATALOG_FIELDS) {
        return Some(DocumentKind::Catalog);
    }
    None
}

/// Full resolution chain: explicit field, table name, then payload structure.
pub fn resolve(meta: &Map<String, Value>, payload: &Value) -> Option<DocumentKind> {
    explicit_kind(meta)
        .or_else(|| table_kind(meta))
        .or_else(|| payload.as_object().and_then(explicit_kind))
        .or_else(|| infer_from_payload(payload))
}

/// Extract the table name from a resource name such as
/// `arn:aws:dynamodb:us-east-1:123:table/claims-prod/stream/2024-01-01`.
fn table_segment(name: &str) -> &str {
    match name.find("table/") {
        Some(start) => {
            let rest = &name[start + "table/".len()..];
            rest.split('/').next().unwrap_or(rest)
        }
        None => name,
    }
}

fn has_any(obj: &Map<String, Value>, fields: &[&str]) -> bool {
    fields
        .iter()
        .any(|f| obj.get(*f).is_some_and(|v| !v.is_null()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_explicit_field_wins() {
        let meta = obj(json!({"documentType": "locations", "tableName": "claims"}));
        assert_eq!(resolve(&meta, &json!({"claimId": "c"})), Some(DocumentKind::Locations));
    }

    #[test]
    fn test_table_name_lookup() {
        assert_eq!(kind_from_table_name("claims"), Some(DocumentKind::Claims));
        assert_eq!(kind_from_table_name("ProductCatalog"), Some(DocumentKind::Catalog));
        assert_eq!(kind_from_table_name("store_locations_v2"), Some(DocumentKind::Locations));
        assert_eq!(kind_from_table_name("audit_log"), None);
    }

    #[test]
    fn test_table_name_inside_resource_name() {
        let arn = "arn:aws:dynamodb:us-east-1:123456789012:table/prod-claims/stream/2024-01-01T00:00:00.000";
        assert_eq!(kind_from_table_name(arn), Some(DocumentKind::Claims));

        let meta = obj(json!({"eventSourceARN": arn}));
        assert_eq!(resolve(&meta, &json!({})), Some(DocumentKind::Claims));
    }

    #[test]
    fn test_structural_inference() {
        assert_eq!(
            infer_from_payload(&json!({"claimNumber": "CLM-1"})),
            Some(DocumentKind::Claims)
        );
        assert_eq!(
            infer_from_payload(&json!({"name": "Depot", "latitude": 1.0, "longitude": 2.0})),
            Some(DocumentKind::Locations)
        );
        assert_eq!(
            infer_from_payload(&json!({"name": "Depot", "geo": {"lat": 1.0, "lon": 2.0}})),
            Some(DocumentKind::Locations)
        );
        assert_eq!(infer_from_payload(&json!({"sku": "A-1"})), Some(DocumentKind::Catalog));
        assert_eq!(infer_from_payload(&json!({"latitude": 1.0})), None);
        assert_eq!(infer_from_payload(&json!("c-1")), None);
    }

    #[test]
    fn test_bulk_payload_uses_first_document() {
        let payload = json!({"documents": [{"storeId": "s", "lat": 1, "lng": 2}]});
        assert_eq!(infer_from_payload(&payload), Some(DocumentKind::Locations));
    }

    #[test]
    fn test_explicit_kind_inside_payload() {
        let payload = json!({"document_type": "catalog", "name": "x"});
        assert_eq!(resolve(&Map::new(), &payload), Some(DocumentKind::Catalog));
    }
}
