//! Static routing from document kinds to index collections.

use change_sync_repository::{CollectionSchema, FieldType};
use change_sync_shared::DocumentKind;

/// Name of the collection a document kind is written to.
pub fn collection_name(kind: DocumentKind) -> &'static str {
    match kind {
        DocumentKind::Catalog => "catalog",
        DocumentKind::Claims => "claims",
        DocumentKind::Locations => "locations",
    }
}

/// Schema of the collection a document kind is written to.
///
/// Only the fields the pipeline depends on are declared; everything else in a
/// payload is indexed dynamically.
pub fn collection_schema(kind: DocumentKind) -> CollectionSchema {
    let base = CollectionSchema::new(collection_name(kind))
        .field("id", FieldType::Keyword)
        .field("document_type", FieldType::Keyword)
        .field("updated_at", FieldType::Timestamp);

    match kind {
        DocumentKind::Catalog => base
            .optional_field("name", FieldType::Text)
            .optional_field("description", FieldType::Text)
            .optional_field("sku", FieldType::Keyword)
            .optional_field("category", FieldType::Keyword)
            .field("price", FieldType::Float)
            .field("stock_quantity", FieldType::Int)
            .optional_field("active", FieldType::Bool),
        DocumentKind::Claims => base
            .optional_field("claim_number", FieldType::Keyword)
            .optional_field("claim_status", FieldType::Keyword)
            .optional_field("description", FieldType::Text)
            .field("claim_amount", FieldType::Float)
            .optional_field("filed_at", FieldType::Timestamp),
        DocumentKind::Locations => base
            .optional_field("name", FieldType::Text)
            .optional_field("address", FieldType::Text)
            .optional_field("city", FieldType::Keyword)
            .field("latitude", FieldType::Float)
            .field("longitude", FieldType::Float)
            .optional_field("open", FieldType::Bool),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_kind_has_a_distinct_collection() {
        let names: Vec<&str> = DocumentKind::ALL.iter().map(|k| collection_name(*k)).collect();
        assert_eq!(names, vec!["catalog", "claims", "locations"]);
    }

    #[test]
    fn test_schema_names_match_routing() {
        for kind in DocumentKind::ALL {
            let schema = collection_schema(kind);
            assert_eq!(schema.name, collection_name(kind));
            assert!(schema.fields.iter().any(|f| f.name == "id"));
        }
    }

    #[test]
    fn test_claims_required_numeric_fields() {
        let schema = collection_schema(DocumentKind::Claims);
        let names: Vec<&str> = schema
            .required_numeric_fields()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(names, vec!["updated_at", "claim_amount"]);
    }
}
