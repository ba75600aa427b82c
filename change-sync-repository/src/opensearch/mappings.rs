//! OpenSearch index settings and mappings derived from a collection schema.

use serde_json::{json, Map, Value};

use crate::types::{CollectionSchema, FieldType};

/// Build the index creation body for a collection.
///
/// The configuration includes:
/// - **Text fields**: `text` with a `raw` keyword sub-field for sorting and exact match
/// - **Keyword fields**: for filtering and id lookups
/// - **Timestamps**: `date` fields stored as epoch milliseconds
///
/// Mappings are `dynamic: true` so payload fields outside the schema are still
/// indexed; the schema only pins the types of the fields the pipeline relies on.
///
/// # Sharding Configuration
///
/// - 1 primary shard
/// - 1 replica for redundancy
pub fn collection_body(schema: &CollectionSchema) -> Value {
    let mut properties = Map::new();
    for field in &schema.fields {
        properties.insert(field.name.clone(), field_mapping(field.field_type));
    }

    json!({
        "settings": {
            "number_of_shards": 1,
            "number_of_replicas": 1
        },
        "mappings": {
            "dynamic": true,
            "properties": properties
        }
    })
}

fn field_mapping(field_type: FieldType) -> Value {
    match field_type {
        FieldType::Text => json!({
            "type": "text",
            "fields": {
                "raw": { "type": "keyword" }
            }
        }),
        FieldType::Keyword => json!({ "type": "keyword" }),
        FieldType::Int => json!({ "type": "long" }),
        FieldType::Float => json!({ "type": "double" }),
        FieldType::Bool => json!({ "type": "boolean" }),
        FieldType::Timestamp => json!({ "type": "date", "format": "epoch_millis" }),
    }
}
