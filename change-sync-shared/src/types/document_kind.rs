//! Document kinds understood by the search index.
//!
//! The set is closed: every event that reaches the index targets exactly one of these
//! collections.

use serde::{Deserialize, Serialize};

/// The kind of document a change event targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// Catalog items (products, SKUs).
    Catalog,
    /// Insurance or warranty claims.
    Claims,
    /// Physical locations (stores, sites).
    Locations,
}

impl DocumentKind {
    /// Every document kind, in routing order.
    pub const ALL: [DocumentKind; 3] = [
        DocumentKind::Catalog,
        DocumentKind::Claims,
        DocumentKind::Locations,
    ];

    /// Returns the lowercase name used on the wire and inside payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Catalog => "catalog",
            DocumentKind::Claims => "claims",
            DocumentKind::Locations => "locations",
        }
    }

    /// Parse an explicitly named document kind.
    ///
    /// Accepts singular and plural spellings in any case. Returns `None` for anything
    /// outside the closed set.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "catalog" | "catalogs" | "catalog_item" | "catalog_items" => Some(Self::Catalog),
            "claim" | "claims" => Some(Self::Claims),
            "location" | "locations" => Some(Self::Locations),
            _ => None,
        }
    }

    /// Payload fields that carry this kind's natural document identifier.
    ///
    /// Checked after the generic `id` / `documentId` fields.
    pub fn id_fields(&self) -> &'static [&'static str] {
        match self {
            DocumentKind::Catalog => &["sku", "productId", "product_id", "itemId", "item_id"],
            DocumentKind::Claims => &["claimId", "claim_id", "claimNumber", "claim_number"],
            DocumentKind::Locations => &["locationId", "location_id", "storeId", "store_id"],
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_plural_and_case() {
        assert_eq!(DocumentKind::parse("Claims"), Some(DocumentKind::Claims));
        assert_eq!(DocumentKind::parse("claim"), Some(DocumentKind::Claims));
        assert_eq!(DocumentKind::parse(" LOCATION "), Some(DocumentKind::Locations));
        assert_eq!(DocumentKind::parse("catalog"), Some(DocumentKind::Catalog));
        assert_eq!(DocumentKind::parse("orders"), None);
    }

    #[test]
    fn test_serde_uses_lowercase_names() {
        let json = serde_json::to_string(&DocumentKind::Locations).unwrap();
        assert_eq!(json, "\"locations\"");
        let kind: DocumentKind = serde_json::from_str("\"catalog\"").unwrap();
        assert_eq!(kind, DocumentKind::Catalog);
    }
}
