//! # Change Sync Shared
//!
//! This crate defines the canonical change-event shape used across the change-sync
//! pipeline. Every raw notification is normalized into a [`ChangeEvent`] before it is
//! validated, grouped and written to the search index.

pub mod types;

pub use types::change_event::{ChangeEvent, EventKind, EventOrigin};
pub use types::document_kind::DocumentKind;
pub use types::payload::{bulk_document_ids, bulk_documents, resolve_document_id};
