//! This module defines the core data structures shared by the change-sync crates.
//! It re-exports the canonical event, the document kinds and the payload helpers.

pub mod change_event;
pub mod document_kind;
pub mod payload;

pub use change_event::{ChangeEvent, EventKind, EventOrigin};
pub use document_kind::DocumentKind;
pub use payload::{bulk_document_ids, bulk_documents, resolve_document_id};
