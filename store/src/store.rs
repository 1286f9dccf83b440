//! The storage trait driven by the persistence layer.

use crate::filter::Filter;
use dorm_core::{Document, IndexSpec, RecordId, Value};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Errors raised by a storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Document {id} not found in collection {collection}")]
    NotFound { collection: String, id: RecordId },

    #[error("Store backend failure: {message}")]
    Backend { message: String },
}

impl StoreError {
    pub fn not_found(collection: impl Into<String>, id: RecordId) -> Self {
        StoreError::NotFound {
            collection: collection.into(),
            id,
        }
    }

    pub fn backend(message: impl Into<String>) -> Self {
        StoreError::Backend {
            message: message.into(),
        }
    }
}

/// A document store keyed by collection name and record identifier.
///
/// Implementations own identifier allocation: an inserted document without
/// an identifier is assigned a fresh one, returned to the caller. Updates
/// are atomic per document.
pub trait Store {
    /// Find the first document in a collection matching a filter.
    fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Document>, StoreError>;

    /// Find all documents in a collection matching a filter.
    fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>, StoreError>;

    /// Insert a document, returning its identifier.
    fn insert(&mut self, collection: &str, doc: Document) -> Result<RecordId, StoreError>;

    /// Apply set and unset operations to one document as a single atomic
    /// update. Fails with [`StoreError::NotFound`] when the identifier is
    /// gone.
    fn update(
        &mut self,
        collection: &str,
        id: RecordId,
        set: &BTreeMap<String, Value>,
        unset: &BTreeSet<String>,
    ) -> Result<(), StoreError>;

    /// Remove a document by identifier.
    fn delete(&mut self, collection: &str, id: RecordId) -> Result<(), StoreError>;

    /// Record an index specification for a collection.
    fn ensure_index(&mut self, collection: &str, spec: IndexSpec) -> Result<(), StoreError>;
}
