//! In-memory document storage.

use crate::filter::Filter;
use crate::store::{Store, StoreError};
use dorm_core::{apply_set, apply_unset, Document, IndexSpec, RecordId, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Storage key every backend document carries its identifier under.
const ID_KEY: &str = "_id";

/// Sequential identifier allocator.
#[derive(Debug, Default)]
struct IdAllocator {
    next_id: u64,
}

impl IdAllocator {
    fn new() -> Self {
        Self { next_id: 1 }
    }

    fn alloc(&mut self) -> RecordId {
        let id = RecordId::new(self.next_id);
        self.next_id += 1;
        id
    }

    /// Never hand out an identifier at or below a carried one.
    fn reserve(&mut self, id: RecordId) {
        self.next_id = self.next_id.max(id.raw() + 1);
    }
}

/// The in-memory document store.
///
/// Documents live in collection-keyed ordered maps; identifier allocation
/// is sequential across all collections. Index specifications are
/// recorded but not enforced.
#[derive(Debug)]
pub struct MemoryStore {
    /// Document storage, keyed by collection then identifier
    collections: BTreeMap<String, BTreeMap<RecordId, Document>>,
    /// ID allocator
    id_alloc: IdAllocator,
    /// Recorded index specifications
    indexes: BTreeMap<String, Vec<IndexSpec>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            collections: BTreeMap::new(),
            id_alloc: IdAllocator::new(),
            indexes: BTreeMap::new(),
        }
    }

    /// Number of documents in a collection.
    pub fn count(&self, collection: &str) -> usize {
        self.collections
            .get(collection)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }

    /// Recorded index specifications for a collection.
    pub fn indexes(&self, collection: &str) -> &[IndexSpec] {
        self.indexes
            .get(collection)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Identifier a document carries, when it carries one.
    fn document_id(doc: &Document) -> Option<RecordId> {
        match doc.get(ID_KEY) {
            Some(Value::Id(id)) => Some(*id),
            _ => None,
        }
    }
}

impl Store for MemoryStore {
    fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Document>, StoreError> {
        let Some(rows) = self.collections.get(collection) else {
            return Ok(None);
        };
        Ok(rows
            .values()
            .find(|doc| filter.matches(doc))
            .cloned())
    }

    fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>, StoreError> {
        let Some(rows) = self.collections.get(collection) else {
            return Ok(Vec::new());
        };
        Ok(rows
            .values()
            .filter(|doc| filter.matches(doc))
            .cloned()
            .collect())
    }

    fn insert(&mut self, collection: &str, mut doc: Document) -> Result<RecordId, StoreError> {
        let id = match Self::document_id(&doc) {
            Some(id) => {
                self.id_alloc.reserve(id);
                id
            }
            None => {
                let id = self.id_alloc.alloc();
                doc.insert(ID_KEY.to_string(), Value::Id(id));
                id
            }
        };
        self.collections
            .entry(collection.to_string())
            .or_default()
            .insert(id, doc);
        Ok(id)
    }

    fn update(
        &mut self,
        collection: &str,
        id: RecordId,
        set: &BTreeMap<String, Value>,
        unset: &BTreeSet<String>,
    ) -> Result<(), StoreError> {
        let doc = self
            .collections
            .get_mut(collection)
            .and_then(|rows| rows.get_mut(&id))
            .ok_or_else(|| StoreError::not_found(collection, id))?;

        for path in unset {
            apply_unset(doc, path);
        }
        for (path, value) in set {
            apply_set(doc, path, value.clone());
        }
        Ok(())
    }

    fn delete(&mut self, collection: &str, id: RecordId) -> Result<(), StoreError> {
        self.collections
            .get_mut(collection)
            .and_then(|rows| rows.remove(&id))
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(collection, id))
    }

    fn ensure_index(&mut self, collection: &str, spec: IndexSpec) -> Result<(), StoreError> {
        let specs = self.indexes.entry(collection.to_string()).or_default();
        if !specs.contains(&spec) {
            specs.push(spec);
        }
        Ok(())
    }
}
