//! The persistence session.

use crate::error::PersistError;
use dorm_core::{Document, RecordId, Value};
use dorm_delta::compute_delta;
use dorm_record::{from_document, to_document, validate, RecordInstance};
use dorm_registry::{Registry, TypeDef, DISCRIMINATOR_STORAGE_NAME, ID_STORAGE_NAME};
use dorm_store::{Filter, Store};

/// A unit of persistence work over one registry and one store.
///
/// The session owns the store handle for its lifetime and keeps no state
/// of its own: every operation reads the registry, talks to the store, and
/// leaves the record it was given in a consistent tracked state.
pub struct Session<'r, S: Store> {
    pub(crate) registry: &'r Registry,
    pub(crate) store: S,
}

impl<'r, S: Store> Session<'r, S> {
    /// Create a session over a registry and a store.
    pub fn new(registry: &'r Registry, store: S) -> Self {
        Self { registry, store }
    }

    /// The registry this session operates against.
    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    /// Borrow the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Take the store back out of the session.
    pub fn into_store(self) -> S {
        self.store
    }

    // ==================== Writes ====================

    /// Validate and insert a record as a full document.
    ///
    /// The store-assigned identifier is written back onto the record and
    /// the record comes out clean.
    pub fn insert(&mut self, record: &mut RecordInstance) -> Result<RecordId, PersistError> {
        validate(self.registry, record)?;
        let collection = self.collection_of(record.type_name())?;
        let doc = to_document(self.registry, record)?;
        let id = self.store.insert(&collection, doc)?;
        record.set_id(id);
        record.clear_changes_deep();
        Ok(id)
    }

    /// Persist a record: insert when it has no identifier, otherwise write
    /// only its changed paths as one atomic update.
    ///
    /// Saving a clean, already-persisted record is a no-op. A stored
    /// document that disappeared between hydration and save surfaces as
    /// [`PersistError::OperationFailed`].
    pub fn save(&mut self, record: &mut RecordInstance) -> Result<RecordId, PersistError> {
        let Some(id) = record.id() else {
            return self.insert(record);
        };
        if record.is_clean() {
            return Ok(id);
        }

        validate(self.registry, record)?;
        let delta = compute_delta(self.registry, record)?;
        let collection = self.collection_of(record.type_name())?;
        self.store
            .update(&collection, id, &delta.set, &delta.unset)
            .map_err(PersistError::vanished)?;
        record.clear_changes_deep();
        Ok(id)
    }

    /// Write a record's changed paths without insert fallback.
    ///
    /// Fails when the record has no identifier or no recorded changes.
    pub fn update(&mut self, record: &mut RecordInstance) -> Result<(), PersistError> {
        let id = record
            .id()
            .ok_or_else(|| PersistError::operation_failed("record has no identifier"))?;
        if record.is_clean() {
            return Err(PersistError::operation_failed("update with no operations"));
        }

        let delta = compute_delta(self.registry, record)?;
        let collection = self.collection_of(record.type_name())?;
        self.store
            .update(&collection, id, &delta.set, &delta.unset)
            .map_err(PersistError::vanished)?;
        record.clear_changes_deep();
        Ok(())
    }

    // ==================== Reads ====================

    /// Fetch one record by identifier, hydrated as its exact stored type.
    pub fn get(&self, type_name: &str, id: RecordId) -> Result<RecordInstance, PersistError> {
        let collection = self.collection_of(type_name)?;
        let filter = self.scoped_filter(type_name, Filter::eq(ID_STORAGE_NAME, id));
        let doc = self
            .store
            .find_one(&collection, &filter)?
            .ok_or_else(|| PersistError::not_found(type_name, id))?;
        Ok(from_document(self.registry, type_name, &doc)?)
    }

    /// Fetch all records of a type matching a filter.
    ///
    /// Querying a polymorphic subtype scopes the filter to the subtype's
    /// discriminators, so siblings sharing the collection stay invisible.
    pub fn find(
        &self,
        type_name: &str,
        filter: Filter,
    ) -> Result<Vec<RecordInstance>, PersistError> {
        let collection = self.collection_of(type_name)?;
        let scoped = self.scoped_filter(type_name, filter);
        let docs = self.store.find(&collection, &scoped)?;
        let mut records = Vec::with_capacity(docs.len());
        for doc in &docs {
            records.push(from_document(self.registry, type_name, doc)?);
        }
        Ok(records)
    }

    /// Fetch the first record of a type matching a filter.
    pub fn find_one(
        &self,
        type_name: &str,
        filter: Filter,
    ) -> Result<Option<RecordInstance>, PersistError> {
        let collection = self.collection_of(type_name)?;
        let scoped = self.scoped_filter(type_name, filter);
        match self.store.find_one(&collection, &scoped)? {
            Some(doc) => Ok(Some(from_document(self.registry, type_name, &doc)?)),
            None => Ok(None),
        }
    }

    /// Refetch a record's stored document and replace its in-memory state.
    /// Local unsaved changes are discarded; the record comes out clean.
    pub fn reload(&self, record: &mut RecordInstance) -> Result<(), PersistError> {
        let id = record
            .id()
            .ok_or_else(|| PersistError::operation_failed("record has no identifier"))?;
        let type_name = record.type_name().to_string();
        *record = self.get(&type_name, id)?;
        Ok(())
    }

    // ==================== Indexes ====================

    /// Declare every registered index specification to the store.
    pub fn ensure_indexes(&mut self) -> Result<(), PersistError> {
        for type_def in self.registry.all_types() {
            if type_def.indexes.is_empty() {
                continue;
            }
            let Some(collection) = self.registry.collection_of(&type_def.name) else {
                continue;
            };
            let collection = collection.to_string();
            for spec in &type_def.indexes {
                self.store.ensure_index(&collection, spec.clone())?;
            }
        }
        Ok(())
    }

    // ==================== Shared Plumbing ====================

    /// The physical collection for a type, or a schema error for types
    /// that have none (embedded, abstract, unregistered).
    pub(crate) fn collection_of(&self, type_name: &str) -> Result<String, PersistError> {
        self.registry
            .collection_of(type_name)
            .map(str::to_string)
            .ok_or_else(|| {
                PersistError::schema(format!("type {type_name} has no collection"))
            })
    }

    /// Narrow a filter to the queried type's discriminators when the type
    /// shares its collection with relatives.
    ///
    /// The collection root is exempt: everything in its collection belongs
    /// to it, including legacy documents stored without a discriminator.
    pub(crate) fn scoped_filter(&self, type_name: &str, filter: Filter) -> Filter {
        if !self.registry.is_polymorphic(type_name) || self.is_collection_root(type_name) {
            return filter;
        }
        let discriminators = self
            .registry
            .discriminator_set(type_name)
            .into_iter()
            .map(Value::String)
            .collect();
        let scope = Filter::is_in(DISCRIMINATOR_STORAGE_NAME, discriminators);
        match filter {
            Filter::All => scope,
            other => Filter::And(vec![scope, other]),
        }
    }

    fn is_collection_root(&self, type_name: &str) -> bool {
        self.registry
            .ancestors(type_name)
            .iter()
            .find(|def| !def.is_abstract)
            .map(|def| def.name == type_name)
            .unwrap_or(false)
    }

    /// The exact stored type of a document: its discriminator when it has
    /// one that resolves, the declared fallback otherwise.
    pub(crate) fn exact_type_of<'a>(&'a self, doc: &Document, declared: &'a str) -> &'a str {
        match doc.get(DISCRIMINATOR_STORAGE_NAME) {
            Some(Value::String(discriminator)) => self
                .registry
                .resolve_discriminator(discriminator)
                .map(|def| def.name.as_str())
                .unwrap_or(declared),
            _ => declared,
        }
    }

    /// Identifier a stored document carries.
    pub(crate) fn document_id(doc: &Document) -> Option<RecordId> {
        match doc.get(ID_STORAGE_NAME) {
            Some(Value::Id(id)) => Some(*id),
            _ => None,
        }
    }

    pub(crate) fn type_def(&self, type_name: &str) -> Result<&'r TypeDef, PersistError> {
        self.registry
            .get(type_name)
            .ok_or_else(|| PersistError::schema(format!("unknown type {type_name}")))
    }
}
