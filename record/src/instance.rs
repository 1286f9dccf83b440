//! Record instances: mutable typed values with mutation metadata.

use crate::changes::ChangeSet;
use crate::guards::{EmbeddedMut, ListMut, MapMut};
use dorm_core::{RecordId, Value};
use dorm_registry::Registry;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised by instance construction and field access.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Unknown type: {name}")]
    UnknownType { name: String },

    #[error("Cannot instantiate abstract type: {name}")]
    AbstractInstantiation { name: String },

    #[error("Unknown field: {field} on type {type_name}")]
    UnknownField { type_name: String, field: String },

    #[error("Primary field {field} on type {type_name} cannot be assigned directly")]
    PrimaryAssignment { type_name: String, field: String },

    #[error("Field {field} on type {type_name} does not hold a container value")]
    NotAContainer { type_name: String, field: String },
}

/// Result type for record operations.
pub type RecordResult<T> = Result<T, RecordError>;

/// A reference-typed field value: either a stored identifier awaiting
/// resolution, or the resolved live instance cached after the first fetch.
///
/// Resolution is an explicit call with an injected store handle (see the
/// persistence layer); both states are plain data and deterministic to test.
#[derive(Debug, Clone, PartialEq)]
pub enum Reference {
    /// Stored identifier, not yet fetched. Generic references carry the
    /// target type name alongside.
    Unresolved {
        id: RecordId,
        target: Option<String>,
    },
    /// Live instance cached on the referencing field.
    Resolved(Box<RecordInstance>),
}

impl Reference {
    /// The referenced identifier, when known.
    pub fn id(&self) -> Option<RecordId> {
        match self {
            Reference::Unresolved { id, .. } => Some(*id),
            Reference::Resolved(instance) => instance.id(),
        }
    }

    /// Returns true once the reference holds a live instance.
    pub fn is_resolved(&self) -> bool {
        matches!(self, Reference::Resolved(_))
    }
}

/// A value held by one field of a record instance.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Plain store value (scalars and scalar containers).
    Value(Value),
    /// Embedded sub-record, owned by this instance.
    Record(Box<RecordInstance>),
    /// Tracked list; elements may themselves be records or references.
    List(Vec<FieldValue>),
    /// Tracked string-keyed map.
    Map(BTreeMap<String, FieldValue>),
    /// Reference to a top-level record.
    Ref(Reference),
}

impl FieldValue {
    /// Get the plain value if this is a Value variant.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            FieldValue::Value(value) => Some(value),
            _ => None,
        }
    }

    /// Get the embedded record if this is a Record variant.
    pub fn as_record(&self) -> Option<&RecordInstance> {
        match self {
            FieldValue::Record(record) => Some(record),
            _ => None,
        }
    }

    /// Returns true for an empty tracked or plain collection.
    pub fn is_empty_collection(&self) -> bool {
        match self {
            FieldValue::Value(value) => value.is_empty_collection(),
            FieldValue::List(items) => items.is_empty(),
            FieldValue::Map(entries) => entries.is_empty(),
            _ => false,
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        FieldValue::Value(value)
    }
}

impl From<RecordInstance> for FieldValue {
    fn from(record: RecordInstance) -> Self {
        FieldValue::Record(Box::new(record))
    }
}

impl From<Reference> for FieldValue {
    fn from(reference: Reference) -> Self {
        FieldValue::Ref(reference)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Value(Value::Bool(b))
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Value(Value::Int(i))
    }
}

impl From<i32> for FieldValue {
    fn from(i: i32) -> Self {
        FieldValue::Value(Value::Int(i64::from(i)))
    }
}

impl From<f64> for FieldValue {
    fn from(f: f64) -> Self {
        FieldValue::Value(Value::Float(f))
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Value(Value::String(s.to_string()))
    }
}

impl From<RecordId> for FieldValue {
    fn from(id: RecordId) -> Self {
        FieldValue::Value(Value::Id(id))
    }
}

/// A mutable in-memory record of a registered type.
///
/// Holds field values keyed by logical name plus the set of changed
/// storage paths consumed by the delta computer. Embedded sub-records are
/// owned by their parent field; moving one out detaches it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordInstance {
    pub(crate) type_name: String,
    pub(crate) id: Option<RecordId>,
    pub(crate) fields: BTreeMap<String, FieldValue>,
    pub(crate) changed: ChangeSet,
}

impl RecordInstance {
    /// Create a new instance of a registered type with defaults applied.
    ///
    /// Abstract types cannot be instantiated directly.
    pub fn new(registry: &Registry, type_name: &str) -> RecordResult<Self> {
        let type_def = registry.get(type_name).ok_or_else(|| RecordError::UnknownType {
            name: type_name.to_string(),
        })?;
        if type_def.is_abstract {
            return Err(RecordError::AbstractInstantiation {
                name: type_name.to_string(),
            });
        }

        let mut fields = BTreeMap::new();
        for field in &type_def.fields {
            if let Some(default) = field.default.resolve() {
                fields.insert(field.name.clone(), FieldValue::Value(default));
            }
        }

        Ok(Self {
            type_name: type_name.to_string(),
            id: None,
            fields,
            changed: ChangeSet::new(),
        })
    }

    /// Assemble an instance from already-hydrated parts. Starts clean.
    pub(crate) fn from_parts(
        type_name: String,
        id: Option<RecordId>,
        fields: BTreeMap<String, FieldValue>,
    ) -> Self {
        Self {
            type_name,
            id,
            fields,
            changed: ChangeSet::new(),
        }
    }

    /// The instance's type name.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The persisted identifier, if any.
    pub fn id(&self) -> Option<RecordId> {
        self.id
    }

    /// Assign the persisted identifier. Called by the persistence layer
    /// after an insert; not a tracked mutation.
    pub fn set_id(&mut self, id: RecordId) {
        self.id = Some(id);
    }

    // ==================== Field Access ====================

    /// Get a field's value by logical name.
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    /// Get a field's plain value by logical name.
    pub fn value(&self, field: &str) -> Option<&Value> {
        self.get(field).and_then(FieldValue::as_value)
    }

    /// Get an embedded sub-record by logical name.
    pub fn embedded(&self, field: &str) -> Option<&RecordInstance> {
        self.get(field).and_then(FieldValue::as_record)
    }

    /// Get a reference field's state by logical name.
    pub fn reference(&self, field: &str) -> Option<&Reference> {
        match self.get(field) {
            Some(FieldValue::Ref(reference)) => Some(reference),
            _ => None,
        }
    }

    /// Get the cached instance of a resolved reference field.
    pub fn resolved_ref(&self, field: &str) -> Option<&RecordInstance> {
        match self.reference(field) {
            Some(Reference::Resolved(instance)) => Some(instance),
            _ => None,
        }
    }

    /// Iterate all held fields by logical name.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    // ==================== Mutation ====================

    /// Assign a field value, marking the field changed.
    ///
    /// Assignment is conservative: the mark is recorded even when the new
    /// value equals the old one. Assigning an embedded record detaches any
    /// previously held child. Primary fields are not assignable here;
    /// identifiers go through `set_id`.
    pub fn set(
        &mut self,
        registry: &Registry,
        field: &str,
        value: impl Into<FieldValue>,
    ) -> RecordResult<()> {
        let storage = self.storage_name_of(registry, field)?;
        self.fields.insert(field.to_string(), value.into());
        self.changed.mark(&storage);
        Ok(())
    }

    /// Remove a field's value, marking the field changed. The delta
    /// computer turns the absent value into an unset operation.
    pub fn clear(&mut self, registry: &Registry, field: &str) -> RecordResult<()> {
        let storage = self.storage_name_of(registry, field)?;
        self.fields.remove(field);
        self.changed.mark(&storage);
        Ok(())
    }

    /// Move an embedded sub-record out of a field, detaching it from this
    /// instance. The field is marked changed.
    pub fn take_embedded(
        &mut self,
        registry: &Registry,
        field: &str,
    ) -> RecordResult<Option<RecordInstance>> {
        let storage = self.storage_name_of(registry, field)?;
        match self.fields.get(field) {
            Some(FieldValue::Record(_)) => {}
            _ => return Ok(None),
        }
        self.changed.mark(&storage);
        match self.fields.remove(field) {
            Some(FieldValue::Record(child)) => Ok(Some(*child)),
            _ => Ok(None),
        }
    }

    /// Borrow an embedded sub-record for mutation.
    ///
    /// When the guard drops, every storage path the child has recorded is
    /// re-marked on this instance under the field's storage name. This is
    /// the upward change-propagation walk.
    pub fn embedded_mut(&mut self, registry: &Registry, field: &str) -> Option<EmbeddedMut<'_>> {
        let type_def = registry.get(&self.type_name)?;
        let prefix = type_def.field(field)?.storage_name.clone();
        let Self {
            fields, changed, ..
        } = self;
        match fields.get_mut(field) {
            Some(FieldValue::Record(child)) => Some(EmbeddedMut {
                child: child.as_mut(),
                parent_changed: changed,
                prefix,
            }),
            _ => None,
        }
    }

    /// Borrow a list field for mutation. An absent field materializes as an
    /// empty list; a plain list value is promoted to a tracked list.
    ///
    /// Any mutating call through the guard marks the whole field as one
    /// changed unit; element-level diffing is not attempted.
    pub fn list_mut(&mut self, registry: &Registry, field: &str) -> RecordResult<ListMut<'_>> {
        let storage = self.storage_name_of(registry, field)?;

        let entry = self
            .fields
            .entry(field.to_string())
            .or_insert_with(|| FieldValue::List(Vec::new()));
        if let FieldValue::Value(Value::List(values)) = entry {
            let items = std::mem::take(values).into_iter().map(FieldValue::Value).collect();
            *entry = FieldValue::List(items);
        }

        let type_name = self.type_name.clone();
        let Self {
            fields, changed, ..
        } = self;
        match fields.get_mut(field) {
            Some(FieldValue::List(items)) => Ok(ListMut {
                items,
                changed,
                storage_name: storage,
                dirty: false,
            }),
            _ => Err(RecordError::NotAContainer {
                type_name,
                field: field.to_string(),
            }),
        }
    }

    /// Borrow a map field for mutation. Same tracking policy as `list_mut`.
    pub fn map_mut(&mut self, registry: &Registry, field: &str) -> RecordResult<MapMut<'_>> {
        let storage = self.storage_name_of(registry, field)?;

        let entry = self
            .fields
            .entry(field.to_string())
            .or_insert_with(|| FieldValue::Map(BTreeMap::new()));
        if let FieldValue::Value(Value::Map(values)) = entry {
            let entries = std::mem::take(values)
                .into_iter()
                .map(|(key, value)| (key, FieldValue::Value(value)))
                .collect();
            *entry = FieldValue::Map(entries);
        }

        let type_name = self.type_name.clone();
        let Self {
            fields, changed, ..
        } = self;
        match fields.get_mut(field) {
            Some(FieldValue::Map(entries)) => Ok(MapMut {
                entries,
                changed,
                storage_name: storage,
                dirty: false,
            }),
            _ => Err(RecordError::NotAContainer {
                type_name,
                field: field.to_string(),
            }),
        }
    }

    /// Cache a resolved instance on a reference field. Not a tracked
    /// mutation: the stored identifier is unchanged.
    pub fn cache_resolved(
        &mut self,
        field: &str,
        instance: RecordInstance,
    ) -> Option<&RecordInstance> {
        match self.fields.get_mut(field) {
            Some(FieldValue::Ref(reference)) => {
                *reference = Reference::Resolved(Box::new(instance));
                match reference {
                    Reference::Resolved(cached) => Some(cached),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    // ==================== Change Tracking ====================

    /// Changed storage paths in sorted order.
    pub fn changed_paths(&self) -> impl Iterator<Item = &str> {
        self.changed.paths()
    }

    /// Returns true if no mutation has been recorded since the last save
    /// or hydration.
    pub fn is_clean(&self) -> bool {
        self.changed.is_clean()
    }

    /// Clear recorded changes on this instance and, recursively, on every
    /// embedded record reachable from it. Called after a successful save.
    pub fn clear_changes_deep(&mut self) {
        self.changed.clear();
        for value in self.fields.values_mut() {
            clear_field_changes(value);
        }
    }

    fn storage_name_of(&self, registry: &Registry, field: &str) -> RecordResult<String> {
        let type_def = registry.get(&self.type_name).ok_or_else(|| RecordError::UnknownType {
            name: self.type_name.clone(),
        })?;
        let field_def = type_def.field(field).ok_or_else(|| RecordError::UnknownField {
            type_name: self.type_name.clone(),
            field: field.to_string(),
        })?;
        // Identifiers flow through set_id only.
        if field_def.primary {
            return Err(RecordError::PrimaryAssignment {
                type_name: self.type_name.clone(),
                field: field.to_string(),
            });
        }
        Ok(field_def.storage_name.clone())
    }
}

fn clear_field_changes(value: &mut FieldValue) {
    match value {
        FieldValue::Record(record) => record.clear_changes_deep(),
        FieldValue::List(items) => {
            for item in items {
                clear_field_changes(item);
            }
        }
        FieldValue::Map(entries) => {
            for item in entries.values_mut() {
                clear_field_changes(item);
            }
        }
        FieldValue::Value(_) | FieldValue::Ref(_) => {}
    }
}
