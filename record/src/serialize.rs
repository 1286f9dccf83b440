//! Recursive serialization of record instances into store documents.

use crate::instance::{FieldValue, RecordInstance, Reference};
use dorm_core::{Document, Value};
use dorm_registry::{FieldKind, Registry, DISCRIMINATOR_STORAGE_NAME, ID_STORAGE_NAME};
use thiserror::Error;

/// Errors raised while serializing an instance.
#[derive(Debug, Error)]
pub enum SerializeError {
    #[error("Unknown type: {name}")]
    UnknownType { name: String },

    #[error("Reference to unsaved {type_name} instance cannot be serialized")]
    UnsavedReference { type_name: String },

    #[error("Generic reference is missing its type tag")]
    MissingTypeTag,
}

/// Serialize a record instance to its store-native document.
///
/// All held fields are written by storage name. Polymorphic instances
/// carry their discriminator (the dot-joined ancestor chain); the primary
/// identifier, when assigned, is written under the primary field's storage
/// name. Reference fields serialize as identifiers only — the referenced
/// document's fields are never embedded.
pub fn to_document(
    registry: &Registry,
    record: &RecordInstance,
) -> Result<Document, SerializeError> {
    let type_def = registry
        .get(record.type_name())
        .ok_or_else(|| SerializeError::UnknownType {
            name: record.type_name().to_string(),
        })?;

    let mut doc = Document::new();

    if registry.is_polymorphic(record.type_name()) {
        let qualified = registry
            .qualified_name(record.type_name())
            .unwrap_or(record.type_name());
        doc.insert(
            DISCRIMINATOR_STORAGE_NAME.to_string(),
            Value::String(qualified.to_string()),
        );
    }

    if let Some(id) = record.id() {
        let storage = type_def
            .primary_field()
            .map(|field| field.storage_name.clone())
            .unwrap_or_else(|| ID_STORAGE_NAME.to_string());
        doc.insert(storage, Value::Id(id));
    }

    for field in &type_def.fields {
        if field.primary {
            continue;
        }
        if let Some(value) = record.get(&field.name) {
            doc.insert(
                field.storage_name.clone(),
                serialize_field_value(registry, Some(&field.kind), value)?,
            );
        }
    }

    Ok(doc)
}

/// Serialize one field value to its store-native representation.
///
/// The declared kind decides the wire form of references: typed references
/// become bare identifiers, generic references an `{_id, _type}` map.
pub fn serialize_field_value(
    registry: &Registry,
    kind: Option<&FieldKind>,
    value: &FieldValue,
) -> Result<Value, SerializeError> {
    match value {
        FieldValue::Value(value) => Ok(value.clone()),
        FieldValue::Record(record) => to_document(registry, record).map(Value::Map),
        FieldValue::List(items) => {
            let element_kind = match kind {
                Some(FieldKind::List(element)) => Some(element.as_ref()),
                _ => None,
            };
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.push(serialize_field_value(registry, element_kind, item)?);
            }
            Ok(Value::List(values))
        }
        FieldValue::Map(entries) => {
            let element_kind = match kind {
                Some(FieldKind::Map(element)) => Some(element.as_ref()),
                _ => None,
            };
            let mut values = std::collections::BTreeMap::new();
            for (key, item) in entries {
                values.insert(
                    key.clone(),
                    serialize_field_value(registry, element_kind, item)?,
                );
            }
            Ok(Value::Map(values))
        }
        FieldValue::Ref(reference) => {
            let generic = matches!(kind, Some(FieldKind::GenericReference { .. }));
            serialize_reference(reference, generic)
        }
    }
}

fn serialize_reference(reference: &Reference, generic: bool) -> Result<Value, SerializeError> {
    let (id, tag) = match reference {
        Reference::Unresolved { id, target } => (*id, target.clone()),
        Reference::Resolved(instance) => {
            let id = instance
                .id()
                .ok_or_else(|| SerializeError::UnsavedReference {
                    type_name: instance.type_name().to_string(),
                })?;
            (id, Some(instance.type_name().to_string()))
        }
    };

    if generic {
        let tag = tag.ok_or(SerializeError::MissingTypeTag)?;
        let mut map = std::collections::BTreeMap::new();
        map.insert(ID_STORAGE_NAME.to_string(), Value::Id(id));
        map.insert(DISCRIMINATOR_STORAGE_NAME.to_string(), Value::String(tag));
        Ok(Value::Map(map))
    } else {
        Ok(Value::Id(id))
    }
}
