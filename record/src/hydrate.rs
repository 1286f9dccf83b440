//! Hydration of store documents into record instances.
//!
//! The read path is discriminator-switched: a stored `_type` chain selects
//! the most specific registered type, so a polymorphic collection yields
//! each document as its exact variant.

use crate::instance::{FieldValue, RecordInstance, Reference};
use dorm_core::{Document, Value};
use dorm_registry::{FieldKind, Registry, DISCRIMINATOR_STORAGE_NAME, ID_STORAGE_NAME};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised while hydrating a document.
#[derive(Debug, Error)]
pub enum HydrateError {
    /// The stored discriminator names a type chain with no registered
    /// segment. Distinct from a not-found document: the caller must be
    /// able to tell the two apart.
    #[error("Stored discriminator names no registered type: {discriminator}")]
    NotRegistered { discriminator: String },

    #[error("Unknown type: {name}")]
    UnknownType { name: String },

    #[error("Stored value at {path} has unexpected shape: expected {expected}")]
    UnexpectedShape { path: String, expected: String },
}

/// Hydrate a document into an instance of its exact stored type.
///
/// Without a discriminator the declared type is used as-is. Unknown stored
/// keys are ignored; declared fields missing from the document take their
/// defaults. The result is clean.
pub fn from_document(
    registry: &Registry,
    declared_type: &str,
    doc: &Document,
) -> Result<RecordInstance, HydrateError> {
    let type_def = match doc.get(DISCRIMINATOR_STORAGE_NAME) {
        Some(Value::String(discriminator)) => registry
            .resolve_discriminator(discriminator)
            .ok_or_else(|| HydrateError::NotRegistered {
                discriminator: discriminator.clone(),
            })?,
        _ => registry
            .get(declared_type)
            .ok_or_else(|| HydrateError::UnknownType {
                name: declared_type.to_string(),
            })?,
    };

    let mut id = None;
    let mut fields = BTreeMap::new();

    for field in &type_def.fields {
        match doc.get(&field.storage_name) {
            Some(stored) if field.primary => match stored {
                Value::Id(record_id) => id = Some(*record_id),
                _ => {
                    return Err(HydrateError::UnexpectedShape {
                        path: field.storage_name.clone(),
                        expected: "Id".to_string(),
                    })
                }
            },
            Some(stored) => {
                fields.insert(
                    field.name.clone(),
                    hydrate_field_value(registry, &field.kind, stored, &field.storage_name)?,
                );
            }
            None => {
                if !field.primary {
                    if let Some(default) = field.default.resolve() {
                        fields.insert(field.name.clone(), FieldValue::Value(default));
                    }
                }
            }
        }
    }

    Ok(RecordInstance::from_parts(type_def.name.clone(), id, fields))
}

fn hydrate_field_value(
    registry: &Registry,
    kind: &FieldKind,
    value: &Value,
    path: &str,
) -> Result<FieldValue, HydrateError> {
    match kind {
        FieldKind::Embedded(target) => match value {
            Value::Map(inner) => {
                from_document(registry, target, inner).map(FieldValue::from)
            }
            _ => Err(HydrateError::UnexpectedShape {
                path: path.to_string(),
                expected: "embedded document".to_string(),
            }),
        },
        FieldKind::Reference { .. } => match value {
            Value::Id(id) => Ok(FieldValue::Ref(Reference::Unresolved {
                id: *id,
                target: None,
            })),
            _ => Err(HydrateError::UnexpectedShape {
                path: path.to_string(),
                expected: "identifier".to_string(),
            }),
        },
        FieldKind::GenericReference { .. } => match value {
            Value::Map(entries) => {
                let id = entries
                    .get(ID_STORAGE_NAME)
                    .and_then(Value::as_id)
                    .ok_or_else(|| HydrateError::UnexpectedShape {
                        path: path.to_string(),
                        expected: "identifier with type tag".to_string(),
                    })?;
                let tag = entries
                    .get(DISCRIMINATOR_STORAGE_NAME)
                    .and_then(Value::as_str)
                    .ok_or_else(|| HydrateError::UnexpectedShape {
                        path: path.to_string(),
                        expected: "identifier with type tag".to_string(),
                    })?;
                Ok(FieldValue::Ref(Reference::Unresolved {
                    id,
                    target: Some(tag.to_string()),
                }))
            }
            _ => Err(HydrateError::UnexpectedShape {
                path: path.to_string(),
                expected: "identifier with type tag".to_string(),
            }),
        },
        FieldKind::List(element) if element_is_structured(element) => match value {
            Value::List(items) => {
                let mut hydrated = Vec::with_capacity(items.len());
                for item in items {
                    hydrated.push(hydrate_field_value(registry, element, item, path)?);
                }
                Ok(FieldValue::List(hydrated))
            }
            _ => Err(HydrateError::UnexpectedShape {
                path: path.to_string(),
                expected: "list".to_string(),
            }),
        },
        FieldKind::Map(element) if element_is_structured(element) => match value {
            Value::Map(entries) => {
                let mut hydrated = BTreeMap::new();
                for (key, item) in entries {
                    hydrated.insert(
                        key.clone(),
                        hydrate_field_value(registry, element, item, path)?,
                    );
                }
                Ok(FieldValue::Map(hydrated))
            }
            _ => Err(HydrateError::UnexpectedShape {
                path: path.to_string(),
                expected: "map".to_string(),
            }),
        },
        // Scalars and scalar containers stay plain values.
        _ => Ok(FieldValue::Value(value.clone())),
    }
}

/// Element kinds that hydrate into tracked structures rather than plain
/// values.
fn element_is_structured(kind: &FieldKind) -> bool {
    match kind {
        FieldKind::Embedded(_)
        | FieldKind::Reference { .. }
        | FieldKind::GenericReference { .. } => true,
        FieldKind::List(element) | FieldKind::Map(element) => element_is_structured(element),
        _ => false,
    }
}
