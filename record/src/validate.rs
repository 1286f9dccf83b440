//! Pre-save validation of record instances.
//!
//! Validation checks shape only: required fields are present and non-null,
//! held values match their declared kinds, string patterns match. Embedded
//! sub-records are validated recursively. Nothing here touches the store.

use crate::instance::{FieldValue, RecordInstance, Reference};
use dorm_core::Value;
use dorm_registry::{FieldKind, Registry};
use regex_lite::Regex;
use thiserror::Error;

/// Errors raised by pre-save validation.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Unknown type: {name}")]
    UnknownType { name: String },

    #[error("Required field {type_name}.{field} is missing")]
    MissingRequired { type_name: String, field: String },

    #[error("Field {type_name}.{field} expects {expected}, found {found}")]
    KindMismatch {
        type_name: String,
        field: String,
        expected: String,
        found: String,
    },

    #[error("Field {type_name}.{field} value {value:?} does not match /{pattern}/")]
    PatternMismatch {
        type_name: String,
        field: String,
        value: String,
        pattern: String,
    },

    #[error("Field {type_name}.{field} declares an invalid pattern: {pattern}")]
    InvalidPattern {
        type_name: String,
        field: String,
        pattern: String,
    },
}

/// Validate an instance against its registered type.
pub fn validate(registry: &Registry, record: &RecordInstance) -> Result<(), ValidationError> {
    let type_def = registry
        .get(record.type_name())
        .ok_or_else(|| ValidationError::UnknownType {
            name: record.type_name().to_string(),
        })?;

    for field in &type_def.fields {
        if field.primary {
            continue;
        }
        let held = record.get(&field.name);

        if field.required {
            let missing = match held {
                None => true,
                Some(FieldValue::Value(Value::Null)) => true,
                _ => false,
            };
            if missing {
                return Err(ValidationError::MissingRequired {
                    type_name: type_def.name.clone(),
                    field: field.name.clone(),
                });
            }
        }

        if let Some(value) = held {
            check_kind(registry, &type_def.name, &field.name, &field.kind, value)?;

            if let Some(pattern) = &field.match_pattern {
                check_pattern(&type_def.name, &field.name, pattern, value)?;
            }
        }
    }

    Ok(())
}

fn check_kind(
    registry: &Registry,
    type_name: &str,
    field: &str,
    kind: &FieldKind,
    value: &FieldValue,
) -> Result<(), ValidationError> {
    // Null is the universal absent marker, valid for any kind.
    if matches!(value, FieldValue::Value(Value::Null)) {
        return Ok(());
    }

    let ok = match (kind, value) {
        (FieldKind::Bool, FieldValue::Value(Value::Bool(_))) => true,
        (FieldKind::Int, FieldValue::Value(Value::Int(_))) => true,
        (FieldKind::Float, FieldValue::Value(Value::Float(_))) => true,
        (FieldKind::String, FieldValue::Value(Value::String(_))) => true,
        (FieldKind::Bytes, FieldValue::Value(Value::Bytes(_))) => true,
        (FieldKind::Timestamp, FieldValue::Value(Value::Timestamp(_))) => true,
        (FieldKind::Id, FieldValue::Value(Value::Id(_))) => true,

        (FieldKind::List(element), FieldValue::List(items)) => {
            for item in items {
                check_kind(registry, type_name, field, element, item)?;
            }
            true
        }
        (FieldKind::List(element), FieldValue::Value(Value::List(items))) => {
            for item in items {
                check_scalar_kind(type_name, field, element, item)?;
            }
            true
        }
        (FieldKind::Map(element), FieldValue::Map(entries)) => {
            for item in entries.values() {
                check_kind(registry, type_name, field, element, item)?;
            }
            true
        }
        (FieldKind::Map(element), FieldValue::Value(Value::Map(entries))) => {
            for item in entries.values() {
                check_scalar_kind(type_name, field, element, item)?;
            }
            true
        }

        (FieldKind::Embedded(target), FieldValue::Record(inner)) => {
            if !registry.is_same_or_subtype(inner.type_name(), target) {
                return Err(ValidationError::KindMismatch {
                    type_name: type_name.to_string(),
                    field: field.to_string(),
                    expected: target.clone(),
                    found: inner.type_name().to_string(),
                });
            }
            validate(registry, inner)?;
            true
        }

        (FieldKind::Reference { target, .. }, FieldValue::Ref(reference)) => {
            if let Reference::Resolved(inner) = reference {
                if !registry.is_same_or_subtype(inner.type_name(), target) {
                    return Err(ValidationError::KindMismatch {
                        type_name: type_name.to_string(),
                        field: field.to_string(),
                        expected: target.clone(),
                        found: inner.type_name().to_string(),
                    });
                }
            }
            true
        }
        (FieldKind::GenericReference { .. }, FieldValue::Ref(_)) => true,

        _ => false,
    };

    if ok {
        Ok(())
    } else {
        Err(ValidationError::KindMismatch {
            type_name: type_name.to_string(),
            field: field.to_string(),
            expected: kind.label(),
            found: describe(value),
        })
    }
}

fn check_scalar_kind(
    type_name: &str,
    field: &str,
    kind: &FieldKind,
    value: &Value,
) -> Result<(), ValidationError> {
    let ok = match (kind, value) {
        (_, Value::Null) => true,
        (FieldKind::Bool, Value::Bool(_)) => true,
        (FieldKind::Int, Value::Int(_)) => true,
        (FieldKind::Float, Value::Float(_)) => true,
        (FieldKind::String, Value::String(_)) => true,
        (FieldKind::Bytes, Value::Bytes(_)) => true,
        (FieldKind::Timestamp, Value::Timestamp(_)) => true,
        (FieldKind::Id, Value::Id(_)) => true,
        (FieldKind::List(element), Value::List(items)) => {
            for item in items {
                check_scalar_kind(type_name, field, element, item)?;
            }
            true
        }
        (FieldKind::Map(element), Value::Map(entries)) => {
            for item in entries.values() {
                check_scalar_kind(type_name, field, element, item)?;
            }
            true
        }
        _ => false,
    };

    if ok {
        Ok(())
    } else {
        Err(ValidationError::KindMismatch {
            type_name: type_name.to_string(),
            field: field.to_string(),
            expected: kind.label(),
            found: value.type_name().to_string(),
        })
    }
}

fn check_pattern(
    type_name: &str,
    field: &str,
    pattern: &str,
    value: &FieldValue,
) -> Result<(), ValidationError> {
    let text = match value {
        FieldValue::Value(Value::String(text)) => text,
        _ => return Ok(()),
    };

    let regex = Regex::new(pattern).map_err(|_| ValidationError::InvalidPattern {
        type_name: type_name.to_string(),
        field: field.to_string(),
        pattern: pattern.to_string(),
    })?;

    if regex.is_match(text) {
        Ok(())
    } else {
        Err(ValidationError::PatternMismatch {
            type_name: type_name.to_string(),
            field: field.to_string(),
            value: text.clone(),
            pattern: pattern.to_string(),
        })
    }
}

fn describe(value: &FieldValue) -> String {
    match value {
        FieldValue::Value(value) => value.type_name().to_string(),
        FieldValue::Record(inner) => inner.type_name().to_string(),
        FieldValue::List(_) => "list".to_string(),
        FieldValue::Map(_) => "map".to_string(),
        FieldValue::Ref(_) => "reference".to_string(),
    }
}
