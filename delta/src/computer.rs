//! Delta computation from recorded change paths.

use dorm_core::{is_descendant_path, Value};
use dorm_record::{serialize_field_value, FieldValue, RecordInstance, SerializeError};
use dorm_registry::{FieldKind, Registry};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Errors raised while computing a delta.
#[derive(Debug, Error)]
pub enum DeltaError {
    #[error("Unknown type: {name}")]
    UnknownType { name: String },

    #[error("Changed path {path} does not resolve through type {type_name}")]
    UnknownPath { type_name: String, path: String },

    #[error(transparent)]
    Serialize(#[from] SerializeError),
}

/// The minimal update for one dirty record: values to write and paths to
/// remove, both keyed by dot-joined storage path.
#[derive(Debug, Clone, Default)]
pub struct Delta {
    /// Paths to overwrite with a serialized value.
    pub set: BTreeMap<String, Value>,
    /// Paths to remove from the stored document.
    pub unset: BTreeSet<String>,
}

impl Delta {
    /// Returns true when the delta carries no operations.
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.unset.is_empty()
    }
}

/// Compute the store update for a record's recorded changes.
///
/// Each changed path resolves through the instance by storage names. A
/// path that resolves to a held value becomes a `set`; a path whose value
/// is absent becomes an `unset`. An empty list or map also becomes an
/// `unset`: the wire format cannot distinguish an explicit empty
/// collection from a removed one, so empty collections are stored as
/// absence.
///
/// A clean record yields an empty delta. The tracker keeps its path set
/// collapsed, but a path shadowed by a recorded ancestor is skipped here
/// as well, so externally assembled change sets behave identically.
pub fn compute_delta(registry: &Registry, record: &RecordInstance) -> Result<Delta, DeltaError> {
    let paths: Vec<&str> = record.changed_paths().collect();
    let mut delta = Delta::default();

    for path in &paths {
        let shadowed = paths
            .iter()
            .any(|ancestor| is_descendant_path(path, ancestor));
        if shadowed {
            continue;
        }

        match resolve_path(registry, record, path)? {
            Some((value, _)) if value.is_empty_collection() => {
                delta.unset.insert((*path).to_string());
            }
            Some((value, kind)) => {
                delta.set.insert(
                    (*path).to_string(),
                    serialize_field_value(registry, Some(kind), value)?,
                );
            }
            None => {
                delta.unset.insert((*path).to_string());
            }
        }
    }

    Ok(delta)
}

/// Walk a dot-joined storage path through an instance.
///
/// Returns the held value and its declared kind, or None when any segment
/// along the way holds nothing.
fn resolve_path<'a, 'r>(
    registry: &'r Registry,
    record: &'a RecordInstance,
    path: &str,
) -> Result<Option<(&'a FieldValue, &'r FieldKind)>, DeltaError> {
    let mut current = record;
    let mut segments = path.split('.').peekable();

    while let Some(segment) = segments.next() {
        let type_def =
            registry
                .get(current.type_name())
                .ok_or_else(|| DeltaError::UnknownType {
                    name: current.type_name().to_string(),
                })?;
        let field =
            type_def
                .field_by_storage(segment)
                .ok_or_else(|| DeltaError::UnknownPath {
                    type_name: current.type_name().to_string(),
                    path: path.to_string(),
                })?;

        let held = current.get(&field.name);

        if segments.peek().is_none() {
            return Ok(held.map(|value| (value, &field.kind)));
        }

        match held {
            Some(FieldValue::Record(inner)) => current = inner,
            // A detached or never-set intermediate leaves nothing to write.
            None => return Ok(None),
            Some(_) => {
                return Err(DeltaError::UnknownPath {
                    type_name: current.type_name().to_string(),
                    path: path.to_string(),
                })
            }
        }
    }

    Ok(None)
}
