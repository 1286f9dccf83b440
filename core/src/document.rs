//! Document representation and storage-path helpers.
//!
//! A document is the store-native form of one persisted record: a mapping
//! from storage names to values. Storage paths are dot-joined sequences of
//! storage names that locate a value within a document, possibly crossing
//! embedded-record boundaries. Paths never index into lists.

use crate::Value;
use std::collections::BTreeMap;

/// The store-native form of one record: storage name to value.
pub type Document = BTreeMap<String, Value>;

/// Join a path prefix and a local storage name.
pub fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

/// Returns true if `path` addresses a strict descendant of `ancestor`.
pub fn is_descendant_path(path: &str, ancestor: &str) -> bool {
    path.len() > ancestor.len()
        && path.starts_with(ancestor)
        && path.as_bytes()[ancestor.len()] == b'.'
}

/// Resolve a dotted storage path within a document.
///
/// Intermediate segments must resolve to Map values; anything else (or a
/// missing key) yields None.
pub fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = doc.get(first)?;

    for segment in segments {
        match current {
            Value::Map(entries) => current = entries.get(segment)?,
            _ => return None,
        }
    }

    Some(current)
}

/// Set the value at a dotted storage path, creating intermediate maps.
///
/// An intermediate segment holding a non-map value is replaced by a map;
/// the store's update primitive is a blind per-path write.
pub fn apply_set(doc: &mut Document, path: &str, value: Value) {
    let segments: Vec<&str> = path.split('.').collect();
    let (leaf, parents) = match segments.split_last() {
        Some(split) => split,
        None => return,
    };

    let mut current = doc;
    for segment in parents {
        let entry = current
            .entry((*segment).to_string())
            .or_insert_with(|| Value::Map(BTreeMap::new()));
        if !entry.is_map() {
            *entry = Value::Map(BTreeMap::new());
        }
        match entry {
            Value::Map(entries) => current = entries,
            _ => unreachable!("entry was just normalized to a map"),
        }
    }

    current.insert((*leaf).to_string(), value);
}

/// Remove the value at a dotted storage path. Missing paths are a no-op.
pub fn apply_unset(doc: &mut Document, path: &str) {
    let segments: Vec<&str> = path.split('.').collect();
    let (leaf, parents) = match segments.split_last() {
        Some(split) => split,
        None => return,
    };

    let mut current = doc;
    for segment in parents {
        match current.get_mut(*segment) {
            Some(Value::Map(entries)) => current = entries,
            _ => return,
        }
    }

    current.remove(*leaf);
}
