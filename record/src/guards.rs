//! Scoped mutation guards.
//!
//! Embedded sub-records and container fields are mutated through guards
//! borrowed from the owning instance. The guards carry the change
//! propagation: an embedded guard re-marks the child's recorded paths on
//! the parent when it drops, and container guards mark the owning field as
//! one changed unit on the first mutating call.

use crate::changes::ChangeSet;
use crate::instance::{FieldValue, RecordInstance};
use dorm_core::join_path;
use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};

/// Mutable borrow of an embedded sub-record.
///
/// On drop, every storage path recorded on the child is marked on the
/// parent prefixed with the embedding field's storage name. Nested guards
/// compose: a grandchild's paths reach the root one hop per guard drop.
pub struct EmbeddedMut<'a> {
    pub(crate) child: &'a mut RecordInstance,
    pub(crate) parent_changed: &'a mut ChangeSet,
    pub(crate) prefix: String,
}

impl Deref for EmbeddedMut<'_> {
    type Target = RecordInstance;

    fn deref(&self) -> &RecordInstance {
        self.child
    }
}

impl DerefMut for EmbeddedMut<'_> {
    fn deref_mut(&mut self) -> &mut RecordInstance {
        self.child
    }
}

impl Drop for EmbeddedMut<'_> {
    fn drop(&mut self) {
        for path in self.child.changed_paths() {
            self.parent_changed.mark(&join_path(&self.prefix, path));
        }
    }
}

/// Mutable borrow of a list field.
///
/// Any mutating call marks the whole field changed; element-level diffing
/// is not attempted. Mutable element access counts as a mutation.
pub struct ListMut<'a> {
    pub(crate) items: &'a mut Vec<FieldValue>,
    pub(crate) changed: &'a mut ChangeSet,
    pub(crate) storage_name: String,
    pub(crate) dirty: bool,
}

impl ListMut<'_> {
    /// Number of elements.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the list holds no elements.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Get an element by position.
    pub fn get(&self, index: usize) -> Option<&FieldValue> {
        self.items.get(index)
    }

    /// Iterate elements in order.
    pub fn iter(&self) -> impl Iterator<Item = &FieldValue> {
        self.items.iter()
    }

    /// Append an element.
    pub fn push(&mut self, value: impl Into<FieldValue>) {
        self.dirty = true;
        self.items.push(value.into());
    }

    /// Insert an element at a position.
    pub fn insert(&mut self, index: usize, value: impl Into<FieldValue>) {
        self.dirty = true;
        self.items.insert(index, value.into());
    }

    /// Remove and return the element at a position, or None when out of
    /// bounds.
    pub fn remove(&mut self, index: usize) -> Option<FieldValue> {
        if index >= self.items.len() {
            return None;
        }
        self.dirty = true;
        Some(self.items.remove(index))
    }

    /// Replace the element at a position. Returns false when out of bounds.
    pub fn set(&mut self, index: usize, value: impl Into<FieldValue>) -> bool {
        match self.items.get_mut(index) {
            Some(slot) => {
                self.dirty = true;
                *slot = value.into();
                true
            }
            None => false,
        }
    }

    /// Mutable element access. Marks the field changed: element-level
    /// mutations collapse to whole-container replacement.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut FieldValue> {
        if index >= self.items.len() {
            return None;
        }
        self.dirty = true;
        self.items.get_mut(index)
    }

    /// Remove all elements.
    pub fn clear(&mut self) {
        self.dirty = true;
        self.items.clear();
    }
}

impl Drop for ListMut<'_> {
    fn drop(&mut self) {
        if self.dirty {
            self.changed.mark(&self.storage_name);
        }
    }
}

/// Mutable borrow of a map field. Same tracking policy as [`ListMut`].
pub struct MapMut<'a> {
    pub(crate) entries: &'a mut BTreeMap<String, FieldValue>,
    pub(crate) changed: &'a mut ChangeSet,
    pub(crate) storage_name: String,
    pub(crate) dirty: bool,
}

impl MapMut<'_> {
    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the map holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get an entry by key.
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.entries.get(key)
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Insert or replace an entry.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        self.dirty = true;
        self.entries.insert(key.into(), value.into());
    }

    /// Remove an entry by key.
    pub fn remove(&mut self, key: &str) -> Option<FieldValue> {
        let removed = self.entries.remove(key);
        if removed.is_some() {
            self.dirty = true;
        }
        removed
    }

    /// Remove all entries.
    pub fn clear(&mut self) {
        self.dirty = true;
        self.entries.clear();
    }
}

impl Drop for MapMut<'_> {
    fn drop(&mut self) {
        if self.dirty {
            self.changed.mark(&self.storage_name);
        }
    }
}
