//! The dirty tracker: a collapsed set of changed storage paths.

use dorm_core::is_descendant_path;
use std::collections::BTreeSet;

/// Set of dot-joined storage-name paths recorded as changed.
///
/// The set is kept collapsed: marking a path drops any more-specific paths
/// already recorded beneath it (the parent's full value will be
/// re-serialized), and marking a path whose ancestor is already recorded is
/// a no-op. Insertion order is irrelevant; iteration is sorted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    paths: BTreeSet<String>,
}

impl ChangeSet {
    /// Create an empty change set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a storage path as changed.
    pub fn mark(&mut self, path: &str) {
        if self.covers(path) {
            return;
        }

        let descendants: Vec<String> = self
            .paths
            .iter()
            .filter(|existing| is_descendant_path(existing, path))
            .cloned()
            .collect();
        for descendant in descendants {
            self.paths.remove(&descendant);
        }

        self.paths.insert(path.to_string());
    }

    /// Returns true if the exact path or one of its ancestors is recorded.
    pub fn covers(&self, path: &str) -> bool {
        if self.paths.contains(path) {
            return true;
        }
        path.char_indices()
            .filter(|(_, ch)| *ch == '.')
            .any(|(i, _)| self.paths.contains(&path[..i]))
    }

    /// Returns true if nothing is recorded.
    pub fn is_clean(&self) -> bool {
        self.paths.is_empty()
    }

    /// Number of recorded paths.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Returns true if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Recorded paths in sorted order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }

    /// Forget all recorded paths.
    pub fn clear(&mut self) {
        self.paths.clear();
    }
}
