//! Index specifications.
//!
//! Declared on record types at registration time and handed to the store's
//! `ensure_index` operation. Index maintenance is entirely the store
//! driver's concern; the core only transports the spec.

use serde::{Deserialize, Serialize};

/// A store index over one or more storage paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    /// Storage paths covered by the index, in order.
    pub fields: Vec<String>,
    /// Whether the index enforces uniqueness.
    pub unique: bool,
}

impl IndexSpec {
    /// Create an index spec over the given storage paths.
    pub fn on<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            unique: false,
        }
    }

    /// Mark the index as unique.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}
