//! The Registry - immutable schema lookup.

use crate::types::{RefSite, SubtypeIndex, TypeDef};
use std::collections::HashMap;

/// The Registry provides runtime lookup of record type definitions.
/// It is immutable after construction.
#[derive(Debug)]
pub struct Registry {
    /// Type definitions by name, fields fully merged.
    types: HashMap<String, TypeDef>,
    /// Registration order.
    order: Vec<String>,
    /// Precomputed subtype relationships.
    subtype_index: SubtypeIndex,
    /// Dot-joined ancestor chains (discriminator values).
    qualified: HashMap<String, String>,
    /// Resolved physical collection per type (None for embedded and
    /// purely abstract types).
    collections: HashMap<String, Option<String>>,
    /// Whether instances of a type store a discriminator.
    polymorphic: HashMap<String, bool>,
    /// Delete-rule-bearing reference paths across all types.
    sites: Vec<RefSite>,
}

impl Registry {
    pub(crate) fn new(
        types: HashMap<String, TypeDef>,
        order: Vec<String>,
        subtype_index: SubtypeIndex,
        qualified: HashMap<String, String>,
        collections: HashMap<String, Option<String>>,
        polymorphic: HashMap<String, bool>,
        sites: Vec<RefSite>,
    ) -> Self {
        Self {
            types,
            order,
            subtype_index,
            qualified,
            collections,
            polymorphic,
            sites,
        }
    }

    // ==================== Type Lookups ====================

    /// Get a type definition by name.
    pub fn get(&self, name: &str) -> Option<&TypeDef> {
        self.types.get(name)
    }

    /// Returns true if the type is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// All type definitions in registration order.
    pub fn all_types(&self) -> impl Iterator<Item = &TypeDef> {
        self.order.iter().filter_map(|name| self.types.get(name))
    }

    /// Number of registered types.
    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    // ==================== Hierarchy ====================

    /// Ordered root-to-self ancestor chain of descriptors.
    pub fn ancestors(&self, name: &str) -> Vec<&TypeDef> {
        let mut chain = Vec::new();
        let mut current = self.types.get(name);
        while let Some(type_def) = current {
            chain.push(type_def);
            current = type_def.parent.as_deref().and_then(|p| self.types.get(p));
        }
        chain.reverse();
        chain
    }

    /// Ancestor descriptors keyed by their qualified names, root first.
    pub fn superclasses(&self, name: &str) -> Vec<(&str, &TypeDef)> {
        self.ancestors(name)
            .into_iter()
            .map(|type_def| {
                let qualified = self
                    .qualified_name(&type_def.name)
                    .unwrap_or(type_def.name.as_str());
                (qualified, type_def)
            })
            .collect()
    }

    /// All transitive subtypes of a type.
    pub fn subtypes(&self, name: &str) -> impl Iterator<Item = &str> {
        self.subtype_index.subtypes_of(name)
    }

    /// Returns true if `sub` is `name` itself or one of its subtypes.
    pub fn is_same_or_subtype(&self, sub: &str, name: &str) -> bool {
        self.subtype_index.is_same_or_subtype(sub, name)
    }

    /// Returns true if the two types share an inheritance line.
    pub fn is_related(&self, a: &str, b: &str) -> bool {
        self.subtype_index.is_same_or_subtype(a, b)
            || self.subtype_index.is_same_or_subtype(b, a)
    }

    // ==================== Discriminators ====================

    /// The dot-joined ancestor chain of a type (its discriminator value).
    pub fn qualified_name(&self, name: &str) -> Option<&str> {
        self.qualified.get(name).map(String::as_str)
    }

    /// Sorted discriminator values covering a type and all its registered
    /// subtypes; the filter set for a polymorphic query.
    pub fn discriminator_set(&self, name: &str) -> Vec<String> {
        let mut set: Vec<String> = std::iter::once(name)
            .chain(self.subtype_index.subtypes_of(name))
            .filter_map(|n| self.qualified_name(n))
            .map(str::to_string)
            .collect();
        set.sort();
        set
    }

    /// Resolve a stored discriminator to the most specific registered type
    /// on its chain. Returns None when no segment of the chain is known.
    pub fn resolve_discriminator(&self, discriminator: &str) -> Option<&TypeDef> {
        let segments: Vec<&str> = discriminator.split('.').collect();
        for depth in (1..=segments.len()).rev() {
            let candidate = segments[depth - 1];
            if self.qualified_name(candidate) == Some(&segments[..depth].join(".")) {
                return self.types.get(candidate);
            }
        }
        None
    }

    /// Whether instances of this type store a discriminator field.
    pub fn is_polymorphic(&self, name: &str) -> bool {
        self.polymorphic.get(name).copied().unwrap_or(false)
    }

    // ==================== Collections ====================

    /// The physical collection a type's documents live in: the configured
    /// or default-derived name of the first non-abstract ancestor.
    pub fn collection_of(&self, name: &str) -> Option<&str> {
        self.collections.get(name).and_then(|c| c.as_deref())
    }

    // ==================== Reference Sites ====================

    /// Every delete-rule-bearing reference path across registered types.
    pub fn reference_sites(&self) -> &[RefSite] {
        &self.sites
    }
}
