//! Schema definition types.

use dorm_core::{IndexSpec, Value};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Reserved storage name for the primary identifier.
pub const ID_STORAGE_NAME: &str = "_id";

/// Reserved storage name for the polymorphism discriminator.
///
/// The stored value is the dot-joined ancestor chain of the record's exact
/// type (e.g. `Animal.Mammal.Dog`), present only when the type's collection
/// root allows polymorphism.
pub const DISCRIMINATOR_STORAGE_NAME: &str = "_type";

/// Policy applied to referencing documents when a referenced document is
/// deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DeleteRule {
    /// Leave the dangling reference in place (default).
    #[default]
    None,
    /// Refuse the deletion while any referencing document exists.
    Deny,
    /// Clear the reference field on every referencing document.
    Nullify,
    /// Recursively delete every referencing document.
    Cascade,
    /// Remove the identifier from a list-of-reference field.
    Pull,
}

/// Declared type shape of a field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// Boolean scalar.
    Bool,
    /// 64-bit signed integer scalar.
    Int,
    /// 64-bit float scalar.
    Float,
    /// UTF-8 string scalar.
    String,
    /// Raw byte sequence.
    Bytes,
    /// Milliseconds since Unix epoch.
    Timestamp,
    /// Record identifier scalar (primary keys).
    Id,
    /// Ordered sequence of a single element kind.
    List(Box<FieldKind>),
    /// String-keyed mapping of a single element kind.
    Map(Box<FieldKind>),
    /// Embedded sub-record of a registered embedded type.
    Embedded(String),
    /// Typed reference to a top-level record. Stored as a bare identifier.
    Reference {
        /// Target type name.
        target: String,
        /// What happens to holders of this reference on target delete.
        delete_rule: DeleteRule,
    },
    /// Untyped reference. Stored as an identifier plus a type tag.
    GenericReference {
        /// What happens to holders of this reference on target delete.
        delete_rule: DeleteRule,
    },
}

impl FieldKind {
    /// Returns true for list and map kinds.
    pub fn is_collection(&self) -> bool {
        matches!(self, FieldKind::List(_) | FieldKind::Map(_))
    }

    /// The delete rule declared on this kind, walking through one level of
    /// list nesting (list-of-reference fields carry the rule on the element).
    pub fn delete_rule(&self) -> DeleteRule {
        match self {
            FieldKind::Reference { delete_rule, .. }
            | FieldKind::GenericReference { delete_rule } => *delete_rule,
            FieldKind::List(element) | FieldKind::Map(element) => element.delete_rule(),
            _ => DeleteRule::None,
        }
    }

    /// Human-readable label for error messages.
    pub fn label(&self) -> String {
        match self {
            FieldKind::Bool => "Bool".to_string(),
            FieldKind::Int => "Int".to_string(),
            FieldKind::Float => "Float".to_string(),
            FieldKind::String => "String".to_string(),
            FieldKind::Bytes => "Bytes".to_string(),
            FieldKind::Timestamp => "Timestamp".to_string(),
            FieldKind::Id => "Id".to_string(),
            FieldKind::List(element) => format!("List<{}>", element.label()),
            FieldKind::Map(element) => format!("Map<{}>", element.label()),
            FieldKind::Embedded(name) => format!("Embedded<{}>", name),
            FieldKind::Reference { target, .. } => format!("Reference<{}>", target),
            FieldKind::GenericReference { .. } => "GenericReference".to_string(),
        }
    }
}

/// How a field obtains its value when none is supplied.
#[derive(Debug, Clone)]
pub enum FieldDefault {
    /// No default; the field starts absent.
    None,
    /// A fixed value, cloned per instance.
    Value(Value),
    /// A producer invoked per instance (timestamps, generated slugs).
    Producer(fn() -> Value),
}

impl FieldDefault {
    /// Produce the default value, if any.
    pub fn resolve(&self) -> Option<Value> {
        match self {
            FieldDefault::None => None,
            FieldDefault::Value(value) => Some(value.clone()),
            FieldDefault::Producer(producer) => Some(producer()),
        }
    }
}

/// Field descriptor within a record type.
#[derive(Debug, Clone)]
pub struct FieldDef {
    /// Logical field name used by application code.
    pub name: String,
    /// Storage-level name used in documents and paths.
    pub storage_name: String,
    /// Declared type shape.
    pub kind: FieldKind,
    /// Default value source.
    pub default: FieldDefault,
    /// Whether the field must hold a value at save time.
    pub required: bool,
    /// Whether this is the primary-key field.
    pub primary: bool,
    /// Regex the string value must match (string fields only).
    pub match_pattern: Option<String>,
}

impl FieldDef {
    /// Create a field descriptor. The storage name defaults to the
    /// logical name.
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        let name = name.into();
        Self {
            storage_name: name.clone(),
            name,
            kind,
            default: FieldDefault::None,
            required: false,
            primary: false,
            match_pattern: None,
        }
    }

    /// Override the storage-level name.
    pub fn storage(mut self, storage_name: impl Into<String>) -> Self {
        self.storage_name = storage_name.into();
        self
    }

    /// Mark the field required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Mark the field as the primary key.
    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    /// Set a fixed default value.
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = FieldDefault::Value(value.into());
        self
    }

    /// Set a default-value producer.
    pub fn with_default_producer(mut self, producer: fn() -> Value) -> Self {
        self.default = FieldDefault::Producer(producer);
        self
    }

    /// Require string values to match a regex.
    pub fn with_match_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.match_pattern = Some(pattern.into());
        self
    }

    /// The implicit primary-key descriptor added to root record types that
    /// declare none of their own.
    pub(crate) fn implicit_id() -> Self {
        Self::new("id", FieldKind::Id).storage(ID_STORAGE_NAME).primary()
    }
}

/// Record type descriptor.
///
/// Field lists are fully merged at registration time: inherited fields come
/// first in ancestor order, subclass-declared fields are appended, and a
/// subclass redeclaring an inherited logical name replaces it in place.
#[derive(Debug, Clone)]
pub struct TypeDef {
    /// Type name.
    pub name: String,
    /// Immediate supertype, if any.
    pub parent: Option<String>,
    /// Merged, ordered field descriptors.
    pub fields: Vec<FieldDef>,
    /// Explicitly configured collection name.
    pub collection: Option<String>,
    /// Whether subtypes may be registered under this type.
    pub allow_polymorphism: bool,
    /// Abstract types have no physical collection and cannot be
    /// instantiated directly.
    pub is_abstract: bool,
    /// Embedded types serialize inside a parent record and have no
    /// collection or identifier of their own.
    pub is_embedded: bool,
    /// Indexes ensured on the collection at registration time.
    pub indexes: Vec<IndexSpec>,
}

impl TypeDef {
    /// Get a field descriptor by logical name.
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Get a field descriptor by storage name.
    pub fn field_by_storage(&self, storage_name: &str) -> Option<&FieldDef> {
        self.fields
            .iter()
            .find(|field| field.storage_name == storage_name)
    }

    /// The primary-key field, if declared.
    pub fn primary_field(&self) -> Option<&FieldDef> {
        self.fields.iter().find(|field| field.primary)
    }

    /// Returns true for types that own documents in a collection.
    pub fn is_storable(&self) -> bool {
        !self.is_embedded && !self.is_abstract
    }
}

/// Declared target of a reference site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefTarget {
    /// Fixed target type.
    Typed(String),
    /// Target type carried alongside the stored identifier.
    Generic,
}

/// One reference-bearing storage path, precomputed at registration time.
///
/// The cascade engine scans these to find documents referencing a doomed
/// record. Paths may cross embedded-record boundaries and list elements.
#[derive(Debug, Clone)]
pub struct RefSite {
    /// Root storable type declaring the path.
    pub source_type: String,
    /// Physical collection holding the referencing documents.
    pub collection: String,
    /// Storage path of the reference field.
    pub path: String,
    /// Declared delete rule.
    pub rule: DeleteRule,
    /// Declared target.
    pub target: RefTarget,
    /// Whether the path addresses elements of a list field.
    pub in_list: bool,
}

/// Precomputed transitive subtype/supertype relationships.
#[derive(Debug, Default)]
pub struct SubtypeIndex {
    /// For each type, the set of all its subtypes (transitive).
    subtypes: HashMap<String, HashSet<String>>,
    /// For each type, the set of all its supertypes (transitive).
    supertypes: HashMap<String, HashSet<String>>,
}

impl SubtypeIndex {
    /// Build the index from parent links. Callers have already rejected
    /// cycles and unknown parents.
    pub(crate) fn build(types: &HashMap<String, TypeDef>) -> Self {
        let mut index = Self::default();

        for name in types.keys() {
            index.subtypes.insert(name.clone(), HashSet::new());
            index.supertypes.insert(name.clone(), HashSet::new());
        }

        for (name, type_def) in types {
            let mut ancestor = type_def.parent.clone();
            while let Some(parent_name) = ancestor {
                if let Some(set) = index.subtypes.get_mut(&parent_name) {
                    set.insert(name.clone());
                }
                if let Some(set) = index.supertypes.get_mut(name) {
                    set.insert(parent_name.clone());
                }
                ancestor = types
                    .get(&parent_name)
                    .and_then(|parent| parent.parent.clone());
            }
        }

        index
    }

    /// All transitive subtypes of a type.
    pub fn subtypes_of(&self, name: &str) -> impl Iterator<Item = &str> {
        self.subtypes
            .get(name)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    /// All transitive supertypes of a type.
    pub fn supertypes_of(&self, name: &str) -> impl Iterator<Item = &str> {
        self.supertypes
            .get(name)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    /// Returns true if `sub` is `name` itself or a transitive subtype.
    pub fn is_same_or_subtype(&self, sub: &str, name: &str) -> bool {
        sub == name
            || self
                .subtypes
                .get(name)
                .is_some_and(|set| set.contains(sub))
    }
}
