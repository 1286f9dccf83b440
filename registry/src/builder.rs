//! RegistryBuilder for constructing an immutable Registry.

use crate::registry::Registry;
use crate::types::{
    DeleteRule, FieldDef, FieldKind, RefSite, RefTarget, SubtypeIndex, TypeDef,
};
use convert_case::{Case, Casing};
use dorm_core::{join_path, IndexSpec};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Errors that can occur during registry construction.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Duplicate type name: {0}")]
    DuplicateTypeName(String),

    #[error("Unknown parent type: {parent} for {type_name}")]
    UnknownParentType { type_name: String, parent: String },

    #[error("Inheritance cycle detected involving type: {0}")]
    InheritanceCycle(String),

    #[error("Type {parent} does not allow polymorphism; cannot register subtype {type_name}")]
    InheritanceNotAllowed { type_name: String, parent: String },

    #[error("Type {type_name} and parent {parent} disagree on embedded-ness")]
    EmbeddedInheritanceMismatch { type_name: String, parent: String },

    #[error("Duplicate storage name on type {type_name}: {storage_name}")]
    DuplicateStorageName {
        type_name: String,
        storage_name: String,
    },

    #[error("Type {type_name} declares more than one primary field")]
    MultiplePrimaryFields { type_name: String },

    #[error("Primary field {field} of type {type_name} must use the reserved storage name")]
    PrimaryStorageName { type_name: String, field: String },

    #[error(
        "Abstract type {abstract_type} fixes a collection name but concrete descendant {descendant} already fixed a different one"
    )]
    AbstractCollectionConflict {
        abstract_type: String,
        descendant: String,
    },

    #[error("Invalid delete rule on field {field} of type {type_name}: {reason}")]
    InvalidDeleteRule {
        type_name: String,
        field: String,
        reason: String,
    },

    #[error("Field {field} of type {type_name} names unknown or incompatible type {target}")]
    UnknownFieldType {
        type_name: String,
        field: String,
        target: String,
    },

    #[error("Embedded type {type_name} cannot declare a collection, indexes, or a primary field")]
    EmbeddedStorageDeclaration { type_name: String },
}

/// Builder for constructing an immutable Registry.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    /// Declared type definitions in registration order.
    declared: Vec<TypeDef>,
}

impl RegistryBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record type definition.
    pub fn add_type(&mut self, name: impl Into<String>) -> TypeBuilder<'_> {
        TypeBuilder {
            builder: self,
            name: name.into(),
            parent: None,
            fields: Vec::new(),
            collection: None,
            allow_polymorphism: false,
            is_abstract: false,
            is_embedded: false,
            indexes: Vec::new(),
        }
    }

    /// Validate all declared types and produce the immutable registry.
    pub fn build(self) -> Result<Registry, SchemaError> {
        let mut order = Vec::with_capacity(self.declared.len());
        let mut declared: HashMap<String, TypeDef> = HashMap::new();

        for type_def in self.declared {
            if declared.contains_key(&type_def.name) {
                return Err(SchemaError::DuplicateTypeName(type_def.name));
            }
            order.push(type_def.name.clone());
            declared.insert(type_def.name.clone(), type_def);
        }

        for type_def in declared.values() {
            check_parent(type_def, &declared)?;
            check_cycles(type_def, &declared)?;
        }

        // Merge inherited fields top-down, then validate the merged maps.
        let mut merged: HashMap<String, Vec<FieldDef>> = HashMap::new();
        for name in &order {
            merge_fields(name, &declared, &mut merged);
        }

        let mut types: HashMap<String, TypeDef> = HashMap::new();
        for name in &order {
            let mut type_def = declared[name].clone();
            type_def.fields = merged.remove(name).unwrap_or_default();
            check_fields(&type_def, &declared)?;
            types.insert(name.clone(), type_def);
        }

        let subtype_index = SubtypeIndex::build(&types);
        check_abstract_collections(&types, &subtype_index)?;

        let qualified = build_qualified_names(&types, &order);
        let collections = build_collections(&types, &order);
        let polymorphic = build_polymorphic_flags(&types, &order);
        let sites = build_reference_sites(&types, &order, &collections);

        Ok(Registry::new(
            types,
            order,
            subtype_index,
            qualified,
            collections,
            polymorphic,
            sites,
        ))
    }
}

/// Scoped builder for one type definition.
pub struct TypeBuilder<'a> {
    builder: &'a mut RegistryBuilder,
    name: String,
    parent: Option<String>,
    fields: Vec<FieldDef>,
    collection: Option<String>,
    allow_polymorphism: bool,
    is_abstract: bool,
    is_embedded: bool,
    indexes: Vec<IndexSpec>,
}

impl<'a> TypeBuilder<'a> {
    /// Set the supertype.
    pub fn parent(mut self, name: impl Into<String>) -> Self {
        self.parent = Some(name.into());
        self
    }

    /// Declare a field.
    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Fix the collection name instead of deriving it from the type name.
    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.collection = Some(name.into());
        self
    }

    /// Allow subtypes to be registered under this type.
    pub fn polymorphic(mut self) -> Self {
        self.allow_polymorphism = true;
        self
    }

    /// Mark the type abstract: no collection of its own, cannot be
    /// instantiated directly.
    pub fn abstract_type(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Mark the type embedded: serialized inside a parent record.
    pub fn embedded(mut self) -> Self {
        self.is_embedded = true;
        self
    }

    /// Declare an index ensured at registration time.
    pub fn index(mut self, spec: IndexSpec) -> Self {
        self.indexes.push(spec);
        self
    }

    /// Record the definition on the builder.
    pub fn finish(self) {
        self.builder.declared.push(TypeDef {
            name: self.name,
            parent: self.parent,
            fields: self.fields,
            collection: self.collection,
            allow_polymorphism: self.allow_polymorphism,
            is_abstract: self.is_abstract,
            is_embedded: self.is_embedded,
            indexes: self.indexes,
        });
    }
}

fn check_parent(
    type_def: &TypeDef,
    declared: &HashMap<String, TypeDef>,
) -> Result<(), SchemaError> {
    let Some(parent_name) = &type_def.parent else {
        return Ok(());
    };

    let parent = declared
        .get(parent_name)
        .ok_or_else(|| SchemaError::UnknownParentType {
            type_name: type_def.name.clone(),
            parent: parent_name.clone(),
        })?;

    if !parent.allow_polymorphism {
        return Err(SchemaError::InheritanceNotAllowed {
            type_name: type_def.name.clone(),
            parent: parent_name.clone(),
        });
    }

    if parent.is_embedded != type_def.is_embedded {
        return Err(SchemaError::EmbeddedInheritanceMismatch {
            type_name: type_def.name.clone(),
            parent: parent_name.clone(),
        });
    }

    Ok(())
}

fn check_cycles(
    type_def: &TypeDef,
    declared: &HashMap<String, TypeDef>,
) -> Result<(), SchemaError> {
    let mut visited = HashSet::new();
    visited.insert(type_def.name.as_str());

    let mut ancestor = type_def.parent.as_deref();
    while let Some(name) = ancestor {
        if !visited.insert(name) {
            return Err(SchemaError::InheritanceCycle(type_def.name.clone()));
        }
        ancestor = declared.get(name).and_then(|def| def.parent.as_deref());
    }

    Ok(())
}

/// Compute the merged field list for one type: inherited fields first in
/// ancestor order, own fields appended, redeclared logical names replaced
/// in place. Root record types without a primary field get the implicit id.
fn merge_fields(
    name: &str,
    declared: &HashMap<String, TypeDef>,
    merged: &mut HashMap<String, Vec<FieldDef>>,
) {
    if merged.contains_key(name) {
        return;
    }

    let type_def = &declared[name];
    let mut fields: Vec<FieldDef> = match type_def.parent.as_deref() {
        Some(parent) => {
            merge_fields(parent, declared, merged);
            merged[parent].clone()
        }
        None => {
            let declares_primary = type_def.fields.iter().any(|field| field.primary);
            if type_def.is_embedded || declares_primary {
                Vec::new()
            } else {
                vec![FieldDef::implicit_id()]
            }
        }
    };

    for field in &type_def.fields {
        match fields.iter_mut().find(|merged| merged.name == field.name) {
            Some(existing) => *existing = field.clone(),
            None => fields.push(field.clone()),
        }
    }

    merged.insert(name.to_string(), fields);
}

fn check_fields(
    type_def: &TypeDef,
    declared: &HashMap<String, TypeDef>,
) -> Result<(), SchemaError> {
    let mut storage_names = HashSet::new();
    for field in &type_def.fields {
        if !storage_names.insert(field.storage_name.as_str()) {
            return Err(SchemaError::DuplicateStorageName {
                type_name: type_def.name.clone(),
                storage_name: field.storage_name.clone(),
            });
        }
        check_field_kind(type_def, field, &field.kind, false, false, declared)?;
    }

    if type_def.fields.iter().filter(|field| field.primary).count() > 1 {
        return Err(SchemaError::MultiplePrimaryFields {
            type_name: type_def.name.clone(),
        });
    }

    // Identifiers live under one storage key; the store relies on it.
    for field in &type_def.fields {
        if field.primary && field.storage_name != crate::types::ID_STORAGE_NAME {
            return Err(SchemaError::PrimaryStorageName {
                type_name: type_def.name.clone(),
                field: field.name.clone(),
            });
        }
    }

    if type_def.is_embedded
        && (type_def.collection.is_some()
            || !type_def.indexes.is_empty()
            || type_def.fields.iter().any(|field| field.primary))
    {
        return Err(SchemaError::EmbeddedStorageDeclaration {
            type_name: type_def.name.clone(),
        });
    }

    Ok(())
}

fn check_field_kind(
    type_def: &TypeDef,
    field: &FieldDef,
    kind: &FieldKind,
    in_list: bool,
    in_map: bool,
    declared: &HashMap<String, TypeDef>,
) -> Result<(), SchemaError> {
    match kind {
        FieldKind::Reference { target, delete_rule } => {
            let target_def =
                declared
                    .get(target)
                    .ok_or_else(|| SchemaError::UnknownFieldType {
                        type_name: type_def.name.clone(),
                        field: field.name.clone(),
                        target: target.clone(),
                    })?;
            if target_def.is_embedded {
                return Err(SchemaError::UnknownFieldType {
                    type_name: type_def.name.clone(),
                    field: field.name.clone(),
                    target: target.clone(),
                });
            }
            check_delete_rule(type_def, field, *delete_rule, in_list, in_map)
        }
        FieldKind::GenericReference { delete_rule } => {
            check_delete_rule(type_def, field, *delete_rule, in_list, in_map)
        }
        FieldKind::Embedded(target) => {
            let target_def =
                declared
                    .get(target)
                    .ok_or_else(|| SchemaError::UnknownFieldType {
                        type_name: type_def.name.clone(),
                        field: field.name.clone(),
                        target: target.clone(),
                    })?;
            if !target_def.is_embedded {
                return Err(SchemaError::UnknownFieldType {
                    type_name: type_def.name.clone(),
                    field: field.name.clone(),
                    target: target.clone(),
                });
            }
            Ok(())
        }
        FieldKind::List(element) => {
            check_field_kind(type_def, field, element, true, in_map, declared)
        }
        FieldKind::Map(element) => {
            check_field_kind(type_def, field, element, in_list, true, declared)
        }
        _ => Ok(()),
    }
}

/// Delete rules are supported on scalar and list-valued reference fields
/// only; recursive key-addressed cascading through a mapping is not.
fn check_delete_rule(
    type_def: &TypeDef,
    field: &FieldDef,
    rule: DeleteRule,
    in_list: bool,
    in_map: bool,
) -> Result<(), SchemaError> {
    if rule == DeleteRule::None {
        return Ok(());
    }

    if in_map {
        return Err(SchemaError::InvalidDeleteRule {
            type_name: type_def.name.clone(),
            field: field.name.clone(),
            reason: "delete rules are not supported on mapping-valued reference fields"
                .to_string(),
        });
    }

    if rule == DeleteRule::Pull && !in_list {
        return Err(SchemaError::InvalidDeleteRule {
            type_name: type_def.name.clone(),
            field: field.name.clone(),
            reason: "Pull applies to list-of-reference fields only".to_string(),
        });
    }

    Ok(())
}

fn check_abstract_collections(
    types: &HashMap<String, TypeDef>,
    subtype_index: &SubtypeIndex,
) -> Result<(), SchemaError> {
    for type_def in types.values() {
        if !type_def.is_abstract {
            continue;
        }
        let Some(fixed) = &type_def.collection else {
            continue;
        };
        for descendant in subtype_index.subtypes_of(&type_def.name) {
            let descendant_def = &types[descendant];
            if descendant_def.is_abstract {
                continue;
            }
            if let Some(other) = &descendant_def.collection {
                if other != fixed {
                    return Err(SchemaError::AbstractCollectionConflict {
                        abstract_type: type_def.name.clone(),
                        descendant: descendant.to_string(),
                    });
                }
            }
        }
    }

    Ok(())
}

/// Ancestor chains as root-to-self short names joined with `.`.
fn build_qualified_names(
    types: &HashMap<String, TypeDef>,
    order: &[String],
) -> HashMap<String, String> {
    let mut qualified = HashMap::new();
    for name in order {
        let chain = ancestor_chain(name, types);
        qualified.insert(name.clone(), chain.join("."));
    }
    qualified
}

/// The collection a type's documents live in: the configured or
/// snake-case-derived name of the first non-abstract type on the ancestor
/// chain. Embedded types and purely abstract chains have none.
fn build_collections(
    types: &HashMap<String, TypeDef>,
    order: &[String],
) -> HashMap<String, Option<String>> {
    let mut collections = HashMap::new();
    for name in order {
        let collection = collection_owner(name, types).map(|owner| {
            let owner_def = &types[owner];
            owner_def
                .collection
                .clone()
                .unwrap_or_else(|| owner.to_case(Case::Snake))
        });
        collections.insert(name.clone(), collection);
    }
    collections
}

/// Whether instances of a type store a discriminator: the collection owner
/// (or the chain root, for embedded types) allows polymorphism.
fn build_polymorphic_flags(
    types: &HashMap<String, TypeDef>,
    order: &[String],
) -> HashMap<String, bool> {
    let mut polymorphic = HashMap::new();
    for name in order {
        let type_def = &types[name];
        let flag = if type_def.is_embedded {
            let chain = ancestor_chain(name, types);
            types[chain[0]].allow_polymorphism
        } else {
            collection_owner(name, types)
                .map(|owner| types[owner].allow_polymorphism)
                .unwrap_or(false)
        };
        polymorphic.insert(name.clone(), flag);
    }
    polymorphic
}

fn ancestor_chain<'a>(name: &'a str, types: &'a HashMap<String, TypeDef>) -> Vec<&'a str> {
    let mut chain = vec![name];
    let mut ancestor = types[name].parent.as_deref();
    while let Some(parent) = ancestor {
        chain.push(parent);
        ancestor = types[parent].parent.as_deref();
    }
    chain.reverse();
    chain
}

fn collection_owner<'a>(name: &'a str, types: &'a HashMap<String, TypeDef>) -> Option<&'a str> {
    let type_def = &types[name];
    if type_def.is_embedded {
        return None;
    }
    ancestor_chain(name, types)
        .into_iter()
        .find(|ancestor| !types[*ancestor].is_abstract)
}

/// Enumerate every delete-rule-bearing reference path, walking through
/// embedded fields and list elements. Deduplicated per (collection, path)
/// since subclasses share both the collection and the inherited fields.
fn build_reference_sites(
    types: &HashMap<String, TypeDef>,
    order: &[String],
    collections: &HashMap<String, Option<String>>,
) -> Vec<RefSite> {
    let mut sites = Vec::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();

    for name in order {
        let type_def = &types[name];
        if type_def.is_embedded || type_def.is_abstract {
            continue;
        }
        let Some(collection) = collections[name].clone() else {
            continue;
        };

        let mut embedded_on_path = HashSet::new();
        collect_sites(
            name,
            &collection,
            "",
            &type_def.fields,
            types,
            &mut embedded_on_path,
            &mut seen,
            &mut sites,
        );
    }

    sites
}

#[allow(clippy::too_many_arguments)]
fn collect_sites(
    source_type: &str,
    collection: &str,
    prefix: &str,
    fields: &[FieldDef],
    types: &HashMap<String, TypeDef>,
    embedded_on_path: &mut HashSet<String>,
    seen: &mut HashSet<(String, String)>,
    sites: &mut Vec<RefSite>,
) {
    for field in fields {
        let path = join_path(prefix, &field.storage_name);
        match &field.kind {
            FieldKind::Reference { target, delete_rule } => {
                push_site(
                    source_type,
                    collection,
                    &path,
                    *delete_rule,
                    RefTarget::Typed(target.clone()),
                    false,
                    seen,
                    sites,
                );
            }
            FieldKind::GenericReference { delete_rule } => {
                push_site(
                    source_type,
                    collection,
                    &path,
                    *delete_rule,
                    RefTarget::Generic,
                    false,
                    seen,
                    sites,
                );
            }
            FieldKind::Embedded(target) => {
                recurse_embedded(
                    source_type,
                    collection,
                    &path,
                    target,
                    types,
                    embedded_on_path,
                    seen,
                    sites,
                );
            }
            FieldKind::List(element) => match element.as_ref() {
                FieldKind::Reference { target, delete_rule } => {
                    push_site(
                        source_type,
                        collection,
                        &path,
                        *delete_rule,
                        RefTarget::Typed(target.clone()),
                        true,
                        seen,
                        sites,
                    );
                }
                FieldKind::GenericReference { delete_rule } => {
                    push_site(
                        source_type,
                        collection,
                        &path,
                        *delete_rule,
                        RefTarget::Generic,
                        true,
                        seen,
                        sites,
                    );
                }
                FieldKind::Embedded(target) => {
                    recurse_embedded(
                        source_type,
                        collection,
                        &path,
                        target,
                        types,
                        embedded_on_path,
                        seen,
                        sites,
                    );
                }
                _ => {}
            },
            // Key-addressed paths through mappings are not scannable.
            FieldKind::Map(_) => {}
            _ => {}
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn recurse_embedded(
    source_type: &str,
    collection: &str,
    path: &str,
    target: &str,
    types: &HashMap<String, TypeDef>,
    embedded_on_path: &mut HashSet<String>,
    seen: &mut HashSet<(String, String)>,
    sites: &mut Vec<RefSite>,
) {
    // Recursive embedding would produce unbounded paths.
    if !embedded_on_path.insert(target.to_string()) {
        return;
    }
    if let Some(target_def) = types.get(target) {
        collect_sites(
            source_type,
            collection,
            path,
            &target_def.fields,
            types,
            embedded_on_path,
            seen,
            sites,
        );
    }
    embedded_on_path.remove(target);
}

#[allow(clippy::too_many_arguments)]
fn push_site(
    source_type: &str,
    collection: &str,
    path: &str,
    rule: DeleteRule,
    target: RefTarget,
    in_list: bool,
    seen: &mut HashSet<(String, String)>,
    sites: &mut Vec<RefSite>,
) {
    if rule == DeleteRule::None {
        return;
    }
    if !seen.insert((collection.to_string(), path.to_string())) {
        return;
    }
    sites.push(RefSite {
        source_type: source_type.to_string(),
        collection: collection.to_string(),
        path: path.to_string(),
        rule,
        target,
        in_list,
    });
}
