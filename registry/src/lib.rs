//! DORM Registry
//!
//! Runtime schema definitions for record types: field descriptors, type
//! descriptors with single inheritance into shared physical collections,
//! and the immutable registry the rest of the system looks schemas up in.
//!
//! # Module Structure
//!
//! - `types` - FieldDef, FieldKind, DeleteRule, TypeDef, reference sites
//! - `builder` - RegistryBuilder with registration-time schema validation
//! - `registry` - Immutable Registry lookup surface

mod builder;
mod registry;
mod types;

pub use builder::{RegistryBuilder, SchemaError, TypeBuilder};
pub use registry::Registry;
pub use types::{
    DeleteRule, FieldDef, FieldDefault, FieldKind, RefSite, RefTarget, SubtypeIndex, TypeDef,
    DISCRIMINATOR_STORAGE_NAME, ID_STORAGE_NAME,
};
