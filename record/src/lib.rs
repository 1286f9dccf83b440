//! DORM Record
//!
//! In-memory record instances over registered type definitions.
//!
//! Responsibilities:
//! - Hold field values, including embedded sub-records and references
//! - Track mutations as storage-name paths (the dirty tracker)
//! - Propagate nested changes upward through mutation guards
//! - Serialize to and hydrate from store documents
//! - Validate instances against their schema at save time
//!
//! # Module Structure
//!
//! - `instance` - RecordInstance, FieldValue, Reference
//! - `changes` - ChangeSet, the collapsed set of changed storage paths
//! - `guards` - scoped mutation guards for embedded records and containers
//! - `serialize` - recursive document serialization with discriminators
//! - `hydrate` - discriminator-switched hydration from documents
//! - `validate` - save-time schema validation

mod changes;
mod guards;
mod hydrate;
mod instance;
mod serialize;
mod validate;

pub use changes::ChangeSet;
pub use guards::{EmbeddedMut, ListMut, MapMut};
pub use hydrate::{from_document, HydrateError};
pub use instance::{FieldValue, RecordError, RecordInstance, Reference};
pub use serialize::{serialize_field_value, to_document, SerializeError};
pub use validate::{validate, ValidationError};
