//! Lazy reference resolution.
//!
//! References hydrate as bare identifiers and stay that way until asked
//! for. Resolution fetches the referenced document, hydrates it as its
//! exact stored type, and caches the instance on the field; the second
//! ask is free.

use crate::error::PersistError;
use crate::session::Session;
use dorm_record::{RecordInstance, Reference};
use dorm_registry::FieldKind;
use dorm_store::Store;

impl<'r, S: Store> Session<'r, S> {
    /// Resolve a reference field on a record, fetching and caching the
    /// referenced instance.
    ///
    /// A generic reference follows its stored type tag; an unregistered
    /// tag is a schema error, while a registered target whose document is
    /// gone is [`PersistError::NotFound`]. The two are deliberately
    /// distinct: one is a modelling bug, the other dangling data.
    pub fn resolve<'a>(
        &self,
        record: &'a mut RecordInstance,
        field: &str,
    ) -> Result<&'a RecordInstance, PersistError> {
        let type_def = self.type_def(record.type_name())?;
        let field_def = type_def.field(field).ok_or_else(|| {
            PersistError::schema(format!(
                "type {} has no field {field}",
                record.type_name()
            ))
        })?;

        let declared_target = match &field_def.kind {
            FieldKind::Reference { target, .. } => Some(target.clone()),
            FieldKind::GenericReference { .. } => None,
            _ => {
                return Err(PersistError::schema(format!(
                    "field {field} of type {} is not a reference",
                    record.type_name()
                )))
            }
        };

        let (id, tag) = match record.reference(field) {
            Some(Reference::Resolved(_)) => {
                return record.resolved_ref(field).ok_or_else(|| {
                    PersistError::operation_failed("resolved reference went missing")
                });
            }
            Some(Reference::Unresolved { id, target }) => (*id, target.clone()),
            None => {
                return Err(PersistError::operation_failed(format!(
                    "reference field {field} holds no value"
                )))
            }
        };

        let target_type = match declared_target {
            Some(target) => target,
            None => {
                let tag = tag.ok_or_else(|| {
                    PersistError::schema(format!(
                        "generic reference {field} carries no type tag"
                    ))
                })?;
                if !self.registry.contains(&tag) {
                    return Err(PersistError::schema(format!(
                        "generic reference {field} names unknown type {tag}"
                    )));
                }
                tag
            }
        };

        let instance = self.get(&target_type, id)?;
        record
            .cache_resolved(field, instance)
            .ok_or_else(|| PersistError::operation_failed("reference field went missing"))
    }
}
