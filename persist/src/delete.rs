//! The cascading delete engine.
//!
//! A delete runs in three phases: scan every reference site for documents
//! pointing at the doomed records, apply the Nullify and Pull rewrites,
//! then commit the deletions. All scanning finishes before the first
//! write, so a Deny found anywhere aborts with nothing touched. A crash
//! between apply and commit can leave rewrites without the delete; the
//! engine promises at-most-once intent, not atomicity across documents.

use crate::error::PersistError;
use crate::session::Session;
use dorm_core::{get_path, Document, RecordId, Value};
use dorm_record::RecordInstance;
use dorm_registry::{
    DeleteRule, RefTarget, Registry, DISCRIMINATOR_STORAGE_NAME, ID_STORAGE_NAME,
};
use dorm_store::{Filter, Store};
use std::collections::{BTreeMap, BTreeSet};

/// What a delete did, by count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteOutcome {
    /// Documents removed, the target included.
    pub deleted: usize,
    /// Reference paths cleared on surviving documents.
    pub nullified: usize,
    /// List rewrites applied on surviving documents.
    pub pulled: usize,
}

/// One document slated for deletion.
#[derive(Debug, Clone)]
struct Doomed {
    collection: String,
    id: RecordId,
    type_name: String,
}

impl<'r, S: Store> Session<'r, S> {
    /// Delete a persisted record, honoring every declared delete rule.
    pub fn delete(&mut self, record: &RecordInstance) -> Result<DeleteOutcome, PersistError> {
        let id = record
            .id()
            .ok_or_else(|| PersistError::operation_failed("record has no identifier"))?;
        self.delete_by_id(record.type_name(), id)
    }

    /// Delete by type and identifier, honoring every declared delete rule.
    pub fn delete_by_id(
        &mut self,
        type_name: &str,
        id: RecordId,
    ) -> Result<DeleteOutcome, PersistError> {
        let collection = self.collection_of(type_name)?;
        let doc = self
            .store
            .find_one(&collection, &Filter::eq(ID_STORAGE_NAME, id))?
            .ok_or_else(|| PersistError::not_found(type_name, id))?;
        let exact = self.exact_type_of(&doc, type_name).to_string();

        let mut doomed = vec![Doomed {
            collection: collection.clone(),
            id,
            type_name: exact,
        }];
        let mut visited: BTreeSet<(String, RecordId)> = BTreeSet::new();
        visited.insert((collection, id));

        let mut nullifies: BTreeSet<(String, RecordId, String)> = BTreeSet::new();
        let mut pulls: BTreeMap<(String, RecordId, String), BTreeSet<(RecordId, Option<String>)>> =
            BTreeMap::new();

        // Phase 1: scan. Breadth-first over the doomed set; no writes yet.
        let mut cursor = 0;
        while cursor < doomed.len() {
            let current = doomed[cursor].clone();
            cursor += 1;

            for site in self.registry.reference_sites() {
                let compatible = match &site.target {
                    RefTarget::Typed(target) => {
                        self.registry.is_related(target, &current.type_name)
                    }
                    RefTarget::Generic => true,
                };
                if !compatible {
                    continue;
                }

                let filter = match &site.target {
                    RefTarget::Typed(_) => {
                        Filter::eq(site.path.clone(), current.id)
                    }
                    RefTarget::Generic => Filter::eq(
                        format!("{}.{}", site.path, ID_STORAGE_NAME),
                        current.id,
                    ),
                };

                for holder in self.store.find(&site.collection, &filter)? {
                    // Identifiers are unique per collection only; a generic
                    // match must also carry a tag on the doomed type's line.
                    if matches!(site.target, RefTarget::Generic)
                        && !holds_related_generic(
                            self.registry,
                            &holder,
                            &site.path,
                            current.id,
                            &current.type_name,
                        )
                    {
                        continue;
                    }

                    let holder_id = Self::document_id(&holder).ok_or_else(|| {
                        PersistError::operation_failed("stored document lacks an identifier")
                    })?;

                    match site.rule {
                        DeleteRule::Deny => {
                            return Err(PersistError::ReferentialIntegrity {
                                type_name: current.type_name.clone(),
                                id: current.id,
                                holder_collection: site.collection.clone(),
                                path: site.path.clone(),
                            });
                        }
                        DeleteRule::Cascade => {
                            let key = (site.collection.clone(), holder_id);
                            if visited.insert(key) {
                                doomed.push(Doomed {
                                    collection: site.collection.clone(),
                                    id: holder_id,
                                    type_name: self
                                        .exact_type_of(&holder, &site.source_type)
                                        .to_string(),
                                });
                            }
                        }
                        DeleteRule::Nullify => {
                            nullifies.insert((
                                site.collection.clone(),
                                holder_id,
                                site.path.clone(),
                            ));
                        }
                        DeleteRule::Pull => {
                            let doomed_type = match &site.target {
                                RefTarget::Generic => Some(current.type_name.clone()),
                                RefTarget::Typed(_) => None,
                            };
                            pulls
                                .entry((site.collection.clone(), holder_id, site.path.clone()))
                                .or_default()
                                .insert((current.id, doomed_type));
                        }
                        DeleteRule::None => {}
                    }
                }
            }
        }

        let doomed_keys: BTreeSet<(String, RecordId)> = doomed
            .iter()
            .map(|d| (d.collection.clone(), d.id))
            .collect();

        // Phase 2: apply rewrites to surviving documents.
        let mut outcome = DeleteOutcome {
            deleted: doomed.len(),
            ..DeleteOutcome::default()
        };

        for (collection, holder_id, path) in nullifies {
            if doomed_keys.contains(&(collection.clone(), holder_id)) {
                continue;
            }
            let mut unset = BTreeSet::new();
            unset.insert(path);
            self.store
                .update(&collection, holder_id, &BTreeMap::new(), &unset)
                .map_err(PersistError::vanished)?;
            outcome.nullified += 1;
        }

        for ((collection, holder_id, path), removed) in pulls {
            if doomed_keys.contains(&(collection.clone(), holder_id)) {
                continue;
            }
            let Some(holder) = self
                .store
                .find_one(&collection, &Filter::eq(ID_STORAGE_NAME, holder_id))?
            else {
                return Err(PersistError::operation_failed(
                    "document vanished concurrently",
                ));
            };
            let Some(Value::List(items)) = get_path(&holder, &path) else {
                continue;
            };
            let registry = self.registry;
            let kept: Vec<Value> = items
                .iter()
                .filter(|item| !refers_to_any(registry, item, &removed))
                .cloned()
                .collect();

            let mut set = BTreeMap::new();
            let mut unset = BTreeSet::new();
            if kept.is_empty() {
                // Empty collections are stored as absence.
                unset.insert(path);
            } else {
                set.insert(path, Value::List(kept));
            }
            self.store
                .update(&collection, holder_id, &set, &unset)
                .map_err(PersistError::vanished)?;
            outcome.pulled += 1;
        }

        // Phase 3: commit the deletions.
        for item in &doomed {
            self.store
                .delete(&item.collection, item.id)
                .map_err(PersistError::vanished)?;
        }

        Ok(outcome)
    }
}

/// Whether a stored list element references one of the removed entries, in
/// either wire form. Entries recorded at generic sites carry the doomed
/// type and match only elements tagged on its inheritance line.
fn refers_to_any(
    registry: &Registry,
    item: &Value,
    removed: &BTreeSet<(RecordId, Option<String>)>,
) -> bool {
    removed.iter().any(|(id, doomed_type)| match item {
        Value::Id(held) => doomed_type.is_none() && held == id,
        Value::Map(entries) => {
            entries.get(ID_STORAGE_NAME) == Some(&Value::Id(*id))
                && match doomed_type {
                    None => true,
                    Some(doomed) => matches!(
                        entries.get(DISCRIMINATOR_STORAGE_NAME),
                        Some(Value::String(tag)) if registry.is_related(tag, doomed)
                    ),
                }
        }
        _ => false,
    })
}

/// Whether some generic reference stored at `path` carries the doomed
/// identifier together with a type tag on the doomed type's line. The walk
/// fans out across list elements the way the store's filter resolution
/// does; the identifier filter alone cannot tell two same-numbered records
/// in different collections apart.
fn holds_related_generic(
    registry: &Registry,
    doc: &Document,
    path: &str,
    id: RecordId,
    doomed_type: &str,
) -> bool {
    match path.split_once('.') {
        Some((head, rest)) => doc
            .get(head)
            .is_some_and(|value| descend_generic(registry, value, rest, id, doomed_type)),
        None => doc
            .get(path)
            .is_some_and(|value| generic_ref_matches(registry, value, id, doomed_type)),
    }
}

fn descend_generic(
    registry: &Registry,
    value: &Value,
    path: &str,
    id: RecordId,
    doomed_type: &str,
) -> bool {
    match value {
        Value::List(items) => items
            .iter()
            .any(|item| descend_generic(registry, item, path, id, doomed_type)),
        Value::Map(entries) => match path.split_once('.') {
            Some((head, rest)) => entries
                .get(head)
                .is_some_and(|inner| descend_generic(registry, inner, rest, id, doomed_type)),
            None => entries
                .get(path)
                .is_some_and(|inner| generic_ref_matches(registry, inner, id, doomed_type)),
        },
        _ => false,
    }
}

fn generic_ref_matches(
    registry: &Registry,
    value: &Value,
    id: RecordId,
    doomed_type: &str,
) -> bool {
    match value {
        Value::List(items) => items
            .iter()
            .any(|item| generic_ref_matches(registry, item, id, doomed_type)),
        Value::Map(entries) => {
            entries.get(ID_STORAGE_NAME) == Some(&Value::Id(id))
                && matches!(
                    entries.get(DISCRIMINATOR_STORAGE_NAME),
                    Some(Value::String(tag)) if registry.is_related(tag, doomed_type)
                )
        }
        _ => false,
    }
}
