//! Persistence error taxonomy.

use dorm_core::RecordId;
use dorm_delta::DeltaError;
use dorm_record::{HydrateError, SerializeError, ValidationError};
use dorm_store::StoreError;
use thiserror::Error;

/// Errors raised by persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    /// The operation names a type, field, or collection the registry does
    /// not know.
    #[error("Schema error: {message}")]
    Schema { message: String },

    /// No stored document carries the requested identifier.
    #[error("{type_name} {id} not found")]
    NotFound { type_name: String, id: RecordId },

    /// A delete was refused because a referencing document forbids it.
    #[error("Delete denied: {holder_collection}.{path} still references {type_name} {id}")]
    ReferentialIntegrity {
        type_name: String,
        id: RecordId,
        holder_collection: String,
        path: String,
    },

    /// The operation could not proceed in the state it found.
    #[error("Operation failed: {message}")]
    OperationFailed { message: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Hydrate(#[from] HydrateError),

    #[error(transparent)]
    Serialize(#[from] SerializeError),

    #[error(transparent)]
    Delta(#[from] DeltaError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PersistError {
    pub fn schema(message: impl Into<String>) -> Self {
        PersistError::Schema {
            message: message.into(),
        }
    }

    pub fn not_found(type_name: impl Into<String>, id: RecordId) -> Self {
        PersistError::NotFound {
            type_name: type_name.into(),
            id,
        }
    }

    pub fn operation_failed(message: impl Into<String>) -> Self {
        PersistError::OperationFailed {
            message: message.into(),
        }
    }

    /// Translate a store failure on a document the caller just observed:
    /// not-found means it vanished between read and write.
    pub(crate) fn vanished(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => {
                PersistError::operation_failed("document vanished concurrently")
            }
            other => PersistError::Store(other),
        }
    }
}
