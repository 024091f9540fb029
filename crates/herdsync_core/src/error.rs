//! Error types for HerdSync core.

use herdsync_protocol::EntityType;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in repository, queue and context operations.
///
/// Not-found is never an error here; lookups return `Option` or `bool`.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] herdsync_storage::StorageError),

    /// JSON conversion error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An update patch would leave the entity's fields invalid.
    #[error("invalid patch for {entity_type}: {message}")]
    InvalidPatch {
        /// Collection of the entity.
        entity_type: EntityType,
        /// Why the patched fields did not deserialize.
        message: String,
    },

    /// Entity fields that cannot be stored without loss.
    #[error("invalid fields for {entity_type}: {message}")]
    InvalidFields {
        /// Collection of the entity.
        entity_type: EntityType,
        /// What is wrong with the fields.
        message: String,
    },

    /// A payload of one entity type was applied to another.
    #[error("entity type mismatch: expected {expected}, got {actual}")]
    EntityTypeMismatch {
        /// Type the caller asked for.
        expected: EntityType,
        /// Type carried by the payload.
        actual: EntityType,
    },

    /// Store directory does not exist and creation was disabled.
    #[error("store not found: {0}")]
    StoreNotFound(PathBuf),
}

impl CoreError {
    /// Creates an invalid patch error.
    pub fn invalid_patch(entity_type: EntityType, message: impl Into<String>) -> Self {
        Self::InvalidPatch {
            entity_type,
            message: message.into(),
        }
    }

    /// Creates an invalid fields error.
    pub fn invalid_fields(entity_type: EntityType, message: impl Into<String>) -> Self {
        Self::InvalidFields {
            entity_type,
            message: message.into(),
        }
    }
}
