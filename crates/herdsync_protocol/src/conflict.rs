//! Divergences between local and backend state.

use crate::entity::EntityType;
use crate::payload::EntityPayload;
use serde::{Deserialize, Serialize};

/// A local change the backend would not accept because its own version of
/// the entity differs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictRecord {
    /// Entity id.
    pub id: String,
    /// Collection of the entity.
    pub entity_type: EntityType,
    /// Local entity as queued; `None` for a local delete.
    #[serde(default)]
    pub local: Option<EntityPayload>,
    /// Backend entity; `None` when the backend has no such entity.
    #[serde(default)]
    pub remote: Option<EntityPayload>,
    /// Detection time, epoch milliseconds.
    pub detected_at: u64,
}

impl ConflictRecord {
    /// Creates a new conflict record.
    pub fn new(
        id: impl Into<String>,
        entity_type: EntityType,
        local: Option<EntityPayload>,
        remote: Option<EntityPayload>,
        detected_at: u64,
    ) -> Self {
        Self {
            id: id.into(),
            entity_type,
            local,
            remote,
            detected_at,
        }
    }

    /// Returns true if the two sides disagree on whether the entity exists.
    pub fn is_update_delete_conflict(&self) -> bool {
        self.local.is_some() != self.remote.is_some()
    }
}

/// How a conflict is settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    /// Keep the local version and push it to the backend.
    KeepLocal,
    /// Take the backend version and drop local changes.
    AcceptRemote,
}

impl ConflictResolution {
    /// Maps the UI's `accept_local` flag.
    pub fn from_accept_local(accept_local: bool) -> Self {
        if accept_local {
            ConflictResolution::KeepLocal
        } else {
            ConflictResolution::AcceptRemote
        }
    }
}
