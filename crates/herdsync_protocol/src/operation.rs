//! Queued local mutations.

use crate::entity::EntityType;
use crate::payload::EntityPayload;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of local mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Entity was created.
    Create,
    /// Entity was updated.
    Update,
    /// Entity was deleted.
    Delete,
}

impl OperationKind {
    /// Lowercase name as stored.
    pub const fn as_str(self) -> &'static str {
        match self {
            OperationKind::Create => "create",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of a pending change.
///
/// Creates and updates carry the full entity; deletes carry only the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChangePayload {
    /// Full entity snapshot.
    Snapshot(EntityPayload),
    /// Id of a deleted entity.
    Tombstone {
        /// Entity id.
        id: String,
    },
}

/// A local mutation awaiting acknowledgement by the backend.
///
/// Changes are retired one at a time by `seq` once the backend acknowledges
/// them; anything unacknowledged is retransmitted on the next drain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingChange {
    /// Queue position, assigned when queued. Strictly increasing.
    #[serde(default)]
    pub seq: u64,
    /// Entity id.
    pub id: String,
    /// Collection of the entity.
    pub entity_type: EntityType,
    /// Mutation kind.
    pub kind: OperationKind,
    /// Snapshot or tombstone.
    pub payload: ChangePayload,
    /// Capture time, epoch milliseconds.
    pub timestamp: u64,
    /// Backend version this change was made against.
    ///
    /// `None` for creates. For updates, the version before the update. For
    /// deletes, the version that was deleted.
    #[serde(default)]
    pub base_version: Option<u64>,
    /// Apply unconditionally, overwriting the backend.
    #[serde(default, skip_serializing_if = "is_false")]
    pub force: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl PendingChange {
    /// A create carrying the new entity.
    pub fn create(payload: EntityPayload, timestamp: u64) -> Self {
        Self {
            seq: 0,
            id: payload.id().to_string(),
            entity_type: payload.entity_type(),
            kind: OperationKind::Create,
            payload: ChangePayload::Snapshot(payload),
            timestamp,
            base_version: None,
            force: false,
        }
    }

    /// An update carrying the entity after the update.
    pub fn update(payload: EntityPayload, timestamp: u64) -> Self {
        let base = payload.version().saturating_sub(1);
        Self {
            seq: 0,
            id: payload.id().to_string(),
            entity_type: payload.entity_type(),
            kind: OperationKind::Update,
            payload: ChangePayload::Snapshot(payload),
            timestamp,
            base_version: Some(base),
            force: false,
        }
    }

    /// A delete of the entity `id` last seen at `version`.
    pub fn delete(
        entity_type: EntityType,
        id: impl Into<String>,
        version: Option<u64>,
        timestamp: u64,
    ) -> Self {
        let id = id.into();
        Self {
            seq: 0,
            id: id.clone(),
            entity_type,
            kind: OperationKind::Delete,
            payload: ChangePayload::Tombstone { id },
            timestamp,
            base_version: version,
            force: false,
        }
    }

    /// Returns the entity snapshot, `None` for deletes.
    pub fn snapshot(&self) -> Option<&EntityPayload> {
        match &self.payload {
            ChangePayload::Snapshot(p) => Some(p),
            ChangePayload::Tombstone { .. } => None,
        }
    }

    /// Returns true if the backend state `remote` already reflects this
    /// change.
    ///
    /// A snapshot change is reflected when the remote entity is equal to the
    /// snapshot; a delete is reflected when the remote entity is absent.
    pub fn is_reflected_by(&self, remote: Option<&EntityPayload>) -> bool {
        match (self.snapshot(), remote) {
            (Some(local), Some(remote)) => local == remote,
            (None, None) => true,
            _ => false,
        }
    }
}
