//! Wire messages exchanged with the backend.

use crate::error::ProtocolResult;
use crate::operation::PendingChange;
use crate::payload::EntityPayload;
use serde::{Deserialize, Serialize};

/// Current wire protocol version.
pub const PROTOCOL_VERSION: u16 = 1;

/// Path of the endpoint that accepts [`ApplyRequest`]s.
pub const APPLY_PATH: &str = "/sync/apply";

/// Asks the backend to apply one pending change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyRequest {
    /// Protocol version spoken by the client.
    pub protocol_version: u16,
    /// The change to apply.
    pub change: PendingChange,
}

impl ApplyRequest {
    /// Creates a request for `change`.
    pub fn new(change: PendingChange) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            change,
        }
    }

    /// Encodes to JSON bytes.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes from JSON bytes.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// The backend's answer to an [`ApplyRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ApplyOutcome {
    /// The change was applied.
    Acknowledged,
    /// The change was not applied; this is the backend's current entity.
    Current {
        /// Backend entity, `None` if it does not exist.
        remote: Option<EntityPayload>,
    },
    /// The backend refused the change outright.
    Rejected {
        /// Human-readable reason.
        reason: String,
    },
}

impl ApplyOutcome {
    /// Shorthand for [`ApplyOutcome::Current`].
    pub fn current(remote: Option<EntityPayload>) -> Self {
        ApplyOutcome::Current { remote }
    }

    /// Shorthand for [`ApplyOutcome::Rejected`].
    pub fn rejected(reason: impl Into<String>) -> Self {
        ApplyOutcome::Rejected {
            reason: reason.into(),
        }
    }

    /// Encodes to JSON bytes.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes from JSON bytes.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
