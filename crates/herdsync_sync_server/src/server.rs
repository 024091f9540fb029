//! Main sync server.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use herdsync_protocol::{
    ApplyOutcome, ApplyRequest, ChangePayload, EntityPayload, EntityType, OperationKind,
    PendingChange, APPLY_PATH, PROTOCOL_VERSION,
};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use tracing::{debug, info, warn};

type EntityKey = (EntityType, String);

/// Counters kept by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerStats {
    /// Changes applied.
    pub applied: u64,
    /// Changes answered with the server's current version.
    pub stale: u64,
    /// Changes rejected.
    pub rejected: u64,
}

/// The authoritative backend.
///
/// Holds the canonical version of every entity and applies client changes
/// that were made against the version it holds.
///
/// # Example
///
/// ```
/// use herdsync_sync_server::{ServerConfig, SyncServer};
///
/// let server = SyncServer::new(ServerConfig::default());
/// assert_eq!(server.entity_count(), 0);
///
/// // Wire `server.handle_post()` behind an HTTP route, or call
/// // `server.handle_apply()` directly from an in-process transport.
/// ```
pub struct SyncServer {
    config: ServerConfig,
    entities: RwLock<HashMap<EntityKey, EntityPayload>>,
    stats: Mutex<ServerStats>,
}

impl SyncServer {
    /// Creates an empty server.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            entities: RwLock::new(HashMap::new()),
            stats: Mutex::new(ServerStats::default()),
        }
    }

    /// Returns the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Handles one apply request.
    ///
    /// Stale changes are an `Ok` outcome carrying the server's entity;
    /// `Err` is reserved for requests the server cannot interpret.
    pub fn handle_apply(&self, request: &ApplyRequest) -> ServerResult<ApplyOutcome> {
        if request.protocol_version != PROTOCOL_VERSION {
            return Err(ServerError::ProtocolMismatch {
                expected: PROTOCOL_VERSION,
                actual: request.protocol_version,
            });
        }
        let change = &request.change;
        validate(change)?;

        if self.config.read_only {
            self.stats.lock().rejected += 1;
            return Ok(ApplyOutcome::rejected("server is read-only"));
        }

        let key = (change.entity_type, change.id.clone());
        let mut entities = self.entities.write();
        let current = entities.get(&key);

        if !change.force && !accepts(change, current) {
            debug!(
                entity_type = %change.entity_type,
                id = %change.id,
                kind = %change.kind,
                remote_version = current.map(EntityPayload::version),
                "change made against a stale version"
            );
            let outcome = ApplyOutcome::current(current.cloned());
            drop(entities);
            self.stats.lock().stale += 1;
            return Ok(outcome);
        }

        match &change.payload {
            ChangePayload::Snapshot(payload) => {
                entities.insert(key, payload.clone());
            }
            ChangePayload::Tombstone { .. } => {
                entities.remove(&key);
            }
        }
        drop(entities);

        debug!(
            entity_type = %change.entity_type,
            id = %change.id,
            kind = %change.kind,
            force = change.force,
            "change applied"
        );
        self.stats.lock().applied += 1;
        Ok(ApplyOutcome::Acknowledged)
    }

    /// Handles a JSON POST to `path` and returns the JSON response body.
    ///
    /// Requests the server cannot accept are answered with a `Rejected`
    /// outcome so the client does not retry them; an unknown path or an
    /// internal failure is an `Err`.
    pub fn handle_post(&self, path: &str, body: &[u8]) -> Result<Vec<u8>, String> {
        match self.dispatch(path, body) {
            Ok(outcome) => outcome.encode().map_err(|e| e.to_string()),
            Err(ServerError::UnknownPath(path)) => Err(format!("unknown path: {path}")),
            Err(e) if e.is_client_error() => {
                warn!(error = %e, "rejecting request");
                self.stats.lock().rejected += 1;
                ApplyOutcome::rejected(e.to_string())
                    .encode()
                    .map_err(|e| e.to_string())
            }
            Err(e) => Err(e.to_string()),
        }
    }

    fn dispatch(&self, path: &str, body: &[u8]) -> ServerResult<ApplyOutcome> {
        if path != APPLY_PATH {
            return Err(ServerError::UnknownPath(path.to_string()));
        }
        if body.len() > self.config.max_body_bytes {
            return Err(ServerError::InvalidRequest(format!(
                "body of {} bytes exceeds limit of {}",
                body.len(),
                self.config.max_body_bytes
            )));
        }
        let request = ApplyRequest::decode(body)?;
        self.handle_apply(&request)
    }

    /// Returns the server's version of an entity.
    pub fn entity(&self, entity_type: EntityType, id: &str) -> Option<EntityPayload> {
        self.entities
            .read()
            .get(&(entity_type, id.to_string()))
            .cloned()
    }

    /// Returns every entity of one type, ordered by id.
    pub fn entities(&self, entity_type: EntityType) -> Vec<EntityPayload> {
        let mut list: Vec<EntityPayload> = self
            .entities
            .read()
            .iter()
            .filter(|((t, _), _)| *t == entity_type)
            .map(|(_, p)| p.clone())
            .collect();
        list.sort_by(|a, b| a.id().cmp(b.id()));
        list
    }

    /// Writes an entity directly, as another client's accepted change would.
    ///
    /// Returns the previous version.
    pub fn put(&self, payload: EntityPayload) -> Option<EntityPayload> {
        let key = (payload.entity_type(), payload.id().to_string());
        info!(entity_type = %key.0, id = %key.1, version = payload.version(), "entity written directly");
        self.entities.write().insert(key, payload)
    }

    /// Removes an entity directly. Returns the removed version.
    pub fn remove(&self, entity_type: EntityType, id: &str) -> Option<EntityPayload> {
        self.entities.write().remove(&(entity_type, id.to_string()))
    }

    /// Returns the number of entities held across all types.
    pub fn entity_count(&self) -> usize {
        self.entities.read().len()
    }

    /// Returns a snapshot of the counters.
    pub fn stats(&self) -> ServerStats {
        self.stats.lock().clone()
    }
}

impl std::fmt::Debug for SyncServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncServer")
            .field("config", &self.config)
            .field("entities", &self.entity_count())
            .finish()
    }
}

fn validate(change: &PendingChange) -> ServerResult<()> {
    match &change.payload {
        ChangePayload::Snapshot(payload) => {
            if payload.entity_type() != change.entity_type || payload.id() != change.id {
                return Err(ServerError::InvalidRequest(format!(
                    "snapshot {} {} does not match change for {} {}",
                    payload.entity_type(),
                    payload.id(),
                    change.entity_type,
                    change.id
                )));
            }
            if change.kind == OperationKind::Delete {
                return Err(ServerError::InvalidRequest("delete carries a snapshot".into()));
            }
        }
        ChangePayload::Tombstone { id } => {
            if *id != change.id {
                return Err(ServerError::InvalidRequest(format!(
                    "tombstone for {id} does not match change for {}",
                    change.id
                )));
            }
            if change.kind != OperationKind::Delete {
                return Err(ServerError::InvalidRequest(format!(
                    "{} carries a tombstone",
                    change.kind
                )));
            }
        }
    }
    Ok(())
}

/// Whether an unforced change was made against `current`.
fn accepts(change: &PendingChange, current: Option<&EntityPayload>) -> bool {
    let remote_version = current.map(EntityPayload::version);
    match change.kind {
        OperationKind::Create => current.is_none(),
        OperationKind::Update => remote_version.is_some() && remote_version == change.base_version,
        OperationKind::Delete => match (remote_version, change.base_version) {
            (None, _) => true,
            (Some(remote), Some(seen)) => remote <= seen,
            (Some(_), None) => false,
        },
    }
}
