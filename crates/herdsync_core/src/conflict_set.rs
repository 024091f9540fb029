//! Persisted set of unresolved conflicts, one per entity id.

use crate::events::{EventFeed, SyncEvent};
use herdsync_protocol::ConflictRecord;
use herdsync_storage::EncryptedStore;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

/// Local store key holding the conflict set.
pub const CONFLICTS_KEY: &str = "conflicts";

/// Conflicts awaiting a user decision.
pub struct ConflictSet {
    store: Arc<EncryptedStore>,
    events: Arc<EventFeed>,
    records: Mutex<Vec<ConflictRecord>>,
}

impl ConflictSet {
    /// Loads the conflict set persisted in `store`.
    pub fn load(store: Arc<EncryptedStore>, events: Arc<EventFeed>) -> Self {
        let mut records: Vec<ConflictRecord> = store.get_item(CONFLICTS_KEY, Vec::new());

        // Keep the last record per id if an older build stored duplicates.
        let mut seen = std::collections::HashSet::new();
        records.reverse();
        records.retain(|r| seen.insert(r.id.clone()));
        records.reverse();

        debug!(count = records.len(), "conflict set loaded");
        Self {
            store,
            events,
            records: Mutex::new(records),
        }
    }

    /// Inserts `conflict`, replacing any record for the same id.
    ///
    /// Returns the replaced record.
    pub fn record(&self, conflict: ConflictRecord) -> Option<ConflictRecord> {
        let (previous, count) = {
            let mut records = self.records.lock();
            info!(id = %conflict.id, entity_type = %conflict.entity_type, "conflict recorded");
            let previous = match records.iter_mut().find(|r| r.id == conflict.id) {
                Some(existing) => Some(std::mem::replace(existing, conflict)),
                None => {
                    records.push(conflict);
                    None
                }
            };
            self.persist(&records);
            (previous, records.len())
        };
        self.events.emit(SyncEvent::ConflictsChanged { count });
        previous
    }

    /// Current records.
    pub fn conflicts(&self) -> Vec<ConflictRecord> {
        self.records.lock().clone()
    }

    /// Returns the record for `id`.
    pub fn get(&self, id: &str) -> Option<ConflictRecord> {
        self.records.lock().iter().find(|r| r.id == id).cloned()
    }

    /// Removes and returns the record for `id`; absent ids are a no-op.
    pub fn remove(&self, id: &str) -> Option<ConflictRecord> {
        let (removed, count) = {
            let mut records = self.records.lock();
            let pos = records.iter().position(|r| r.id == id)?;
            let removed = records.remove(pos);
            self.persist(&records);
            (removed, records.len())
        };
        self.events.emit(SyncEvent::ConflictsChanged { count });
        Some(removed)
    }

    /// Returns true if a record exists for `id`.
    pub fn contains(&self, id: &str) -> bool {
        self.records.lock().iter().any(|r| r.id == id)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Returns true if there are no records.
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    fn persist(&self, records: &[ConflictRecord]) {
        self.store.set_item(CONFLICTS_KEY, records);
    }
}

impl std::fmt::Debug for ConflictSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConflictSet")
            .field("count", &self.len())
            .finish()
    }
}
