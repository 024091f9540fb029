//! Session context shared by repositories and the sync coordinator.

use crate::config::StoreConfig;
use crate::conflict_set::ConflictSet;
use crate::error::{CoreError, CoreResult};
use crate::events::{EventFeed, SyncEvent};
use crate::id::now_millis;
use crate::queue::ChangeQueue;
use crate::repository::Repository;
use herdsync_protocol::{
    ConflictRecord, ConflictResolution, Cow, EntityFields, EntityPayload, EntityType, FeedRecord,
    MilkProduction, PendingChange, VetVisit,
};
use herdsync_storage::{EncryptedStore, FileBackend};
use parking_lot::Mutex;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use tracing::info;

/// Everything one client session shares: the encrypted store, the change
/// queue, the conflict set and the event feed.
///
/// Cloning is cheap; clones share state.
#[derive(Clone)]
pub struct SyncContext {
    store: Arc<EncryptedStore>,
    queue: Arc<ChangeQueue>,
    conflicts: Arc<ConflictSet>,
    events: Arc<EventFeed>,
    write_lock: Arc<Mutex<()>>,
}

impl SyncContext {
    /// Opens a context over `store`, loading the persisted queue and
    /// conflict set.
    pub fn open(store: Arc<EncryptedStore>) -> Self {
        let events = Arc::new(EventFeed::new());
        let queue = Arc::new(ChangeQueue::load(Arc::clone(&store), Arc::clone(&events)));
        let conflicts = Arc::new(ConflictSet::load(Arc::clone(&store), Arc::clone(&events)));
        Self {
            store,
            queue,
            conflicts,
            events,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Opens a context over a fresh in-memory store.
    pub fn in_memory() -> Self {
        Self::open(Arc::new(EncryptedStore::in_memory()))
    }

    /// Opens a context as described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory is missing and may not be created,
    /// is locked by another process, or the key cannot be derived.
    pub fn open_with(config: &StoreConfig) -> CoreResult<Self> {
        let key = config.key.resolve()?;
        let store = match &config.directory {
            None => EncryptedStore::new(Arc::new(herdsync_storage::InMemoryBackend::new()), &key),
            Some(dir) => {
                if !config.create_if_missing && !dir.exists() {
                    return Err(CoreError::StoreNotFound(dir.clone()));
                }
                let backend = FileBackend::open(dir)?;
                info!(path = %dir.display(), "opened file store");
                EncryptedStore::new(Arc::new(backend), &key)
            }
        };
        Ok(Self::open(Arc::new(store)))
    }

    /// Returns the repository for entity type `F`.
    pub fn repository<F: EntityFields>(&self) -> Repository<F> {
        Repository::new(
            Arc::clone(&self.store),
            Arc::clone(&self.queue),
            Arc::clone(&self.events),
            Arc::clone(&self.write_lock),
        )
    }

    /// Returns the encrypted store.
    pub fn store(&self) -> &Arc<EncryptedStore> {
        &self.store
    }

    /// Returns the change queue.
    pub fn queue(&self) -> &Arc<ChangeQueue> {
        &self.queue
    }

    /// Returns the conflict set.
    pub fn conflicts(&self) -> &Arc<ConflictSet> {
        &self.conflicts
    }

    /// Returns the event feed.
    pub fn events(&self) -> &Arc<EventFeed> {
        &self.events
    }

    /// Subscribes to state change events.
    pub fn subscribe(&self) -> Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Returns the local version of entity `id` of type `entity_type`.
    pub fn local_payload(&self, entity_type: EntityType, id: &str) -> Option<EntityPayload> {
        match entity_type {
            EntityType::Cow => self.local_typed::<Cow>(id),
            EntityType::MilkProduction => self.local_typed::<MilkProduction>(id),
            EntityType::Feed => self.local_typed::<FeedRecord>(id),
            EntityType::VetVisit => self.local_typed::<VetVisit>(id),
        }
    }

    /// Returns every local entity of `entity_type`.
    pub fn list_payloads(&self, entity_type: EntityType) -> Vec<EntityPayload> {
        match entity_type {
            EntityType::Cow => self.list_typed::<Cow>(),
            EntityType::MilkProduction => self.list_typed::<MilkProduction>(),
            EntityType::Feed => self.list_typed::<FeedRecord>(),
            EntityType::VetVisit => self.list_typed::<VetVisit>(),
        }
    }

    /// Replaces or removes entity `id` locally without queuing a change.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EntityTypeMismatch`] if `remote` is of another
    /// entity type.
    pub fn apply_remote(
        &self,
        entity_type: EntityType,
        id: &str,
        remote: Option<EntityPayload>,
    ) -> CoreResult<()> {
        if let Some(payload) = &remote {
            if payload.entity_type() != entity_type {
                return Err(CoreError::EntityTypeMismatch {
                    expected: entity_type,
                    actual: payload.entity_type(),
                });
            }
        }
        match entity_type {
            EntityType::Cow => self.apply_typed::<Cow>(id, remote),
            EntityType::MilkProduction => self.apply_typed::<MilkProduction>(id, remote),
            EntityType::Feed => self.apply_typed::<FeedRecord>(id, remote),
            EntityType::VetVisit => self.apply_typed::<VetVisit>(id, remote),
        }
        Ok(())
    }

    /// Settles the conflict for entity `id`.
    ///
    /// [`ConflictResolution::KeepLocal`] marks the entity's queued changes
    /// as forced, queuing a forced copy of the local state if nothing is
    /// queued. [`ConflictResolution::AcceptRemote`] writes the backend
    /// version locally and drops the entity's queued changes.
    ///
    /// Returns the settled record, or `None` if `id` had no conflict.
    pub fn resolve_conflict(
        &self,
        id: &str,
        resolution: ConflictResolution,
    ) -> CoreResult<Option<ConflictRecord>> {
        let Some(record) = self.conflicts.get(id) else {
            return Ok(None);
        };

        match resolution {
            ConflictResolution::KeepLocal => {
                if self.queue.mark_forced(id) == 0 {
                    let now = now_millis();
                    let mut change = match self.local_payload(record.entity_type, id) {
                        Some(local) => PendingChange::update(local, now),
                        None => PendingChange::delete(record.entity_type, id, None, now),
                    };
                    change.force = true;
                    self.queue.queue_change(change);
                }
            }
            ConflictResolution::AcceptRemote => {
                self.apply_remote(record.entity_type, id, record.remote.clone())?;
                self.queue.discard_for(id);
            }
        }

        info!(id, ?resolution, "conflict resolved");
        Ok(self.conflicts.remove(id))
    }

    fn local_typed<F: EntityFields>(&self, id: &str) -> Option<EntityPayload> {
        self.repository::<F>().get_by_id(id).map(F::into_payload)
    }

    fn list_typed<F: EntityFields>(&self) -> Vec<EntityPayload> {
        self.repository::<F>()
            .get_all()
            .into_iter()
            .map(F::into_payload)
            .collect()
    }

    fn apply_typed<F: EntityFields>(&self, id: &str, remote: Option<EntityPayload>) {
        let record = remote.and_then(F::from_payload);
        self.repository::<F>().apply_remote(id, record);
    }
}

impl std::fmt::Debug for SyncContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncContext")
            .field("queue", &self.queue)
            .field("conflicts", &self.conflicts)
            .finish()
    }
}
