//! Typed CRUD over one entity collection.

use crate::error::{CoreError, CoreResult};
use crate::events::{EventFeed, SyncEvent};
use crate::id::{generate_id, now_millis};
use crate::queue::ChangeQueue;
use herdsync_protocol::{EntityFields, EntityMeta, EntityType, PendingChange, Record};
use herdsync_storage::EncryptedStore;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// CRUD access to the collection of entity type `F::ENTITY_TYPE`.
///
/// Every mutation writes the full collection to the local store and queues
/// a [`PendingChange`]. Lookups that miss return `None` or `false`.
///
/// # Querying
///
/// Filtering uses either a JSON object of exact field matches or a Rust
/// predicate:
///
/// ```rust
/// use herdsync_core::SyncContext;
/// use herdsync_protocol::Cow;
/// use serde_json::json;
///
/// let ctx = SyncContext::in_memory();
/// let cows = ctx.repository::<Cow>();
/// cows.create(Cow::new("Bessie", "C001")).unwrap();
/// cows.create(Cow::new("Daisy", "C002")).unwrap();
///
/// let filters = json!({ "tagNumber": "C002" });
/// let found = cows.query(filters.as_object().unwrap());
/// assert_eq!(found[0].fields.name, "Daisy");
///
/// let b_names = cows.filter(|c| c.fields.name.starts_with('B'));
/// assert_eq!(b_names.len(), 1);
/// ```
pub struct Repository<F: EntityFields> {
    store: Arc<EncryptedStore>,
    queue: Arc<ChangeQueue>,
    events: Arc<EventFeed>,
    write_lock: Arc<Mutex<()>>,
    _marker: PhantomData<F>,
}

impl<F: EntityFields> Clone for Repository<F> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            queue: Arc::clone(&self.queue),
            events: Arc::clone(&self.events),
            write_lock: Arc::clone(&self.write_lock),
            _marker: PhantomData,
        }
    }
}

impl<F: EntityFields> Repository<F> {
    pub(crate) fn new(
        store: Arc<EncryptedStore>,
        queue: Arc<ChangeQueue>,
        events: Arc<EventFeed>,
        write_lock: Arc<Mutex<()>>,
    ) -> Self {
        Self {
            store,
            queue,
            events,
            write_lock,
            _marker: PhantomData,
        }
    }

    /// Returns the entity type of this collection.
    pub fn entity_type(&self) -> EntityType {
        F::ENTITY_TYPE
    }

    /// Returns the full collection; empty if never written or unreadable.
    pub fn get_all(&self) -> Vec<Record<F>> {
        self.store.get_item(F::ENTITY_TYPE.storage_key(), Vec::new())
    }

    /// Returns the entity with `id`.
    pub fn get_by_id(&self, id: &str) -> Option<Record<F>> {
        self.get_all().into_iter().find(|r| r.meta.id == id)
    }

    /// Number of entities in the collection.
    pub fn count(&self) -> usize {
        self.get_all().len()
    }

    /// Creates an entity from `fields` and queues a create.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidFields`] if `fields` cannot be stored
    /// faithfully. Nothing is written in that case.
    pub fn create(&self, fields: F) -> CoreResult<Record<F>> {
        check_storable(&fields)?;
        let _guard = self.write_lock.lock();
        let now = now_millis();
        let record = Record {
            meta: EntityMeta::new(generate_id(F::ENTITY_TYPE, now), now),
            fields,
        };

        let mut all = self.get_all();
        all.push(record.clone());
        self.persist(&all);

        debug!(entity_type = %F::ENTITY_TYPE, id = %record.meta.id, "entity created");
        self.queue
            .queue_change(PendingChange::create(F::into_payload(record.clone()), now));
        self.entity_changed(&record.meta.id, false);
        Ok(record)
    }

    /// Merges the JSON object `patch` over the fields of entity `id`.
    ///
    /// Keys owned by [`EntityMeta`] are ignored. Returns `Ok(None)` if there
    /// is no such entity.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidPatch`] if the merged fields do not form a
    /// valid `F`, or [`CoreError::InvalidFields`] if they cannot be stored.
    /// Nothing is written in either case.
    pub fn update(&self, id: &str, patch: &Map<String, Value>) -> CoreResult<Option<Record<F>>> {
        let _guard = self.write_lock.lock();
        let mut all = self.get_all();
        let Some(pos) = all.iter().position(|r| r.meta.id == id) else {
            return Ok(None);
        };

        let mut merged = match serde_json::to_value(&all[pos].fields)? {
            Value::Object(map) => map,
            _ => return Err(CoreError::invalid_patch(F::ENTITY_TYPE, "fields are not an object")),
        };
        for (key, value) in patch {
            if EntityMeta::KEYS.contains(&key.as_str()) {
                continue;
            }
            merged.insert(key.clone(), value.clone());
        }
        let fields: F = serde_json::from_value(Value::Object(merged))
            .map_err(|e| CoreError::invalid_patch(F::ENTITY_TYPE, e.to_string()))?;

        self.commit_update(&mut all, pos, fields).map(Some)
    }

    /// Applies `edit` to the fields of entity `id`.
    ///
    /// Returns `Ok(None)` if there is no such entity.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidFields`] if the edited fields cannot be
    /// stored. Nothing is written in that case.
    pub fn update_with(
        &self,
        id: &str,
        edit: impl FnOnce(&mut F),
    ) -> CoreResult<Option<Record<F>>> {
        let _guard = self.write_lock.lock();
        let mut all = self.get_all();
        let Some(pos) = all.iter().position(|r| r.meta.id == id) else {
            return Ok(None);
        };

        let mut fields = all[pos].fields.clone();
        edit(&mut fields);
        self.commit_update(&mut all, pos, fields).map(Some)
    }

    /// Removes entity `id` and queues a delete.
    ///
    /// Returns false, writing nothing, if there is no such entity.
    pub fn delete(&self, id: &str) -> bool {
        let _guard = self.write_lock.lock();
        let mut all = self.get_all();
        let Some(pos) = all.iter().position(|r| r.meta.id == id) else {
            return false;
        };
        let removed = all.remove(pos);
        self.persist(&all);

        debug!(entity_type = %F::ENTITY_TYPE, id, "entity deleted");
        self.queue.queue_change(PendingChange::delete(
            F::ENTITY_TYPE,
            id,
            Some(removed.meta.version),
            now_millis(),
        ));
        self.entity_changed(id, true);
        true
    }

    /// Entities whose serialized form matches every key/value in `filters`.
    ///
    /// Matching is exact JSON equality; absent optional fields compare equal
    /// to `null`.
    pub fn query(&self, filters: &Map<String, Value>) -> Vec<Record<F>> {
        self.filter(|record| {
            let Ok(Value::Object(map)) = serde_json::to_value(record) else {
                return false;
            };
            filters
                .iter()
                .all(|(key, expected)| map.get(key).unwrap_or(&Value::Null) == expected)
        })
    }

    /// Entities for which `predicate` returns true.
    pub fn filter(&self, predicate: impl Fn(&Record<F>) -> bool) -> Vec<Record<F>> {
        self.get_all().into_iter().filter(|r| predicate(r)).collect()
    }

    /// Replaces or removes entity `id` locally without queuing a change.
    ///
    /// Used to adopt the backend's version of an entity.
    pub fn apply_remote(&self, id: &str, remote: Option<Record<F>>) {
        let _guard = self.write_lock.lock();
        let mut all = self.get_all();
        let pos = all.iter().position(|r| r.meta.id == id);

        let deleted = remote.is_none();
        match (pos, remote) {
            (Some(pos), Some(record)) => all[pos] = record,
            (None, Some(record)) => all.push(record),
            (Some(pos), None) => {
                all.remove(pos);
            }
            (None, None) => return,
        }
        self.persist(&all);

        debug!(entity_type = %F::ENTITY_TYPE, id, deleted, "remote version applied");
        self.entity_changed(id, deleted);
    }

    fn commit_update(
        &self,
        all: &mut [Record<F>],
        pos: usize,
        fields: F,
    ) -> CoreResult<Record<F>> {
        check_storable(&fields)?;
        let now = now_millis();
        let record = &mut all[pos];
        record.fields = fields;
        record.meta.touch(now);
        let record = record.clone();
        self.persist(all);

        debug!(
            entity_type = %F::ENTITY_TYPE,
            id = %record.meta.id,
            version = record.meta.version,
            "entity updated"
        );
        self.queue
            .queue_change(PendingChange::update(F::into_payload(record.clone()), now));
        self.entity_changed(&record.meta.id, false);
        Ok(record)
    }

    fn persist(&self, all: &[Record<F>]) {
        self.store.set_item(F::ENTITY_TYPE.storage_key(), all);
    }

    fn entity_changed(&self, id: &str, deleted: bool) {
        self.events.emit(SyncEvent::EntityChanged {
            entity_type: F::ENTITY_TYPE,
            id: id.to_string(),
            deleted,
        });
    }
}

/// Fails unless `fields` read back unchanged from the store's JSON encoding.
/// Non-finite floats do not: they encode as `null`.
fn check_storable<F: EntityFields>(fields: &F) -> CoreResult<()> {
    let value = serde_json::to_value(fields)
        .map_err(|e| CoreError::invalid_fields(F::ENTITY_TYPE, e.to_string()))?;
    match serde_json::from_value::<F>(value) {
        Ok(decoded) if decoded == *fields => Ok(()),
        Ok(_) => Err(CoreError::invalid_fields(
            F::ENTITY_TYPE,
            "fields change when stored (non-finite number?)",
        )),
        Err(e) => Err(CoreError::invalid_fields(F::ENTITY_TYPE, e.to_string())),
    }
}

impl<F: EntityFields> std::fmt::Debug for Repository<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("entity_type", &F::ENTITY_TYPE)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::SyncContext;
    use crate::CoreError;
    use herdsync_protocol::{ChangePayload, Cow, EntityFields, FeedRecord, OperationKind};
    use serde_json::json;

    fn patch(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn create_assigns_metadata_and_queues() {
        let ctx = SyncContext::in_memory();
        let cows = ctx.repository::<Cow>();

        let bessie = cows.create(Cow::new("Bessie", "C001")).unwrap();
        assert!(bessie.meta.id.starts_with("cow_"));
        assert_eq!(bessie.meta.version, 1);
        assert_eq!(bessie.meta.created_at, bessie.meta.updated_at);

        assert_eq!(cows.get_by_id(&bessie.meta.id), Some(bessie.clone()));
        let queued = ctx.queue().snapshot();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].kind, OperationKind::Create);
        assert_eq!(queued[0].snapshot(), Some(&Cow::into_payload(bessie.clone())));
    }

    #[test]
    fn update_merges_patch_and_ignores_meta_keys() {
        let ctx = SyncContext::in_memory();
        let cows = ctx.repository::<Cow>();
        let bessie = cows.create(Cow::new("Bessie", "C001")).unwrap();

        let updated = cows
            .update(
                &bessie.meta.id,
                &patch(json!({ "breed": "Jersey", "version": 99, "id": "hijack" })),
            )
            .unwrap()
            .unwrap();

        assert_eq!(updated.meta.id, bessie.meta.id);
        assert_eq!(updated.meta.version, 2);
        assert!(updated.meta.updated_at >= bessie.meta.updated_at);
        assert_eq!(updated.fields.breed.as_deref(), Some("Jersey"));
        assert_eq!(updated.fields.name, "Bessie");

        let last = ctx.queue().snapshot().pop().unwrap();
        assert_eq!(last.kind, OperationKind::Update);
        assert_eq!(last.base_version, Some(1));
    }

    #[test]
    fn update_missing_is_none_without_writes() {
        let ctx = SyncContext::in_memory();
        let cows = ctx.repository::<Cow>();
        let result = cows.update("cow_missing", &patch(json!({ "name": "x" }))).unwrap();
        assert!(result.is_none());
        assert_eq!(ctx.queue().pending_changes_count(), 0);
    }

    #[test]
    fn invalid_patch_is_rejected() {
        let ctx = SyncContext::in_memory();
        let feed = ctx.repository::<FeedRecord>();
        let record = feed.create(FeedRecord {
            date: "2024-01-01".into(),
            feed_type: "hay".into(),
            quantity_kg: 50.0,
            cost_per_kg: None,
            notes: None,
        }).unwrap();

        let err = feed
            .update(&record.meta.id, &patch(json!({ "quantityKg": "lots" })))
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidPatch { .. }));
        assert_eq!(feed.get_by_id(&record.meta.id), Some(record));
        assert_eq!(ctx.queue().pending_changes_count(), 1);
    }

    #[test]
    fn update_with_closure() {
        let ctx = SyncContext::in_memory();
        let cows = ctx.repository::<Cow>();
        let bessie = cows.create(Cow::new("Bessie", "C001")).unwrap();

        let updated = cows
            .update_with(&bessie.meta.id, |c| c.status = Some("dry".into()))
            .unwrap()
            .unwrap();
        assert_eq!(updated.fields.status.as_deref(), Some("dry"));
        assert!(cows.update_with("cow_missing", |_| {}).unwrap().is_none());
    }

    #[test]
    fn non_finite_edit_leaves_record_untouched() {
        let ctx = SyncContext::in_memory();
        let feed = ctx.repository::<FeedRecord>();
        let record = feed.create(FeedRecord {
            date: "2024-01-01".into(),
            feed_type: "hay".into(),
            quantity_kg: 50.0,
            cost_per_kg: None,
            notes: None,
        }).unwrap();

        let err = feed
            .update_with(&record.meta.id, |f| f.cost_per_kg = Some(f64::INFINITY))
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidFields { .. }));
        assert_eq!(feed.get_by_id(&record.meta.id), Some(record));
        assert_eq!(ctx.queue().pending_changes_count(), 1);
    }

    #[test]
    fn delete_queues_tombstone() {
        let ctx = SyncContext::in_memory();
        let cows = ctx.repository::<Cow>();
        let bessie = cows.create(Cow::new("Bessie", "C001")).unwrap();

        assert!(cows.delete(&bessie.meta.id));
        assert!(!cows.delete(&bessie.meta.id));
        assert_eq!(cows.count(), 0);

        let last = ctx.queue().snapshot().pop().unwrap();
        assert_eq!(last.kind, OperationKind::Delete);
        assert_eq!(
            last.payload,
            ChangePayload::Tombstone {
                id: bessie.meta.id.clone()
            }
        );
        assert_eq!(ctx.queue().pending_changes_count(), 2);
    }

    #[test]
    fn query_matches_exact_values() {
        let ctx = SyncContext::in_memory();
        let cows = ctx.repository::<Cow>();
        cows.create(Cow::new("Bessie", "C001")).unwrap();
        let daisy = cows.create(Cow::new("Daisy", "C002")).unwrap();

        assert_eq!(cows.query(&patch(json!({ "name": "Daisy" }))), vec![daisy.clone()]);
        assert_eq!(cows.query(&patch(json!({ "id": daisy.meta.id }))).len(), 1);
        assert_eq!(cows.query(&patch(json!({ "breed": null }))).len(), 2);
        assert!(cows.query(&patch(json!({ "name": "daisy" }))).is_empty());
        assert_eq!(cows.query(&serde_json::Map::new()).len(), 2);
    }

    #[test]
    fn apply_remote_does_not_queue() {
        let ctx = SyncContext::in_memory();
        let cows = ctx.repository::<Cow>();
        let bessie = cows.create(Cow::new("Bessie", "C001")).unwrap();
        let pending = ctx.queue().pending_changes_count();

        let mut remote = bessie.clone();
        remote.fields.name = "Bess".into();
        remote.meta.version = 4;
        cows.apply_remote(&bessie.meta.id, Some(remote.clone()));
        assert_eq!(cows.get_by_id(&bessie.meta.id), Some(remote));

        cows.apply_remote(&bessie.meta.id, None);
        assert_eq!(cows.count(), 0);
        assert_eq!(ctx.queue().pending_changes_count(), pending);
    }
}
