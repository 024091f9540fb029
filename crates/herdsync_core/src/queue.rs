//! Persisted FIFO of pending local changes.

use crate::events::{EventFeed, SyncEvent};
use herdsync_protocol::PendingChange;
use herdsync_storage::EncryptedStore;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, warn};

/// Local store key holding the queue.
pub const PENDING_CHANGES_KEY: &str = "pendingChanges";

struct QueueState {
    entries: VecDeque<PendingChange>,
    next_seq: u64,
}

/// Local changes awaiting acknowledgement by the backend.
///
/// The queue is mirrored to the local store after every mutation, so it
/// survives restarts. Entries leave it one at a time, by `seq`, when the
/// backend acknowledges them.
pub struct ChangeQueue {
    store: Arc<EncryptedStore>,
    events: Arc<EventFeed>,
    state: Mutex<QueueState>,
}

impl ChangeQueue {
    /// Loads the queue persisted in `store`.
    ///
    /// An unreadable queue loads as empty. Entries whose `seq` values are not
    /// strictly increasing are renumbered in stored order.
    pub fn load(store: Arc<EncryptedStore>, events: Arc<EventFeed>) -> Self {
        let mut entries: VecDeque<PendingChange> =
            store.get_item(PENDING_CHANGES_KEY, VecDeque::new());

        let ordered = entries
            .iter()
            .zip(entries.iter().skip(1))
            .all(|(a, b)| a.seq < b.seq)
            && entries.front().map_or(true, |c| c.seq > 0);
        if !ordered {
            warn!(count = entries.len(), "renumbering pending changes");
            for (i, change) in entries.iter_mut().enumerate() {
                change.seq = i as u64 + 1;
            }
        }

        let next_seq = entries.back().map_or(1, |c| c.seq + 1);
        debug!(pending = entries.len(), next_seq, "change queue loaded");

        Self {
            store,
            events,
            state: Mutex::new(QueueState { entries, next_seq }),
        }
    }

    /// Appends `change`, assigning its `seq`, and persists the queue.
    ///
    /// Returns the assigned `seq`.
    pub fn queue_change(&self, mut change: PendingChange) -> u64 {
        let (seq, pending) = {
            let mut state = self.state.lock();
            let seq = state.next_seq;
            state.next_seq += 1;
            change.seq = seq;
            debug!(seq, id = %change.id, kind = %change.kind, "change queued");
            state.entries.push_back(change);
            self.persist(&state.entries);
            (seq, state.entries.len())
        };
        self.events.emit(SyncEvent::QueueChanged { pending });
        seq
    }

    /// Number of queued changes.
    pub fn pending_changes_count(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Returns true if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    /// Copy of the queue in append order.
    pub fn snapshot(&self) -> Vec<PendingChange> {
        self.state.lock().entries.iter().cloned().collect()
    }

    /// Queued changes for entity `id`, in append order.
    pub fn pending_for(&self, id: &str) -> Vec<PendingChange> {
        self.state
            .lock()
            .entries
            .iter()
            .filter(|c| c.id == id)
            .cloned()
            .collect()
    }

    /// Current copy of the entry with `seq`, if still queued.
    pub fn get(&self, seq: u64) -> Option<PendingChange> {
        self.state.lock().entries.iter().find(|c| c.seq == seq).cloned()
    }

    /// Whether the entry with `seq` is still queued.
    pub fn contains_seq(&self, seq: u64) -> bool {
        self.state.lock().entries.iter().any(|c| c.seq == seq)
    }

    /// Removes exactly the entry with `seq`.
    ///
    /// Returns false if no such entry is queued.
    pub fn acknowledge(&self, seq: u64) -> bool {
        let pending = {
            let mut state = self.state.lock();
            let Some(pos) = state.entries.iter().position(|c| c.seq == seq) else {
                return false;
            };
            state.entries.remove(pos);
            self.persist(&state.entries);
            state.entries.len()
        };
        self.events.emit(SyncEvent::QueueChanged { pending });
        true
    }

    /// Drops every queued change for entity `id`.
    ///
    /// Returns the number of entries removed.
    pub fn discard_for(&self, id: &str) -> usize {
        let (removed, pending) = {
            let mut state = self.state.lock();
            let before = state.entries.len();
            state.entries.retain(|c| c.id != id);
            let removed = before - state.entries.len();
            if removed == 0 {
                return 0;
            }
            self.persist(&state.entries);
            (removed, state.entries.len())
        };
        debug!(id, removed, "discarded queued changes");
        self.events.emit(SyncEvent::QueueChanged { pending });
        removed
    }

    /// Marks every queued change for entity `id` as forced.
    ///
    /// Returns the number of entries marked.
    pub fn mark_forced(&self, id: &str) -> usize {
        let mut state = self.state.lock();
        let mut marked = 0;
        for change in state.entries.iter_mut().filter(|c| c.id == id) {
            change.force = true;
            marked += 1;
        }
        if marked > 0 {
            self.persist(&state.entries);
        }
        marked
    }

    fn persist(&self, entries: &VecDeque<PendingChange>) {
        self.store.set_item(PENDING_CHANGES_KEY, entries);
    }
}

impl std::fmt::Debug for ChangeQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeQueue")
            .field("pending", &self.pending_changes_count())
            .finish()
    }
}
