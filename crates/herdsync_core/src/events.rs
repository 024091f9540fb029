//! Event feed for observing queue, conflict and connectivity changes.
//!
//! The feed lets UI code react to state changes without polling:
//! - pending change counter
//! - conflict badge
//! - online indicator
//! - sync status line
//!
//! # Usage
//!
//! ```rust
//! use herdsync_core::{SyncContext, SyncEvent};
//! use herdsync_protocol::Cow;
//!
//! let ctx = SyncContext::in_memory();
//! let events = ctx.subscribe();
//!
//! ctx.repository::<Cow>().create(Cow::new("Bessie", "C001")).unwrap();
//!
//! let seen: Vec<SyncEvent> = events.try_iter().collect();
//! assert!(seen.contains(&SyncEvent::QueueChanged { pending: 1 }));
//! ```

use herdsync_protocol::EntityType;
use parking_lot::RwLock;
use std::sync::mpsc::{self, Receiver, Sender};

/// A state change observable by the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A local entity was written or removed.
    EntityChanged {
        /// Collection of the entity.
        entity_type: EntityType,
        /// Entity id.
        id: String,
        /// True if the entity no longer exists locally.
        deleted: bool,
    },
    /// The change queue grew or shrank.
    QueueChanged {
        /// Entries now queued.
        pending: usize,
    },
    /// The conflict set changed.
    ConflictsChanged {
        /// Records now held.
        count: usize,
    },
    /// Connectivity flipped.
    ConnectivityChanged {
        /// New state.
        online: bool,
    },
    /// The sync coordinator moved to another state.
    StateChanged {
        /// Name of the new state.
        state: &'static str,
    },
}

/// Distributes [`SyncEvent`]s to any number of subscribers.
///
/// Thread-safe. Subscribers whose receiver was dropped are pruned on the
/// next emit.
#[derive(Debug, Default)]
pub struct EventFeed {
    subscribers: RwLock<Vec<Sender<SyncEvent>>>,
}

impl EventFeed {
    /// Creates an empty feed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to all future events.
    pub fn subscribe(&self) -> Receiver<SyncEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push(tx);
        rx
    }

    /// Sends `event` to every live subscriber.
    pub fn emit(&self, event: SyncEvent) {
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Returns the number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}
