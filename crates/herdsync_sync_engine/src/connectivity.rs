//! Online/offline tracking.
//!
//! The platform's network signal calls [`ConnectivityMonitor::set_online`];
//! everything else observes. Observation is push-based: callbacks for UI
//! code and a `tokio::sync::watch` channel for async tasks. Nothing polls.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tracing::info;

type Callback = Arc<dyn Fn(bool) + Send + Sync>;

struct Inner {
    state: watch::Sender<bool>,
    listeners: Mutex<Vec<(u64, Callback)>>,
    next_id: AtomicU64,
}

/// Tracks whether the device is online and notifies on transitions.
///
/// Clones share state.
#[derive(Clone)]
pub struct ConnectivityMonitor {
    inner: Arc<Inner>,
}

impl ConnectivityMonitor {
    /// Creates a monitor with the given initial state.
    pub fn new(online: bool) -> Self {
        let (state, _) = watch::channel(online);
        Self {
            inner: Arc::new(Inner {
                state,
                listeners: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Returns the current state.
    pub fn is_online(&self) -> bool {
        *self.inner.state.borrow()
    }

    /// Records the platform's connectivity signal.
    ///
    /// Listeners run only when the state actually changes; repeating the
    /// current state notifies nobody. Returns true on a transition.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.inner.state.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if !changed {
            return false;
        }

        info!(online, "connectivity changed");
        let callbacks: Vec<Callback> = self
            .inner
            .listeners
            .lock()
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        for callback in callbacks {
            callback(online);
        }
        true
    }

    /// Registers `callback` for both online and offline transitions.
    ///
    /// The callback receives the new state.
    pub fn add_listener<F>(&self, callback: F) -> ListenerHandle
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.lock().push((id, Arc::new(callback)));
        ListenerHandle {
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Returns a receiver that observes every state change.
    pub fn watch(&self) -> watch::Receiver<bool> {
        self.inner.state.subscribe()
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}

impl std::fmt::Debug for ConnectivityMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectivityMonitor")
            .field("online", &self.is_online())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Registration returned by [`ConnectivityMonitor::add_listener`].
///
/// Dropping the handle keeps the listener registered.
#[derive(Debug)]
pub struct ListenerHandle {
    id: u64,
    inner: Weak<Inner>,
}

impl ListenerHandle {
    /// Removes the listener from both online and offline notifications.
    pub fn unsubscribe(self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.listeners.lock().retain(|(id, _)| *id != self.id);
        }
    }
}

impl std::fmt::Debug for Inner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inner").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder(monitor: &ConnectivityMonitor) -> (Arc<Mutex<Vec<bool>>>, ListenerHandle) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handle = monitor.add_listener(move |online| sink.lock().push(online));
        (seen, handle)
    }

    #[test]
    fn notifies_only_on_transitions() {
        let monitor = ConnectivityMonitor::new(false);
        let (seen, _handle) = recorder(&monitor);

        assert!(!monitor.set_online(false));
        assert!(monitor.set_online(true));
        assert!(!monitor.set_online(true));
        assert!(monitor.set_online(false));

        assert_eq!(*seen.lock(), vec![true, false]);
        assert!(!monitor.is_online());
    }

    #[test]
    fn every_listener_sees_every_transition() {
        let monitor = ConnectivityMonitor::new(true);
        let (a, _ha) = recorder(&monitor);
        let (b, _hb) = recorder(&monitor);

        monitor.set_online(false);
        monitor.set_online(true);

        assert_eq!(*a.lock(), vec![false, true]);
        assert_eq!(*b.lock(), vec![false, true]);
    }

    #[test]
    fn unsubscribe_stops_both_directions() {
        let monitor = ConnectivityMonitor::new(false);
        let (seen, handle) = recorder(&monitor);

        monitor.set_online(true);
        handle.unsubscribe();
        assert_eq!(monitor.listener_count(), 0);

        monitor.set_online(false);
        monitor.set_online(true);
        assert_eq!(*seen.lock(), vec![true]);
    }

    #[test]
    fn unsubscribe_after_monitor_dropped() {
        let monitor = ConnectivityMonitor::new(false);
        let (_, handle) = recorder(&monitor);
        drop(monitor);
        handle.unsubscribe();
    }

    #[tokio::test]
    async fn watch_observes_changes() {
        let monitor = ConnectivityMonitor::new(false);
        let mut rx = monitor.watch();
        assert!(!*rx.borrow_and_update());

        monitor.set_online(true);
        rx.changed().await.unwrap();
        assert!(*rx.borrow_and_update());
    }
}
