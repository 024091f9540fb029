//! Sync coordinator state machine.

use crate::config::SyncConfig;
use crate::connectivity::{ConnectivityMonitor, ListenerHandle};
use crate::error::{SyncError, SyncResult};
use crate::transport::RemoteBackend;
use herdsync_core::{now_millis, SyncContext, SyncEvent};
use herdsync_protocol::{
    ApplyOutcome, ApplyRequest, ConflictRecord, ConflictResolution, EntityPayload, PendingChange,
};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// The current state of the sync coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Nothing in flight.
    Idle,
    /// Transmitting queued changes.
    Draining,
    /// Comparing backend versions with queued changes.
    Reconciling,
    /// Waiting for the user to resolve conflicts.
    Conflicted,
}

impl SyncState {
    /// Returns true while a drain is in progress.
    pub fn is_active(&self) -> bool {
        matches!(self, SyncState::Draining | SyncState::Reconciling)
    }

    /// Lowercase name for display and events.
    pub const fn name(&self) -> &'static str {
        match self {
            SyncState::Idle => "idle",
            SyncState::Draining => "draining",
            SyncState::Reconciling => "reconciling",
            SyncState::Conflicted => "conflicted",
        }
    }
}

/// Statistics about sync operations.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Drains that ran to completion without a transport error.
    pub cycles_completed: u64,
    /// Changes removed from the queue after acknowledgement.
    pub changes_acknowledged: u64,
    /// Conflicts recorded.
    pub conflicts_detected: u64,
    /// Changes the backend refused.
    pub rejections: u64,
    /// Retries performed by `sync_with_retry`.
    pub retries: u64,
    /// When the last drain finished.
    pub last_sync_time: Option<Instant>,
    /// Last error message.
    pub last_error: Option<String>,
}

/// What one drain did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Changes sent to the backend.
    pub transmitted: usize,
    /// Changes acknowledged and removed from the queue.
    pub acknowledged: usize,
    /// Changes left queued without being sent.
    pub held: usize,
    /// Changes the backend refused.
    pub rejected: usize,
    /// Entity ids that gained a conflict record.
    pub conflicts: Vec<String>,
    /// True if the drain stopped because connectivity was lost.
    pub interrupted: bool,
    /// Wall time of the drain.
    pub duration: Duration,
}

impl DrainReport {
    /// Returns true if the drain did nothing.
    pub fn is_empty(&self) -> bool {
        self.transmitted == 0 && self.held == 0
    }
}

struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Drains the change queue against the backend while online and tracks
/// conflicts until the user resolves them.
///
/// # State machine
///
/// ```text
/// Idle ──online / sync_now──▶ Draining ──▶ Reconciling ──▶ Idle
///                                                      └──▶ Conflicted ──resolve all──▶ Idle
/// ```
///
/// Local CRUD through the context's repositories is never blocked.
pub struct SyncCoordinator<B: RemoteBackend> {
    config: SyncConfig,
    context: SyncContext,
    backend: B,
    monitor: ConnectivityMonitor,
    state: RwLock<SyncState>,
    stats: RwLock<SyncStats>,
    draining: AtomicBool,
    shutdown: watch::Sender<bool>,
    connectivity_events: Option<ListenerHandle>,
}

impl<B: RemoteBackend> SyncCoordinator<B> {
    /// Creates a coordinator.
    ///
    /// Starts in `Conflicted` if the context already holds conflicts.
    pub fn new(
        config: SyncConfig,
        context: SyncContext,
        backend: B,
        monitor: ConnectivityMonitor,
    ) -> Self {
        let events = Arc::clone(context.events());
        let connectivity_events = monitor.add_listener(move |online| {
            events.emit(SyncEvent::ConnectivityChanged { online });
        });
        let initial = if context.conflicts().is_empty() {
            SyncState::Idle
        } else {
            SyncState::Conflicted
        };
        let (shutdown, _) = watch::channel(false);

        Self {
            config,
            context,
            backend,
            monitor,
            state: RwLock::new(initial),
            stats: RwLock::new(SyncStats::default()),
            draining: AtomicBool::new(false),
            shutdown,
            connectivity_events: Some(connectivity_events),
        }
    }

    /// Gets the current state.
    pub fn state(&self) -> SyncState {
        *self.state.read()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Returns the session context.
    pub fn context(&self) -> &SyncContext {
        &self.context
    }

    /// Returns the connectivity monitor.
    pub fn monitor(&self) -> &ConnectivityMonitor {
        &self.monitor
    }

    /// Returns the backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Number of changes waiting for the backend.
    pub fn pending_changes_count(&self) -> usize {
        self.context.queue().pending_changes_count()
    }

    /// Unresolved conflicts.
    pub fn conflicts(&self) -> Vec<ConflictRecord> {
        self.context.conflicts().conflicts()
    }

    /// Returns the connectivity snapshot.
    pub fn is_online(&self) -> bool {
        self.monitor.is_online()
    }

    /// Registers a connectivity callback.
    pub fn add_connectivity_listener<F>(&self, callback: F) -> ListenerHandle
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.monitor.add_listener(callback)
    }

    /// Settles the conflict for entity `id`.
    ///
    /// With `accept_local` the entity's queued changes are pushed with
    /// `force` on the next drain; otherwise the backend version replaces the
    /// local one and the queued changes are dropped. Unknown ids are a
    /// no-op. Returns true if a conflict was resolved.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend version cannot be written locally.
    pub fn resolve_conflict(&self, id: &str, accept_local: bool) -> SyncResult<bool> {
        let resolution = ConflictResolution::from_accept_local(accept_local);
        let resolved = self.context.resolve_conflict(id, resolution)?.is_some();

        if resolved && self.context.conflicts().is_empty() && self.state() == SyncState::Conflicted
        {
            self.set_state(SyncState::Idle);
        }
        Ok(resolved)
    }

    /// Drains the queue now.
    ///
    /// See [`process_queue`](Self::process_queue).
    pub async fn sync_now(&self) -> SyncResult<DrainReport> {
        self.process_queue().await
    }

    /// Transmits queued changes in append order, one at a time.
    ///
    /// A no-op when offline or when the queue is empty. Acknowledged changes
    /// leave the queue immediately; everything else stays queued. Changes for
    /// a conflicted entity, or behind an unacknowledged change for the same
    /// entity, are held. A transport error or timeout ends the drain and is
    /// returned. Going offline ends it quietly, abandoning any change in
    /// flight, which stays queued.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::AlreadyRunning`] if another drain is in
    /// progress, or the transport error that ended the drain.
    pub async fn process_queue(&self) -> SyncResult<DrainReport> {
        if !self.monitor.is_online() || self.context.queue().is_empty() {
            return Ok(DrainReport::default());
        }
        if self
            .draining
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SyncError::AlreadyRunning);
        }
        let _guard = DrainGuard(&self.draining);

        let start = Instant::now();
        let mut report = DrainReport::default();
        self.set_state(SyncState::Draining);

        let (divergent, failure) = self.drain(&mut report).await;

        self.set_state(SyncState::Reconciling);
        self.reconcile(divergent, &mut report);

        report.duration = start.elapsed();
        self.set_state(if self.context.conflicts().is_empty() {
            SyncState::Idle
        } else {
            SyncState::Conflicted
        });

        {
            let mut stats = self.stats.write();
            stats.changes_acknowledged += report.acknowledged as u64;
            stats.conflicts_detected += report.conflicts.len() as u64;
            stats.rejections += report.rejected as u64;
            stats.last_sync_time = Some(Instant::now());
            match &failure {
                Some(e) => stats.last_error = Some(e.to_string()),
                None => {
                    stats.cycles_completed += 1;
                    stats.last_error = None;
                }
            }
        }

        info!(
            transmitted = report.transmitted,
            acknowledged = report.acknowledged,
            held = report.held,
            conflicts = report.conflicts.len(),
            interrupted = report.interrupted,
            "drain finished"
        );

        match failure {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    /// Drains with retry on transient errors.
    ///
    /// # Errors
    ///
    /// Returns the last error once attempts run out, or the first
    /// non-retryable error.
    pub async fn sync_with_retry(&self) -> SyncResult<DrainReport> {
        let retry = &self.config.retry;
        let attempts = retry.max_attempts.max(1);

        for attempt in 0..attempts {
            if attempt > 0 {
                tokio::time::sleep(retry.delay_for_attempt(attempt)).await;
                self.stats.write().retries += 1;
            }

            match self.process_queue().await {
                Ok(report) => return Ok(report),
                Err(e) if e.is_retryable() && attempt + 1 < attempts => {
                    debug!(attempt, error = %e, "drain failed, retrying");
                }
                Err(e) => return Err(e),
            }
        }

        Err(SyncError::transport_fatal("no sync attempts made"))
    }

    /// Runs until [`shutdown`](Self::shutdown), draining whenever
    /// connectivity returns and once at start if online.
    pub async fn run(&self) {
        let mut online = self.monitor.watch();
        let mut shutdown = self.shutdown.subscribe();
        if *shutdown.borrow_and_update() {
            return;
        }

        if *online.borrow_and_update() && self.config.sync_on_reconnect {
            self.drain_in_background().await;
        }

        loop {
            tokio::select! {
                changed = online.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let now_online = *online.borrow_and_update();
                    if now_online && self.config.sync_on_reconnect {
                        self.drain_in_background().await;
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
        debug!("sync loop stopped");
    }

    /// Stops [`run`](Self::run).
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    async fn drain_in_background(&self) {
        match self.sync_with_retry().await {
            Ok(report) if report.is_empty() => {}
            Ok(report) => debug!(acknowledged = report.acknowledged, "background drain done"),
            Err(SyncError::AlreadyRunning) => debug!("drain already running"),
            Err(e) => warn!(error = %e, "background drain failed"),
        }
    }

    async fn drain(
        &self,
        report: &mut DrainReport,
    ) -> (Vec<(PendingChange, Option<EntityPayload>)>, Option<SyncError>) {
        let mut blocked: HashSet<String> = HashSet::new();
        let mut divergent = Vec::new();
        let mut online = self.monitor.watch();

        for seq in self.context.queue().snapshot().into_iter().map(|c| c.seq) {
            if !self.monitor.is_online() {
                info!("went offline, stopping drain");
                report.interrupted = true;
                break;
            }
            // Resolution may have discarded or forced entries since the snapshot.
            let Some(change) = self.context.queue().get(seq) else {
                debug!(seq, "change left the queue during drain");
                continue;
            };
            if blocked.contains(&change.id)
                || (!change.force && self.context.conflicts().contains(&change.id))
            {
                report.held += 1;
                blocked.insert(change.id.clone());
                continue;
            }

            let request = ApplyRequest::new(change);
            report.transmitted += 1;
            let send =
                tokio::time::timeout(self.config.operation_timeout, self.backend.apply(&request));
            // A reply that is already in wins over the connectivity drop.
            let outcome = tokio::select! {
                biased;
                sent = send => match sent {
                    Ok(Ok(outcome)) => outcome,
                    Ok(Err(e)) => {
                        warn!(seq, error = %e, "transmission failed");
                        return (divergent, Some(e));
                    }
                    Err(_) => {
                        warn!(seq, "transmission timed out");
                        return (divergent, Some(SyncError::Timeout));
                    }
                },
                _ = went_offline(&mut online) => {
                    info!(seq, "went offline mid-transmission, stopping drain");
                    report.interrupted = true;
                    break;
                }
            };

            let change = request.change;
            match outcome {
                ApplyOutcome::Acknowledged => {
                    if self.context.queue().acknowledge(change.seq) {
                        report.acknowledged += 1;
                    }
                }
                ApplyOutcome::Rejected { reason } => {
                    warn!(id = %change.id, seq = change.seq, %reason, "change rejected");
                    report.rejected += 1;
                    blocked.insert(change.id);
                }
                ApplyOutcome::Current { remote } => {
                    blocked.insert(change.id.clone());
                    divergent.push((change, remote));
                }
            }
        }
        (divergent, None)
    }

    fn reconcile(
        &self,
        divergent: Vec<(PendingChange, Option<EntityPayload>)>,
        report: &mut DrainReport,
    ) {
        for (change, remote) in divergent {
            if !self.context.queue().contains_seq(change.seq) {
                debug!(id = %change.id, seq = change.seq, "divergent change already settled");
                continue;
            }
            if change.is_reflected_by(remote.as_ref()) {
                debug!(id = %change.id, seq = change.seq, "backend already has change");
                self.context.queue().acknowledge(change.seq);
                report.acknowledged += 1;
                continue;
            }

            let conflict = ConflictRecord::new(
                change.id.clone(),
                change.entity_type,
                change.snapshot().cloned(),
                remote,
                now_millis(),
            );
            self.context.conflicts().record(conflict);
            report.conflicts.push(change.id);
        }
    }

    fn set_state(&self, state: SyncState) {
        let previous = std::mem::replace(&mut *self.state.write(), state);
        if previous != state {
            debug!(from = previous.name(), to = state.name(), "sync state");
            self.context
                .events()
                .emit(SyncEvent::StateChanged { state: state.name() });
        }
    }
}

/// Completes once `online` reads false. Never completes if the monitor is gone.
async fn went_offline(online: &mut watch::Receiver<bool>) {
    if online.wait_for(|online| !*online).await.is_err() {
        std::future::pending::<()>().await;
    }
}

impl<B: RemoteBackend> Drop for SyncCoordinator<B> {
    fn drop(&mut self) {
        if let Some(handle) = self.connectivity_events.take() {
            handle.unsubscribe();
        }
    }
}

impl<B: RemoteBackend> std::fmt::Debug for SyncCoordinator<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncCoordinator")
            .field("state", &self.state())
            .field("online", &self.is_online())
            .field("pending", &self.pending_changes_count())
            .finish_non_exhaustive()
    }
}
