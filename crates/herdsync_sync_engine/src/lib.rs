//! # HerdSync Sync Engine
//!
//! Moves queued local changes to the authoritative backend.
//!
//! This crate provides:
//! - [`ConnectivityMonitor`], the online/offline signal with listeners
//! - [`RemoteBackend`], the transport seam, with HTTP and mock implementations
//! - [`SyncCoordinator`], the drain/reconcile state machine
//! - Retry with exponential backoff
//!
//! ## Architecture
//!
//! The coordinator implements a **push-and-reconcile** model:
//! 1. Send each queued change, oldest first
//! 2. Remove it from the queue when the backend acknowledges it
//! 3. When the backend answers with its own version, compare; equal means
//!    the change already landed, different means a conflict for the user
//!
//! ## Key Invariants
//!
//! - A change leaves the queue only after acknowledgement
//! - Changes for one entity are never reordered
//! - Changes for a conflicted entity are held until it is resolved
//! - Only one drain runs at a time
//!
//! ## Example
//!
//! ```rust
//! use herdsync_core::SyncContext;
//! use herdsync_protocol::Cow;
//! use herdsync_sync_engine::{ConnectivityMonitor, MockBackend, SyncConfig, SyncCoordinator};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let ctx = SyncContext::in_memory();
//! let monitor = ConnectivityMonitor::new(false);
//! let coordinator = SyncCoordinator::new(SyncConfig::default(), ctx.clone(), MockBackend::new(), monitor.clone());
//!
//! ctx.repository::<Cow>().create(Cow::new("Bessie", "C001")).unwrap();
//! assert_eq!(coordinator.pending_changes_count(), 1);
//!
//! monitor.set_online(true);
//! coordinator.sync_now().await.unwrap();
//! assert_eq!(coordinator.pending_changes_count(), 0);
//! # });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod connectivity;
mod error;
mod http;
mod state;
mod transport;

pub use config::{RetryConfig, SyncConfig};
pub use connectivity::{ConnectivityMonitor, ListenerHandle};
pub use error::{SyncError, SyncResult};
pub use http::{HttpBackend, HttpClient, LoopbackClient, LoopbackServer};
pub use state::{DrainReport, SyncCoordinator, SyncState, SyncStats};
pub use transport::{MockBackend, MockReply, RemoteBackend};
