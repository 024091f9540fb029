//! # HerdSync Core
//!
//! Local-first data layer for HerdSync.
//!
//! This crate provides:
//! - [`Repository`] for typed CRUD over one entity collection
//! - [`ChangeQueue`], the persisted FIFO of changes awaiting the backend
//! - [`ConflictSet`], divergences awaiting a user decision
//! - [`EventFeed`] for reactive UI updates
//! - [`SyncContext`], which ties them to one encrypted store
//!
//! ## Design Principles
//!
//! - Local writes always succeed; sync happens later
//! - Every mutation is persisted before it is queued
//! - Not-found is a value, never an error
//!
//! ## Example
//!
//! ```rust
//! use herdsync_core::SyncContext;
//! use herdsync_protocol::Cow;
//! use serde_json::json;
//!
//! let ctx = SyncContext::in_memory();
//! let cows = ctx.repository::<Cow>();
//!
//! let bessie = cows.create(Cow::new("Bessie", "C001")).unwrap();
//! let patch = json!({ "breed": "Jersey" });
//! cows.update(&bessie.meta.id, patch.as_object().unwrap()).unwrap();
//! cows.delete(&bessie.meta.id);
//!
//! assert_eq!(ctx.queue().pending_changes_count(), 3);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod conflict_set;
mod context;
mod error;
mod events;
mod id;
mod queue;
mod repository;

pub use config::{KeySource, StoreConfig};
pub use conflict_set::{ConflictSet, CONFLICTS_KEY};
pub use context::SyncContext;
pub use error::{CoreError, CoreResult};
pub use events::{EventFeed, SyncEvent};
pub use id::{generate_id, now_millis};
pub use queue::{ChangeQueue, PENDING_CHANGES_KEY};
pub use repository::Repository;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
