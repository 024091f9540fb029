//! # HerdSync Sync Server
//!
//! An in-process authoritative backend for HerdSync clients.
//!
//! The server keeps the canonical entity set and decides, per change, whether
//! to apply it or to answer with its own current version of the entity:
//!
//! - a create is applied when the id is unknown
//! - an update is applied when the client edited the version the server holds
//! - a delete is applied unless the server holds a newer version than the
//!   client last saw
//! - a forced change is always applied
//!
//! [`SyncServer::handle_post`] exposes the same logic as a JSON endpoint so a
//! client's HTTP transport can be pointed at it directly.
//!
//! ```rust
//! use herdsync_protocol::{ApplyOutcome, ApplyRequest, Cow, EntityFields, EntityMeta, PendingChange, Record};
//! use herdsync_sync_server::{ServerConfig, SyncServer};
//!
//! let server = SyncServer::new(ServerConfig::default());
//! let cow = Cow::into_payload(Record { meta: EntityMeta::new("cow_1", 10), fields: Cow::new("Bessie", "C001") });
//!
//! let outcome = server.handle_apply(&ApplyRequest::new(PendingChange::create(cow.clone(), 10))).unwrap();
//! assert_eq!(outcome, ApplyOutcome::Acknowledged);
//! assert_eq!(server.entity_count(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod server;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use server::{ServerStats, SyncServer};
