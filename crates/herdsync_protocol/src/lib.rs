//! # HerdSync Protocol
//!
//! Data types shared by the local store, the sync coordinator and the
//! remote backend.
//!
//! This crate provides:
//! - [`EntityType`], the closed set of synchronized collections
//! - [`Record`] and [`EntityMeta`], the versioned entity envelope
//! - [`EntityPayload`], a tagged union over every collection's record shape
//! - [`PendingChange`] for queued local mutations
//! - [`ConflictRecord`] for divergences awaiting resolution
//! - [`ApplyRequest`] / [`ApplyOutcome`] JSON wire messages
//!
//! This is a pure data crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod conflict;
mod entity;
mod error;
mod messages;
mod operation;
mod payload;

pub use conflict::{ConflictRecord, ConflictResolution};
pub use entity::{EntityFields, EntityMeta, EntityType, Record};
pub use error::{ProtocolError, ProtocolResult};
pub use messages::{ApplyOutcome, ApplyRequest, APPLY_PATH, PROTOCOL_VERSION};
pub use operation::{ChangePayload, OperationKind, PendingChange};
pub use payload::{Cow, EntityPayload, FeedRecord, MilkProduction, VetVisit};
