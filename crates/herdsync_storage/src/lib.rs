//! # HerdSync Storage
//!
//! Key/value persistence and the encrypted local store for HerdSync.
//!
//! This crate is the durability substrate of the sync subsystem. Backends
//! are **opaque byte stores** keyed by string; the [`EncryptedStore`] layered
//! on top serializes values to JSON and seals them with AES-256-GCM before
//! they reach a backend.
//!
//! ## Design Principles
//!
//! - Backends store bytes and know nothing about entities or queues
//! - Backends must be `Send + Sync` so a store can be shared across tasks
//! - A corrupt or undecryptable value degrades to "absent", never to a panic
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing and ephemeral sessions
//! - [`FileBackend`] - One file per key inside a locked directory
//!
//! ## Example
//!
//! ```rust
//! use herdsync_storage::EncryptedStore;
//!
//! let store = EncryptedStore::in_memory();
//! store.set_item("greeting", &vec!["hello", "world"]);
//!
//! let value: Vec<String> = store.get_item("greeting", Vec::new());
//! assert_eq!(value, vec!["hello", "world"]);
//!
//! let missing: Vec<String> = store.get_item("nothing-here", Vec::new());
//! assert!(missing.is_empty());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod encrypted;
mod error;
mod file;
mod local_store;
mod memory;

pub use backend::KeyValueBackend;
pub use encrypted::{CryptoManager, EncryptionKey, KEY_SIZE, NONCE_SIZE, TAG_SIZE};
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use local_store::EncryptedStore;
pub use memory::InMemoryBackend;
