//! Key/value backend trait definition.

use crate::error::StorageResult;
use std::sync::Arc;

/// A low-level key/value backend for HerdSync.
///
/// Backends are **opaque byte stores**. They map string keys to byte
/// values and do not interpret what they hold; encryption and
/// serialization happen above them in [`crate::EncryptedStore`].
///
/// # Invariants
///
/// - `get` returns exactly the bytes most recently `put` under the key
/// - `remove` of a missing key succeeds
/// - Writes to one key never affect another key
/// - Backends must be `Send + Sync` for shared access
///
/// # Implementors
///
/// - [`super::InMemoryBackend`] - For testing
/// - [`super::FileBackend`] - For persistent storage
pub trait KeyValueBackend: Send + Sync {
    /// Reads the value stored under `key`.
    ///
    /// Returns `Ok(None)` if the key has never been written or was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying medium cannot be read.
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Writes `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid for this backend or the
    /// write fails.
    fn put(&self, key: &str, value: &[u8]) -> StorageResult<()>;

    /// Removes `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the removal fails.
    fn remove(&self, key: &str) -> StorageResult<()>;

    /// Lists all keys currently stored, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns an error if the key listing cannot be produced.
    fn keys(&self) -> StorageResult<Vec<String>>;
}

impl<B: KeyValueBackend + ?Sized> KeyValueBackend for Arc<B> {
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn put(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        (**self).put(key, value)
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        (**self).remove(key)
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        (**self).keys()
    }
}
