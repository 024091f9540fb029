//! In-memory key/value backend for testing.

use crate::backend::KeyValueBackend;
use crate::error::StorageResult;
use parking_lot::RwLock;
use std::collections::HashMap;

/// An in-memory key/value backend.
///
/// This backend keeps all values in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral sessions that don't need persistence
///
/// # Thread Safety
///
/// This backend is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use herdsync_storage::{InMemoryBackend, KeyValueBackend};
///
/// let backend = InMemoryBackend::new();
/// backend.put("k", b"value").unwrap();
/// assert_eq!(backend.get("k").unwrap(), Some(b"value".to_vec()));
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if no key is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Clears all data from the backend.
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl KeyValueBackend for InMemoryBackend {
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        self.entries.write().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        Ok(self.entries.read().keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_new_is_empty() {
        let backend = InMemoryBackend::new();
        assert!(backend.is_empty());
        assert!(backend.keys().unwrap().is_empty());
    }

    #[test]
    fn memory_get_missing_is_none() {
        let backend = InMemoryBackend::new();
        assert_eq!(backend.get("absent").unwrap(), None);
    }

    #[test]
    fn memory_put_replaces_value() {
        let backend = InMemoryBackend::new();
        backend.put("k", b"one").unwrap();
        backend.put("k", b"two").unwrap();

        assert_eq!(backend.get("k").unwrap(), Some(b"two".to_vec()));
        assert_eq!(backend.len(), 1);
    }

    #[test]
    fn memory_keys_are_isolated() {
        let backend = InMemoryBackend::new();
        backend.put("data_cow", b"cows").unwrap();
        backend.put("data_feed", b"feed").unwrap();

        assert_eq!(backend.get("data_cow").unwrap(), Some(b"cows".to_vec()));
        assert_eq!(backend.get("data_feed").unwrap(), Some(b"feed".to_vec()));

        let mut keys = backend.keys().unwrap();
        keys.sort();
        assert_eq!(keys, vec!["data_cow", "data_feed"]);
    }

    #[test]
    fn memory_remove_missing_succeeds() {
        let backend = InMemoryBackend::new();
        assert!(backend.remove("never-written").is_ok());
    }

    #[test]
    fn memory_remove_then_get() {
        let backend = InMemoryBackend::new();
        backend.put("k", b"v").unwrap();
        backend.remove("k").unwrap();
        assert_eq!(backend.get("k").unwrap(), None);
    }

    #[test]
    fn memory_clear() {
        let backend = InMemoryBackend::new();
        backend.put("a", b"1").unwrap();
        backend.put("b", b"2").unwrap();
        backend.clear();
        assert!(backend.is_empty());
    }
}
