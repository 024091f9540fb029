//! Encrypted local store.
//!
//! Values are serialized to JSON, sealed with [`CryptoManager`] and handed
//! to a [`KeyValueBackend`]. Reads never fail the caller: a missing key
//! yields the caller's default, and so does any value that cannot be
//! decrypted or parsed.

use crate::backend::KeyValueBackend;
use crate::encrypted::{CryptoManager, EncryptionKey};
use crate::error::StorageResult;
use crate::memory::InMemoryBackend;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, warn};

/// A key/value store that encrypts every value at rest.
///
/// The store is shared by every component of a sync session; components
/// keep their data apart by using distinct keys.
pub struct EncryptedStore {
    backend: Arc<dyn KeyValueBackend>,
    crypto: CryptoManager,
}

impl EncryptedStore {
    /// Creates a store over `backend` sealed with `key`.
    pub fn new(backend: Arc<dyn KeyValueBackend>, key: &EncryptionKey) -> Self {
        Self {
            backend,
            crypto: CryptoManager::new(key),
        }
    }

    /// Creates a store over a fresh [`InMemoryBackend`] using the embedded key.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryBackend::new()), &EncryptionKey::embedded())
    }

    /// Returns the underlying backend.
    pub fn backend(&self) -> &Arc<dyn KeyValueBackend> {
        &self.backend
    }

    /// Serializes, encrypts and writes `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization, encryption or the backend write
    /// fails.
    pub fn try_set_item<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StorageResult<()> {
        let plaintext = serde_json::to_vec(value)?;
        let sealed = self.crypto.encrypt(&plaintext)?;
        self.backend.put(key, &sealed)
    }

    /// Writes `value` under `key`, logging and swallowing any failure.
    ///
    /// Use [`try_set_item`](Self::try_set_item) when the caller must know
    /// whether the write reached the backend.
    pub fn set_item<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        if let Err(e) = self.try_set_item(key, value) {
            error!(key, error = %e, "failed to persist item");
        }
    }

    /// Reads, decrypts and deserializes the value under `key`.
    ///
    /// Returns `Ok(None)` if the key is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend read fails, the value cannot be
    /// decrypted, or the plaintext is not a valid `T`.
    pub fn try_get_item<T: DeserializeOwned>(&self, key: &str) -> StorageResult<Option<T>> {
        let Some(sealed) = self.backend.get(key)? else {
            return Ok(None);
        };
        let plaintext = self.crypto.decrypt(&sealed)?;
        Ok(Some(serde_json::from_slice(&plaintext)?))
    }

    /// Reads the value under `key`, falling back to `default`.
    ///
    /// An absent key returns `default` silently. A corrupt, undecryptable or
    /// malformed value is logged and also returns `default`, so a damaged
    /// cache behaves as if it were empty.
    pub fn get_item<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        match self.try_get_item(key) {
            Ok(Some(value)) => value,
            Ok(None) => default,
            Err(e) => {
                warn!(key, error = %e, "unreadable item, using default");
                default
            }
        }
    }

    /// Removes `key`. A missing key is not an error; backend failures are
    /// logged.
    pub fn remove_item(&self, key: &str) {
        if let Err(e) = self.backend.remove(key) {
            error!(key, error = %e, "failed to remove item");
        }
    }

    /// Returns true if a value (readable or not) is stored under `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        matches!(self.backend.get(key), Ok(Some(_)))
    }

    /// Lists stored keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot list its keys.
    pub fn keys(&self) -> StorageResult<Vec<String>> {
        self.backend.keys()
    }
}

impl std::fmt::Debug for EncryptedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedStore")
            .field("crypto", &self.crypto)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encrypted::KEY_SIZE;
    use proptest::prelude::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        liters: f64,
        tags: Vec<String>,
    }

    fn store_with_backend() -> (EncryptedStore, Arc<InMemoryBackend>) {
        let backend = Arc::new(InMemoryBackend::new());
        let store = EncryptedStore::new(backend.clone(), &EncryptionKey::embedded());
        (store, backend)
    }

    #[test]
    fn set_then_get_roundtrip() {
        let store = EncryptedStore::in_memory();
        let sample = Sample {
            name: "Bessie".into(),
            liters: 21.5,
            tags: vec!["holstein".into()],
        };

        store.set_item("sample", &sample);
        let loaded: Option<Sample> = store.get_item("sample", None);
        assert_eq!(loaded, Some(sample));
    }

    #[test]
    fn missing_key_returns_default() {
        let store = EncryptedStore::in_memory();
        let value: Vec<u32> = store.get_item("data_cow", vec![7]);
        assert_eq!(value, vec![7]);
    }

    #[test]
    fn values_are_not_stored_in_plaintext() {
        let (store, backend) = store_with_backend();
        store.set_item("secret", &"Bessie owes 120 dollars");

        let raw = backend.get("secret").unwrap().unwrap();
        let haystack = String::from_utf8_lossy(&raw);
        assert!(!haystack.contains("Bessie"));
    }

    #[test]
    fn corrupt_bytes_return_default() {
        let (store, backend) = store_with_backend();
        backend.put("data_cow", b"definitely not ciphertext").unwrap();

        let value: Vec<String> = store.get_item("data_cow", Vec::new());
        assert!(value.is_empty());
        assert!(store.try_get_item::<Vec<String>>("data_cow").is_err());
    }

    #[test]
    fn wrong_key_returns_default() {
        let backend = Arc::new(InMemoryBackend::new());
        let writer = EncryptedStore::new(backend.clone(), &EncryptionKey::embedded());
        let reader = EncryptedStore::new(
            backend,
            &EncryptionKey::from_bytes(&[9u8; KEY_SIZE]).unwrap(),
        );

        writer.set_item("conflicts", &vec![1, 2, 3]);
        let value: Vec<i32> = reader.get_item("conflicts", Vec::new());
        assert!(value.is_empty());
    }

    #[test]
    fn wrong_shape_returns_default() {
        let store = EncryptedStore::in_memory();
        store.set_item("pendingChanges", &"a string, not a list");

        let value: Vec<u64> = store.get_item("pendingChanges", vec![42]);
        assert_eq!(value, vec![42]);
    }

    #[test]
    fn remove_item_then_default() {
        let store = EncryptedStore::in_memory();
        store.set_item("k", &1u32);
        store.remove_item("k");
        store.remove_item("k");

        assert!(!store.contains_key("k"));
        assert_eq!(store.get_item("k", 0u32), 0);
    }

    proptest! {
        #[test]
        fn roundtrip_any_json_value(
            name in ".*",
            liters in (0u32..400_000).prop_map(|q| f64::from(q) / 4.0),
            tags in proptest::collection::vec("[a-z]{0,8}", 0..5),
        ) {
            let store = EncryptedStore::in_memory();
            let sample = Sample { name, liters, tags };
            store.set_item("sample", &sample);
            let loaded: Option<Sample> = store.get_item("sample", None);
            prop_assert_eq!(loaded, Some(sample));
        }
    }
}
