//! Encryption at rest using AES-256-GCM.
//!
//! ## Security Model
//!
//! - Every value is sealed independently with a fresh random nonce
//! - Sealed layout: `nonce (12 bytes) || ciphertext || tag (16 bytes)`
//! - Keys are zeroized on drop and redacted from `Debug` output
//! - The embedded client key protects a lost device's cache; it does not
//!   protect against an attacker holding the application binary

use crate::error::{StorageError, StorageResult};
use aes_gcm::{
    aead::{generic_array::GenericArray, Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of the AES-256 key in bytes.
pub const KEY_SIZE: usize = 32;
/// Size of the GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;
/// Size of the GCM authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// Input key material compiled into the client.
const EMBEDDED_SECRET: &[u8] = b"herdsync/local-store/embedded-secret/v1";
const EMBEDDED_SALT: &[u8] = b"herdsync-farm-cache";
const KEY_INFO: &[u8] = b"herdsync-store-key-v1";

/// Encryption key for AES-256-GCM.
///
/// The key is automatically zeroized when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey {
    bytes: [u8; KEY_SIZE],
}

impl EncryptionKey {
    /// Returns the fixed key embedded in the client.
    ///
    /// Every store opened with this key on any device can read every other
    /// such store.
    #[must_use]
    pub fn embedded() -> Self {
        use hkdf::Hkdf;
        use sha2::Sha256;

        let hk = Hkdf::<Sha256>::new(Some(EMBEDDED_SALT), EMBEDDED_SECRET);
        let mut bytes = [0u8; KEY_SIZE];
        // 32 bytes is far below the HKDF-SHA256 output limit, so expand cannot fail.
        if hk.expand(KEY_INFO, &mut bytes).is_err() {
            unreachable!("HKDF-SHA256 can always produce {KEY_SIZE} bytes");
        }
        Self { bytes }
    }

    /// Generates a new random encryption key.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Creates a key from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes slice is not exactly 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> StorageResult<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(StorageError::encryption(format!(
                "invalid key size: expected {KEY_SIZE}, got {}",
                bytes.len()
            )));
        }
        let mut key_bytes = [0u8; KEY_SIZE];
        key_bytes.copy_from_slice(bytes);
        Ok(Self { bytes: key_bytes })
    }

    /// Derives a key from a passphrase using HKDF-SHA256.
    ///
    /// HKDF is not a password hash; the passphrase should already carry
    /// high entropy.
    ///
    /// # Errors
    ///
    /// Returns an error if key expansion fails.
    pub fn derive_from_password(password: &[u8], salt: &[u8]) -> StorageResult<Self> {
        use hkdf::Hkdf;
        use sha2::Sha256;

        let hk = Hkdf::<Sha256>::new(Some(salt), password);
        let mut bytes = [0u8; KEY_SIZE];
        hk.expand(KEY_INFO, &mut bytes)
            .map_err(|_| StorageError::encryption("HKDF expand failed"))?;
        Ok(Self { bytes })
    }

    /// Returns the key as a byte slice.
    ///
    /// Don't log or serialize the result.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Seals and opens values with AES-256-GCM.
pub struct CryptoManager {
    cipher: Aes256Gcm,
}

impl CryptoManager {
    /// Creates a new crypto manager with the given key.
    #[must_use]
    pub fn new(key: &EncryptionKey) -> Self {
        let key_array = GenericArray::from_slice(key.as_bytes());
        Self {
            cipher: Aes256Gcm::new(key_array),
        }
    }

    /// Encrypts `plaintext`, returning `nonce || ciphertext || tag`.
    ///
    /// # Errors
    ///
    /// Returns an error if the cipher rejects the input.
    pub fn encrypt(&self, plaintext: &[u8]) -> StorageResult<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| StorageError::encryption("encryption error"))?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend(ciphertext);
        Ok(sealed)
    }

    /// Decrypts data produced by [`encrypt`](Self::encrypt).
    ///
    /// # Errors
    ///
    /// Returns an error if the input is too short, was tampered with, or
    /// was sealed under a different key.
    pub fn decrypt(&self, sealed: &[u8]) -> StorageResult<Vec<u8>> {
        if sealed.len() < NONCE_SIZE + TAG_SIZE {
            return Err(StorageError::encryption("ciphertext too short"));
        }

        let nonce = Nonce::from_slice(&sealed[..NONCE_SIZE]);
        self.cipher
            .decrypt(nonce, &sealed[NONCE_SIZE..])
            .map_err(|_| StorageError::encryption("authentication failed"))
    }
}

impl std::fmt::Debug for CryptoManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptoManager")
            .field("cipher", &"Aes256Gcm")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_key_is_stable() {
        let a = EncryptionKey::embedded();
        let b = EncryptionKey::embedded();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn key_wrong_size() {
        assert!(EncryptionKey::from_bytes(&[0u8; 16]).is_err());
        assert!(EncryptionKey::from_bytes(&[0u8; 64]).is_err());
        assert!(EncryptionKey::from_bytes(&[7u8; KEY_SIZE]).is_ok());
    }

    #[test]
    fn key_debug_is_redacted() {
        let key = EncryptionKey::from_bytes(&[0x42u8; KEY_SIZE]).unwrap();
        let rendered = format!("{key:?}");
        assert!(rendered.contains("REDACTED"));
        assert!(!rendered.contains("66"));
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let manager = CryptoManager::new(&EncryptionKey::embedded());

        let plaintext = br#"[{"id":"cow_1","name":"Bessie"}]"#;
        let sealed = manager.encrypt(plaintext).unwrap();
        assert_ne!(&sealed[NONCE_SIZE..], plaintext.as_slice());
        assert_eq!(sealed.len(), NONCE_SIZE + plaintext.len() + TAG_SIZE);

        assert_eq!(manager.decrypt(&sealed).unwrap(), plaintext);
    }

    #[test]
    fn encrypt_uses_fresh_nonce() {
        let manager = CryptoManager::new(&EncryptionKey::generate());
        let a = manager.encrypt(b"same").unwrap();
        let b = manager.encrypt(b"same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn tampered_data_fails() {
        let manager = CryptoManager::new(&EncryptionKey::embedded());
        let mut sealed = manager.encrypt(b"secret herd data").unwrap();
        sealed[NONCE_SIZE + 1] ^= 0xFF;
        assert!(manager.decrypt(&sealed).is_err());
    }

    #[test]
    fn different_keys_fail() {
        let a = CryptoManager::new(&EncryptionKey::generate());
        let b = CryptoManager::new(&EncryptionKey::generate());
        let sealed = a.encrypt(b"secret").unwrap();
        assert!(b.decrypt(&sealed).is_err());
    }

    #[test]
    fn too_short_fails() {
        let manager = CryptoManager::new(&EncryptionKey::embedded());
        assert!(manager.decrypt(&[0u8; 10]).is_err());
    }

    #[test]
    fn derive_from_password_depends_on_salt() {
        let k1 = EncryptionKey::derive_from_password(b"pass", b"salt-a").unwrap();
        let k2 = EncryptionKey::derive_from_password(b"pass", b"salt-a").unwrap();
        let k3 = EncryptionKey::derive_from_password(b"pass", b"salt-b").unwrap();
        assert_eq!(k1.as_bytes(), k2.as_bytes());
        assert_ne!(k1.as_bytes(), k3.as_bytes());
    }
}
