//! Local store configuration.

use herdsync_storage::{EncryptionKey, StorageResult};
use std::fmt;
use std::path::PathBuf;

/// Salt mixed into passphrase-derived keys.
const PASSWORD_SALT: &[u8] = b"herdsync-store-password-salt-v1";

/// Where the store encryption key comes from.
#[derive(Clone, Default)]
pub enum KeySource {
    /// The key compiled into the client.
    #[default]
    Embedded,
    /// A key derived from a passphrase.
    Password(String),
    /// An explicit key.
    Key(EncryptionKey),
}

impl KeySource {
    /// Resolves the source into a key.
    ///
    /// # Errors
    ///
    /// Returns an error if key derivation fails.
    pub fn resolve(&self) -> StorageResult<EncryptionKey> {
        match self {
            KeySource::Embedded => Ok(EncryptionKey::embedded()),
            KeySource::Password(password) => {
                EncryptionKey::derive_from_password(password.as_bytes(), PASSWORD_SALT)
            }
            KeySource::Key(key) => Ok(key.clone()),
        }
    }
}

impl fmt::Debug for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySource::Embedded => f.write_str("Embedded"),
            KeySource::Password(_) => f.write_str("Password([REDACTED])"),
            KeySource::Key(_) => f.write_str("Key([REDACTED])"),
        }
    }
}

/// Configuration for opening a [`SyncContext`](crate::SyncContext).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Store directory. `None` keeps everything in memory.
    pub directory: Option<PathBuf>,

    /// Encryption key source.
    pub key: KeySource,

    /// Whether to create the directory if it doesn't exist.
    pub create_if_missing: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            directory: None,
            key: KeySource::Embedded,
            create_if_missing: true,
        }
    }
}

impl StoreConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores data as files under `path`.
    #[must_use]
    pub fn directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.directory = Some(path.into());
        self
    }

    /// Sets the key source.
    #[must_use]
    pub fn key(mut self, key: KeySource) -> Self {
        self.key = key;
        self
    }

    /// Sets whether to create the directory if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = StoreConfig::default();
        assert!(config.directory.is_none());
        assert!(config.create_if_missing);
        assert!(matches!(config.key, KeySource::Embedded));
    }

    #[test]
    fn builder_pattern() {
        let config = StoreConfig::new()
            .directory("/tmp/herd")
            .key(KeySource::Password("hunter2".into()))
            .create_if_missing(false);

        assert_eq!(config.directory, Some(PathBuf::from("/tmp/herd")));
        assert!(!config.create_if_missing);
    }

    #[test]
    fn debug_redacts_secrets() {
        let debug = format!("{:?}", KeySource::Password("hunter2".into()));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn password_keys_are_deterministic() {
        let a = KeySource::Password("pw".into()).resolve().unwrap();
        let b = KeySource::Password("pw".into()).resolve().unwrap();
        let c = KeySource::Password("other".into()).resolve().unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
        assert_ne!(a.as_bytes(), c.as_bytes());
    }
}
