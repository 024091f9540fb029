//! File-based key/value backend for persistent storage.
//!
//! Layout of a store directory:
//!
//! ```text
//! <store_path>/
//! ├─ LOCK                 # Advisory lock for single-writer
//! ├─ data_cow.bin         # One file per key
//! ├─ pendingChanges.bin
//! └─ conflicts.bin
//! ```

use crate::backend::KeyValueBackend;
use crate::error::{StorageError, StorageResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const VALUE_EXT: &str = "bin";
const TEMP_EXT: &str = "tmp";

/// A file-based key/value backend.
///
/// Each key is stored in its own file inside the store directory. Values
/// survive process restarts.
///
/// # Durability
///
/// `put` writes to a temporary file, syncs it and renames it over the
/// previous value, so a crash leaves either the old or the new value.
///
/// # Locking
///
/// The backend holds an exclusive advisory lock on `LOCK` for its whole
/// lifetime; a second backend on the same directory fails with
/// [`StorageError::Locked`].
///
/// # Example
///
/// ```no_run
/// use herdsync_storage::{FileBackend, KeyValueBackend};
/// use std::path::Path;
///
/// let backend = FileBackend::open(Path::new("farm-store")).unwrap();
/// backend.put("data_cow", b"ciphertext").unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    _lock_file: File,
}

impl FileBackend {
    /// Opens or creates a store directory and acquires its lock.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created, the path is not
    /// a directory, or another process holds the lock.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }

        if !path.is_dir() {
            return Err(StorageError::Io(std::io::Error::new(
                ErrorKind::InvalidInput,
                format!("path is not a directory: {}", path.display()),
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(StorageError::Locked(path.to_path_buf()));
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the store directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn value_path(&self, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;
        Ok(self.path.join(format!("{key}.{VALUE_EXT}")))
    }
}

/// Keys become file names, so only a conservative character set is allowed.
fn validate_key(key: &str) -> StorageResult<()> {
    let valid = !key.is_empty()
        && key != LOCK_FILE
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));

    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

impl KeyValueBackend for FileBackend {
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let path = self.value_path(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        let path = self.value_path(key)?;
        let temp_path = path.with_extension(TEMP_EXT);

        let mut file = File::create(&temp_path)?;
        file.write_all(value)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let path = self.value_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(VALUE_EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                keys.push(stem.to_string());
            }
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_open_creates_directory() {
        let dir = tempdir().unwrap();
        let store_path = dir.path().join("nested").join("store");

        let backend = FileBackend::open(&store_path).unwrap();
        assert!(store_path.is_dir());
        assert_eq!(backend.path(), store_path.as_path());
    }

    #[test]
    fn file_put_get_roundtrip() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();

        backend.put("data_cow", b"encrypted bytes").unwrap();
        assert_eq!(
            backend.get("data_cow").unwrap(),
            Some(b"encrypted bytes".to_vec())
        );
    }

    #[test]
    fn file_get_missing_is_none() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();
        assert_eq!(backend.get("pendingChanges").unwrap(), None);
    }

    #[test]
    fn file_values_survive_reopen() {
        let dir = tempdir().unwrap();

        {
            let backend = FileBackend::open(dir.path()).unwrap();
            backend.put("conflicts", b"[]").unwrap();
        }

        let backend = FileBackend::open(dir.path()).unwrap();
        assert_eq!(backend.get("conflicts").unwrap(), Some(b"[]".to_vec()));
    }

    #[test]
    fn file_second_open_is_locked() {
        let dir = tempdir().unwrap();
        let _first = FileBackend::open(dir.path()).unwrap();

        let second = FileBackend::open(dir.path());
        assert!(matches!(second, Err(StorageError::Locked(_))));
    }

    #[test]
    fn file_remove_missing_succeeds() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();
        assert!(backend.remove("data_feed").is_ok());
    }

    #[test]
    fn file_keys_lists_values_only() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();

        backend.put("data_cow", b"a").unwrap();
        backend.put("pendingChanges", b"b").unwrap();

        let mut keys = backend.keys().unwrap();
        keys.sort();
        assert_eq!(keys, vec!["data_cow", "pendingChanges"]);
    }

    #[test]
    fn file_rejects_path_like_keys() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();

        assert!(matches!(
            backend.put("../escape", b"x"),
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(
            backend.put("LOCK", b"x"),
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(
            backend.get(""),
            Err(StorageError::InvalidKey(_))
        ));
    }
}
