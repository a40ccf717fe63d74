//! Durable Client Storage
//!
//! Namespaced JSON files with restricted permissions (0600) holding cached
//! client state: session snapshots, persisted tokens, pending redirect data.
//! Contents are advisory; nothing stored here is proof of authentication.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt record at {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Namespaced JSON key/value store backed by one file per key
#[derive(Debug, Clone)]
pub struct JsonStore {
    dir: PathBuf,
    namespace: String,
}

impl JsonStore {
    pub fn new(dir: impl Into<PathBuf>, namespace: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            namespace: namespace.into(),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}-{key}.json", self.namespace))
    }

    /// Load a value, returning `None` when the key has never been written.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&path).map_err(|source| StorageError::Io {
            path: path.clone(),
            source,
        })?;

        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|source| StorageError::Corrupt { path, source })
    }

    /// Save a value, creating the directory if needed.
    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let path = self.path_for(key);

        fs::create_dir_all(&self.dir).map_err(|source| StorageError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let contents = serde_json::to_string_pretty(value).map_err(|source| {
            StorageError::Corrupt {
                path: path.clone(),
                source,
            }
        })?;

        write_restricted(&path, contents.as_bytes()).map_err(|source| StorageError::Io {
            path: path.clone(),
            source,
        })?;

        tracing::trace!(path = %path.display(), "Stored client record");
        Ok(())
    }

    /// Delete a value. Deleting a missing key is a no-op.
    pub fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }

    /// Load a value, then delete it so a second load observes nothing.
    pub fn take<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        let value = self.load(key)?;
        if value.is_some() {
            self.delete(key)?;
        }
        Ok(value)
    }
}

/// Write with owner-only permissions where the platform supports it.
fn write_restricted(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)?;
        file.write_all(contents)
    }

    #[cfg(not(unix))]
    {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.write_all(contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Record {
        name: String,
        count: u32,
    }

    fn store() -> (tempfile::TempDir, JsonStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path(), "test");
        (dir, store)
    }

    #[test]
    fn test_load_missing_key() {
        let (_dir, store) = store();
        let loaded: Option<Record> = store.load("absent").unwrap();
        assert_eq!(loaded, None);
    }

    #[test]
    fn test_save_and_load() {
        let (_dir, store) = store();
        let record = Record {
            name: "alice".to_string(),
            count: 3,
        };

        store.save("record", &record).unwrap();
        let loaded: Option<Record> = store.load("record").unwrap();
        assert_eq!(loaded, Some(record));
    }

    #[test]
    fn test_delete_is_idempotent() {
        let (_dir, store) = store();
        store.save("record", &1u32).unwrap();
        store.delete("record").unwrap();
        store.delete("record").unwrap();

        let loaded: Option<u32> = store.load("record").unwrap();
        assert_eq!(loaded, None);
    }

    #[test]
    fn test_take_consumes_value() {
        let (_dir, store) = store();
        store.save("once", &7u32).unwrap();

        assert_eq!(store.take::<u32>("once").unwrap(), Some(7));
        assert_eq!(store.take::<u32>("once").unwrap(), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_restricted_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let (_dir, store) = store();
        store.save("secret", &1u32).unwrap();

        let meta = std::fs::metadata(store.path_for("secret")).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, 0o600);
    }
}
