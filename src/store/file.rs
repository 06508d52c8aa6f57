//! File-backed storage
//!
//! All keys live in one JSON document under the configured state
//! directory. Every operation reloads the document, so concurrent CLI
//! invocations see each other's writes; a mutex serializes the
//! read-modify-write within one process. Writes go through a temp file
//! and rename so a crash never leaves a half-written document.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::warn;

use super::{Storage, StorageError};

const SESSION_FILE: &str = "session.json";

/// Storage backend persisting to `<state_dir>/session.json`.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    /// Creates a backend rooted at the given state directory. The
    /// directory is created lazily on first write.
    pub fn new(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join(SESSION_FILE),
            lock: Mutex::new(()),
        }
    }

    /// Path of the backing document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> BTreeMap<String, String> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "session file unreadable; starting empty");
                return BTreeMap::new();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(doc) => doc,
            Err(err) => {
                // A corrupt document is abandoned rather than repaired; the
                // next write replaces it wholesale.
                warn!(path = %self.path.display(), error = %err, "session file corrupt; starting empty");
                BTreeMap::new()
            }
        }
    }

    fn persist(&self, doc: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(doc).map_err(|err| {
            StorageError::Io(std::io::Error::other(err))
        })?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        Ok(self.load().get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut doc = self.load();
        doc.insert(key.to_string(), value);
        self.persist(&doc)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut doc = self.load();
        if doc.remove(key).is_some() {
            self.persist(&doc)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn set_get_remove_round_trip() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path());

        assert_eq!(storage.get("k").unwrap(), None);
        storage.set("k", "\"v\"".to_string()).unwrap();
        assert_eq!(storage.get("k").unwrap().as_deref(), Some("\"v\""));
        storage.remove("k").unwrap();
        assert_eq!(storage.get("k").unwrap(), None);
    }

    #[test]
    fn state_dir_is_created_on_first_write() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("deep").join("state");
        let storage = FileStorage::new(&nested);
        storage.set("k", "1".to_string()).unwrap();
        assert!(nested.join(SESSION_FILE).exists());
    }

    #[test]
    fn corrupt_document_reads_as_empty() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path());
        fs::create_dir_all(dir.path()).unwrap();
        fs::write(dir.path().join(SESSION_FILE), "{broken").unwrap();

        assert_eq!(storage.get("k").unwrap(), None);
        // Writing replaces the corrupt document.
        storage.set("k", "1".to_string()).unwrap();
        assert_eq!(storage.get("k").unwrap().as_deref(), Some("1"));
    }

    #[test]
    fn writes_are_visible_to_a_second_instance() {
        let dir = TempDir::new().unwrap();
        let first = FileStorage::new(dir.path());
        let second = FileStorage::new(dir.path());
        first.set("k", "1".to_string()).unwrap();
        assert_eq!(second.get("k").unwrap().as_deref(), Some("1"));
    }

    #[test]
    fn no_temp_file_left_behind() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path());
        storage.set("k", "1".to_string()).unwrap();
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map(|x| x == "tmp").unwrap_or(false))
            .collect();
        assert!(leftovers.is_empty());
    }
}
