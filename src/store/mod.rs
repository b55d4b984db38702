//! Persistence seam for the ledger and metrics documents.
//!
//! Components receive a [`StateStore`] at construction: tests supply the
//! in-memory store, production supplies [`FileStore`], which holds an
//! advisory lock for the whole load→mutate→save cycle so that multiple
//! processes sharing the same state directory get at-most-one-writer
//! semantics per document. Readers go through [`StateStore::read`] and
//! see the last durably-committed snapshot without taking the lock; a
//! stale read is acceptable.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use fs4::FileExt;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Version and bookkeeping header shared by both persisted documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocMetadata {
    pub version: String,
    pub created: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl DocMetadata {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            version: "1.0".to_string(),
            created: now,
            last_updated: now,
        }
    }
}

/// Storage for named JSON documents.
pub trait StateStore: Send + Sync {
    /// Read the last committed snapshot of a document. Lock-free.
    fn read(&self, doc: &str) -> Result<Option<String>, StorageError>;

    /// Run a read-modify-write cycle under an exclusive per-document
    /// lock. `apply` receives the current contents (if any) and returns
    /// the new contents to commit.
    fn update(
        &self,
        doc: &str,
        apply: &mut dyn FnMut(Option<&str>) -> Result<String, StorageError>,
    ) -> Result<(), StorageError>;
}

/// In-memory store for tests and embedding.
#[derive(Default)]
pub struct MemoryStore {
    docs: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStore {
    fn read(&self, doc: &str) -> Result<Option<String>, StorageError> {
        let docs = self.docs.lock().expect("memory store poisoned");
        Ok(docs.get(doc).cloned())
    }

    fn update(
        &self,
        doc: &str,
        apply: &mut dyn FnMut(Option<&str>) -> Result<String, StorageError>,
    ) -> Result<(), StorageError> {
        let mut docs = self.docs.lock().expect("memory store poisoned");
        let next = apply(docs.get(doc).map(String::as_str))?;
        docs.insert(doc.to_string(), next);
        Ok(())
    }
}

/// File-backed store: one `<doc>.json` per document plus a `.<doc>.lock`
/// sidecar carrying the advisory lock.
pub struct FileStore {
    dir: PathBuf,
}

/// Holds the advisory lock; released on drop.
struct LockGuard(File);

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = self.0.unlock();
    }
}

impl FileStore {
    /// Create a store rooted at `dir`, creating the directory if needed.
    pub fn new(dir: PathBuf) -> Result<Self, StorageError> {
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|source| StorageError::Io {
                doc: dir.display().to_string(),
                source,
            })?;
        }
        Ok(Self { dir })
    }

    fn doc_path(&self, doc: &str) -> PathBuf {
        self.dir.join(format!("{doc}.json"))
    }

    fn acquire(&self, doc: &str) -> Result<LockGuard, StorageError> {
        let lock_path = self.dir.join(format!(".{doc}.lock"));
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|source| StorageError::Lock {
                doc: doc.to_string(),
                source,
            })?;
        file.lock_exclusive().map_err(|source| StorageError::Lock {
            doc: doc.to_string(),
            source,
        })?;
        Ok(LockGuard(file))
    }

    fn read_contents(&self, doc: &str) -> Result<Option<String>, StorageError> {
        match std::fs::read_to_string(self.doc_path(doc)) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io {
                doc: doc.to_string(),
                source,
            }),
        }
    }
}

impl StateStore for FileStore {
    fn read(&self, doc: &str) -> Result<Option<String>, StorageError> {
        self.read_contents(doc)
    }

    fn update(
        &self,
        doc: &str,
        apply: &mut dyn FnMut(Option<&str>) -> Result<String, StorageError>,
    ) -> Result<(), StorageError> {
        let _guard = self.acquire(doc)?;

        let current = self.read_contents(doc)?;
        let next = apply(current.as_deref())?;

        // Commit atomically: write a sibling temp file, then rename over
        // the document so readers never observe a partial write.
        let path = self.doc_path(doc);
        let tmp = self.dir.join(format!(".{doc}.json.tmp"));
        std::fs::write(&tmp, next).map_err(|source| StorageError::Io {
            doc: doc.to_string(),
            source,
        })?;
        std::fs::rename(&tmp, &path).map_err(|source| StorageError::Io {
            doc: doc.to_string(),
            source,
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert!(store.read("cost_tracking").unwrap().is_none());

        store
            .update("cost_tracking", &mut |current| {
                assert!(current.is_none());
                Ok("{\"v\":1}".to_string())
            })
            .unwrap();

        assert_eq!(store.read("cost_tracking").unwrap().unwrap(), "{\"v\":1}");

        store
            .update("cost_tracking", &mut |current| {
                assert_eq!(current, Some("{\"v\":1}"));
                Ok("{\"v\":2}".to_string())
            })
            .unwrap();

        assert_eq!(store.read("cost_tracking").unwrap().unwrap(), "{\"v\":2}");
    }

    #[test]
    fn file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("state")).unwrap();

        assert!(store.read("agent_metrics").unwrap().is_none());

        store
            .update("agent_metrics", &mut |_| Ok("{\"agents\":{}}".to_string()))
            .unwrap();

        assert_eq!(
            store.read("agent_metrics").unwrap().unwrap(),
            "{\"agents\":{}}"
        );
        assert!(dir.path().join("state").join("agent_metrics.json").exists());
    }

    #[test]
    fn file_store_update_sees_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf()).unwrap();

        store.update("doc", &mut |_| Ok("first".to_string())).unwrap();
        store
            .update("doc", &mut |current| {
                assert_eq!(current, Some("first"));
                Ok("second".to_string())
            })
            .unwrap();

        assert_eq!(store.read("doc").unwrap().unwrap(), "second");
    }

    #[test]
    fn file_store_leaves_no_temp_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf()).unwrap();
        store.update("doc", &mut |_| Ok("x".to_string())).unwrap();
        assert!(!dir.path().join(".doc.json.tmp").exists());
    }
}
