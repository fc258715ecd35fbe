/// In-memory document store with failure injection
///
/// Useful for tests and dry runs. Individual paths (or every write) can be
/// made to fail, and writes can be slowed down to exercise the concurrent
/// upload path.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::remote::{apply_write, paths, DocumentStore, RemoteError, WriteMode};

#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    documents: Mutex<BTreeMap<String, Value>>,
    failing_paths: Mutex<HashSet<String>>,
    fail_all: AtomicBool,
    write_latency_ms: AtomicU64,
    write_attempts: AtomicU64,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write to `path` (or, for `add`, to that collection) fail
    pub fn fail_path(&self, path: &str) {
        if let Ok(mut failing) = self.failing_paths.lock() {
            failing.insert(path.trim_matches('/').to_string());
        }
    }

    pub fn clear_failures(&self) {
        if let Ok(mut failing) = self.failing_paths.lock() {
            failing.clear();
        }
        self.fail_all.store(false, Ordering::SeqCst);
    }

    /// Make every operation fail, reads included
    pub fn set_fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    /// Delay applied to each write before it resolves
    pub fn set_write_latency(&self, latency: Duration) {
        self.write_latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Number of writes attempted, failed ones included
    pub fn write_attempts(&self) -> u64 {
        self.write_attempts.load(Ordering::SeqCst)
    }

    /// Store a document directly, bypassing failure injection
    pub fn insert(&self, path: &str, data: Value) {
        if let Ok(mut docs) = self.documents.lock() {
            docs.insert(path.trim_matches('/').to_string(), data);
        }
    }

    /// Snapshot of one document
    pub fn document(&self, path: &str) -> Option<Value> {
        self.documents
            .lock()
            .ok()
            .and_then(|docs| docs.get(path.trim_matches('/')).cloned())
    }

    /// Paths of all documents below `prefix`, in order
    pub fn paths_under(&self, prefix: &str) -> Vec<String> {
        let prefix = format!("{}/", prefix.trim_matches('/'));
        self.documents
            .lock()
            .map(|docs| {
                docs.keys()
                    .filter(|path| path.starts_with(&prefix))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.documents.lock().map(|docs| docs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn begin_write(&self, path: &str) -> Result<(), RemoteError> {
        self.write_attempts.fetch_add(1, Ordering::SeqCst);

        let latency = self.write_latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        let rejected = self.fail_all.load(Ordering::SeqCst)
            || self
                .failing_paths
                .lock()
                .map(|failing| failing.contains(path))
                .unwrap_or(false);
        if rejected {
            return Err(RemoteError::WriteRejected { path: path.to_string() });
        }
        Ok(())
    }

    fn poisoned() -> RemoteError {
        RemoteError::Unavailable("memory store lock poisoned".to_string())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn set(&self, path: &str, data: Value, mode: WriteMode) -> Result<(), RemoteError> {
        let path = paths::normalize(path)?;
        self.begin_write(&path).await?;

        let mut docs = self.documents.lock().map_err(|_| Self::poisoned())?;
        let written = apply_write(docs.remove(&path), data, mode);
        docs.insert(path, written);
        Ok(())
    }

    async fn add(&self, collection: &str, data: Value) -> Result<String, RemoteError> {
        let collection = paths::normalize(collection)?;
        self.begin_write(&collection).await?;

        let id = Uuid::new_v4().simple().to_string();
        let mut docs = self.documents.lock().map_err(|_| Self::poisoned())?;
        docs.insert(format!("{}/{}", collection, id), data);
        Ok(id)
    }

    async fn get(&self, path: &str) -> Result<Option<Value>, RemoteError> {
        let path = paths::normalize(path)?;
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable(format!("read of {} failed", path)));
        }
        let docs = self.documents.lock().map_err(|_| Self::poisoned())?;
        Ok(docs.get(&path).cloned())
    }
}
