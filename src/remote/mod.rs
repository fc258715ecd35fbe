/// Remote document store
///
/// The remote side is an opaque hierarchical document database. Documents are
/// JSON objects addressed by slash-separated paths; the sync pipeline only
/// needs upsert, append and point reads.

pub mod paths;
pub mod memory;
pub mod sqlite;
pub mod http;

pub use memory::MemoryDocumentStore;
pub use sqlite::SqliteDocumentStore;
pub use http::HttpDocumentStore;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Errors that can occur while talking to the document store
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("Document store not reachable at {url}: {source}")]
    NotReachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid document path: {0}")]
    InvalidPath(String),

    #[error("Write rejected for {path}")]
    WriteRejected { path: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Document store unavailable: {0}")]
    Unavailable(String),
}

/// How `set` treats an existing document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Replace the whole document
    Overwrite,
    /// Merge the given fields into the existing document
    Merge,
}

impl WriteMode {
    pub fn is_merge(&self) -> bool {
        matches!(self, WriteMode::Merge)
    }
}

/// Port to the remote document database
///
/// Writes to one path are last-write-wins; there are no transactions spanning
/// several documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create or update the document at `path`
    async fn set(&self, path: &str, data: Value, mode: WriteMode) -> Result<(), RemoteError>;

    /// Append a document to `collection` under a generated id, returning the id
    async fn add(&self, collection: &str, data: Value) -> Result<String, RemoteError>;

    /// Read the document at `path`, if it exists
    async fn get(&self, path: &str) -> Result<Option<Value>, RemoteError>;
}

/// Merge `update` into `existing`
///
/// Nested objects are merged field by field; any other value in `update`
/// replaces the existing one.
pub fn merge_documents(existing: &mut Value, update: Value) {
    match (existing, update) {
        (Value::Object(target), Value::Object(source)) => {
            for (key, value) in source {
                match target.get_mut(&key) {
                    Some(slot) if slot.is_object() && value.is_object() => {
                        merge_documents(slot, value)
                    }
                    _ => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Apply a write to a stored document slot
pub(crate) fn apply_write(slot: Option<Value>, data: Value, mode: WriteMode) -> Value {
    match (slot, mode) {
        (Some(mut existing), WriteMode::Merge) => {
            merge_documents(&mut existing, data);
            existing
        }
        _ => data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_keeps_untouched_fields() {
        let mut doc = json!({ "heartRate": "2025-07-01", "steps": "2025-07-02" });
        merge_documents(&mut doc, json!({ "steps": "2025-07-03", "sleep": "2025-07-01" }));

        assert_eq!(doc["heartRate"], "2025-07-01");
        assert_eq!(doc["steps"], "2025-07-03");
        assert_eq!(doc["sleep"], "2025-07-01");
    }

    #[test]
    fn test_merge_nested_objects() {
        let mut doc = json!({ "profile": { "firstName": "Ada", "lastName": "L" } });
        merge_documents(&mut doc, json!({ "profile": { "lastName": "Lovelace" } }));
        assert_eq!(doc["profile"]["firstName"], "Ada");
        assert_eq!(doc["profile"]["lastName"], "Lovelace");
    }

    #[test]
    fn test_overwrite_replaces_document() {
        let written = apply_write(Some(json!({ "a": 1 })), json!({ "b": 2 }), WriteMode::Overwrite);
        assert_eq!(written, json!({ "b": 2 }));

        let merged = apply_write(Some(json!({ "a": 1 })), json!({ "b": 2 }), WriteMode::Merge);
        assert_eq!(merged, json!({ "a": 1, "b": 2 }));
    }
}
