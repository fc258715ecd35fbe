/// SQLite-backed document store
///
/// Keeps documents in the `documents` table of the local database. Used when
/// no remote URL is configured, so a sync still has somewhere to write.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use uuid::Uuid;

use crate::remote::{apply_write, paths, DocumentStore, RemoteError, WriteMode};
use crate::storage::migrations;

pub struct SqliteDocumentStore {
    conn: Mutex<Connection>,
}

impl SqliteDocumentStore {
    /// Open (or create) the document table in the database at `db_path`
    pub fn open(db_path: &Path) -> Result<Self, RemoteError> {
        let conn = Connection::open(db_path)?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self, RemoteError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, RemoteError> {
        migrations::initialize_database(&conn)
            .map_err(|e| RemoteError::Unavailable(e.to_string()))?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, RemoteError> {
        self.conn
            .lock()
            .map_err(|_| RemoteError::Unavailable("document database lock poisoned".to_string()))
    }

    /// Paths of all documents below `prefix`, in order
    pub fn list_paths(&self, prefix: &str) -> Result<Vec<String>, RemoteError> {
        let pattern = format!("{}/%", prefix.trim_matches('/'));
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT path FROM documents WHERE path LIKE ?1 ORDER BY path")?;
        let rows = stmt.query_map(params![pattern], |row| row.get::<_, String>(0))?;

        let mut result = Vec::new();
        for path in rows {
            result.push(path?);
        }
        Ok(result)
    }

    fn read(conn: &Connection, path: &str) -> Result<Option<Value>, RemoteError> {
        let data: Option<String> = conn
            .query_row(
                "SELECT data FROM documents WHERE path = ?1",
                params![path],
                |row| row.get(0),
            )
            .optional()?;

        match data {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn write(conn: &Connection, path: &str, data: &Value) -> Result<(), RemoteError> {
        conn.execute(
            "INSERT INTO documents (path, data, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(path) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
            params![path, serde_json::to_string(data)?, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn set(&self, path: &str, data: Value, mode: WriteMode) -> Result<(), RemoteError> {
        let path = paths::normalize(path)?;
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let existing = if mode.is_merge() { Self::read(&tx, &path)? } else { None };
        Self::write(&tx, &path, &apply_write(existing, data, mode))?;
        tx.commit()?;

        tracing::debug!("Stored document {}", path);
        Ok(())
    }

    async fn add(&self, collection: &str, data: Value) -> Result<String, RemoteError> {
        let collection = paths::normalize(collection)?;
        let id = Uuid::new_v4().simple().to_string();
        let conn = self.conn()?;
        Self::write(&conn, &format!("{}/{}", collection, id), &data)?;

        tracing::debug!("Added document {} to {}", id, collection);
        Ok(id)
    }

    async fn get(&self, path: &str) -> Result<Option<Value>, RemoteError> {
        let path = paths::normalize(path)?;
        let conn = self.conn()?;
        Self::read(&conn, &path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_documents_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("docs.db");

        {
            let store = SqliteDocumentStore::open(&db).unwrap();
            store
                .set("patients/u1/meta/meta", json!({ "firstName": "Ada" }), WriteMode::Merge)
                .await
                .unwrap();
        }

        let store = SqliteDocumentStore::open(&db).unwrap();
        store
            .set("patients/u1/meta/meta", json!({ "lastName": "Lovelace" }), WriteMode::Merge)
            .await
            .unwrap();

        let doc = store.get("patients/u1/meta/meta").await.unwrap().unwrap();
        assert_eq!(doc, json!({ "firstName": "Ada", "lastName": "Lovelace" }));
    }

    #[tokio::test]
    async fn test_add_and_list() {
        let store = SqliteDocumentStore::in_memory().unwrap();
        store.add("patients/u1/questionnaires", json!({ "n": 1 })).await.unwrap();
        store.add("patients/u1/questionnaires", json!({ "n": 2 })).await.unwrap();
        store.set("patients/u2/meta/meta", json!({}), WriteMode::Overwrite).await.unwrap();

        assert_eq!(store.list_paths("patients/u1").unwrap().len(), 2);
        assert_eq!(store.get("patients/u1/nothing").await.unwrap(), None);
    }
}
