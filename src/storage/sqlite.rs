/// SQLite implementation of the local stores
///
/// Questionnaires are kept as one JSON list under `saved_questionnaires` and
/// the patient profile as one JSON object under `saved_patient`. Every change
/// rewrites the whole value inside a transaction.

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::domain::{EntryId, PatientProfile, QuestionnaireEntry};
use crate::storage::{migrations, PatientStorage, QuestionnaireStorage, StorageError};

/// Key of the questionnaire list
pub const QUESTIONNAIRES_KEY: &str = "saved_questionnaires";

/// Key of the patient profile
pub const PATIENT_KEY: &str = "saved_patient";

/// SQLite-based storage implementation
///
/// The connection sits behind a mutex so the store can be shared between the
/// tool server and a sync running in the background.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Create a new SQLite storage instance
    ///
    /// This opens the database file and runs any necessary migrations
    /// to ensure the schema is up to date.
    pub fn new(db_path: PathBuf) -> Result<Self, StorageError> {
        let conn = Connection::open(&db_path)
            .map_err(|e| StorageError::Connection(format!("Failed to open database: {}", e)))?;

        migrations::initialize_database(&conn)?;

        tracing::info!("SQLite storage initialized at: {:?}", db_path);

        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Storage that lives only as long as this value
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StorageError::Connection(format!("Failed to open database: {}", e)))?;
        migrations::initialize_database(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Connection("Database lock poisoned".to_string()))
    }

    fn read_value<T: DeserializeOwned>(conn: &Connection, key: &str) -> Result<Option<T>, StorageError> {
        let raw: Option<String> = conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn write_value<T: Serialize>(conn: &Connection, key: &str, value: &T) -> Result<(), StorageError> {
        conn.execute(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, serde_json::to_string(value)?, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn remove_value(conn: &Connection, key: &str) -> Result<(), StorageError> {
        conn.execute("DELETE FROM kv_store WHERE key = ?1", params![key])?;
        Ok(())
    }

    /// Load the questionnaire list, apply `change` and store the result
    fn modify_questionnaires<R>(
        &self,
        change: impl FnOnce(&mut Vec<QuestionnaireEntry>) -> Result<R, StorageError>,
    ) -> Result<R, StorageError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let mut entries: Vec<QuestionnaireEntry> =
            Self::read_value(&tx, QUESTIONNAIRES_KEY)?.unwrap_or_default();
        let result = change(&mut entries)?;
        Self::write_value(&tx, QUESTIONNAIRES_KEY, &entries)?;

        tx.commit()?;
        Ok(result)
    }

    fn not_found(entry_id: &EntryId) -> StorageError {
        StorageError::QuestionnaireNotFound {
            entry_id: entry_id.to_string(),
        }
    }
}

impl QuestionnaireStorage for SqliteStorage {
    fn save_questionnaire(&self, entry: &QuestionnaireEntry) -> Result<(), StorageError> {
        self.modify_questionnaires(|entries| {
            entries.push(entry.clone());
            Ok(())
        })?;

        tracing::debug!("Saved questionnaire {}", entry.id);
        Ok(())
    }

    fn load_questionnaires(&self) -> Result<Vec<QuestionnaireEntry>, StorageError> {
        let conn = self.conn()?;
        let mut entries: Vec<QuestionnaireEntry> =
            Self::read_value(&conn, QUESTIONNAIRES_KEY)?.unwrap_or_default();
        entries.sort_by_key(|e| e.timestamp);
        Ok(entries)
    }

    fn get_questionnaire(&self, entry_id: &EntryId) -> Result<QuestionnaireEntry, StorageError> {
        self.load_questionnaires()?
            .into_iter()
            .find(|e| &e.id == entry_id)
            .ok_or_else(|| Self::not_found(entry_id))
    }

    fn delete_questionnaire(&self, entry_id: &EntryId) -> Result<(), StorageError> {
        self.modify_questionnaires(|entries| {
            let before = entries.len();
            entries.retain(|e| &e.id != entry_id);
            if entries.len() == before {
                return Err(Self::not_found(entry_id));
            }
            Ok(())
        })?;

        tracing::debug!("Deleted questionnaire {}", entry_id);
        Ok(())
    }

    fn replace_questionnaire(
        &self,
        entry_id: &EntryId,
        replacement: &QuestionnaireEntry,
    ) -> Result<(), StorageError> {
        self.modify_questionnaires(|entries| {
            let position = entries
                .iter()
                .position(|e| &e.id == entry_id)
                .ok_or_else(|| Self::not_found(entry_id))?;
            entries.remove(position);
            entries.push(replacement.clone());
            Ok(())
        })?;

        tracing::debug!("Replaced questionnaire {} with {}", entry_id, replacement.id);
        Ok(())
    }

    fn clear_questionnaires(&self) -> Result<(), StorageError> {
        let conn = self.conn()?;
        Self::remove_value(&conn, QUESTIONNAIRES_KEY)
    }
}

impl PatientStorage for SqliteStorage {
    fn load_patient(&self) -> Result<PatientProfile, StorageError> {
        let conn = self.conn()?;
        Ok(Self::read_value(&conn, PATIENT_KEY)?.unwrap_or_default())
    }

    fn save_patient(&self, profile: &PatientProfile) -> Result<(), StorageError> {
        let conn = self.conn()?;
        Self::write_value(&conn, PATIENT_KEY, profile)?;
        tracing::debug!("Saved patient profile");
        Ok(())
    }

    fn clear_patient(&self) -> Result<(), StorageError> {
        let conn = self.conn()?;
        Self::remove_value(&conn, PATIENT_KEY)
    }
}
