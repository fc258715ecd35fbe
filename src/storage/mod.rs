/// Storage layer for data kept on the device
///
/// Questionnaire entries wait here until they have been uploaded, and the
/// patient profile lives here permanently. Both are stored as JSON values
/// under fixed keys of a small key-value table in SQLite.

pub mod sqlite;
pub mod migrations;

// Re-export the main storage types
pub use sqlite::*;

use thiserror::Error;
use crate::domain::{EntryId, PatientProfile, QuestionnaireEntry};

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Database query error: {0}")]
    Query(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Questionnaire not found: {entry_id}")]
    QuestionnaireNotFound { entry_id: String },

    #[error("Migration error: {0}")]
    Migration(String),
}

/// Local persistence of submitted questionnaires
pub trait QuestionnaireStorage: Send + Sync {
    /// Append a new entry
    fn save_questionnaire(&self, entry: &QuestionnaireEntry) -> Result<(), StorageError>;

    /// All stored entries, oldest first
    fn load_questionnaires(&self) -> Result<Vec<QuestionnaireEntry>, StorageError>;

    /// Get an entry by ID
    fn get_questionnaire(&self, entry_id: &EntryId) -> Result<QuestionnaireEntry, StorageError>;

    /// Remove an entry
    fn delete_questionnaire(&self, entry_id: &EntryId) -> Result<(), StorageError>;

    /// Edit an entry: the old one is removed and `replacement` is stored instead
    fn replace_questionnaire(
        &self,
        entry_id: &EntryId,
        replacement: &QuestionnaireEntry,
    ) -> Result<(), StorageError>;

    /// Remove every entry
    fn clear_questionnaires(&self) -> Result<(), StorageError>;
}

/// Local persistence of the patient profile
pub trait PatientStorage: Send + Sync {
    /// The stored profile, or an empty one
    fn load_patient(&self) -> Result<PatientProfile, StorageError>;

    fn save_patient(&self, profile: &PatientProfile) -> Result<(), StorageError>;

    fn clear_patient(&self) -> Result<(), StorageError>;
}

/// Everything the sync pipeline reads from the device
pub trait LocalStore: QuestionnaireStorage + PatientStorage {}

impl<T: QuestionnaireStorage + PatientStorage> LocalStore for T {}
