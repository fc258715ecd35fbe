/// MCP tools for questionnaires, the patient profile and sync control
///
/// Each tool takes a params struct deserialized from the call arguments and
/// returns a response with a human-readable `message`. The params types derive
/// `JsonSchema` so the tool list can publish their input schemas.

pub mod schema;
pub mod submit;
pub mod list;
pub mod update;
pub mod patient;
pub mod status;

pub use schema::*;
pub use submit::*;
pub use list::*;
pub use update::*;
pub use patient::*;
pub use status::*;

use thiserror::Error;

use crate::domain::DomainError;
use crate::storage::StorageError;

/// Errors a tool call can end with
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("{0}")]
    Domain(#[from] DomainError),

    #[error("{0}")]
    Storage(#[from] StorageError),

    #[error("Invalid entry ID: {0}")]
    InvalidEntryId(String),
}

/// A full set of form answers, as a client would send them
#[cfg(test)]
pub(crate) fn complete_answers(feel: &str) -> std::collections::BTreeMap<String, String> {
    [
        ("meds", "Yes"),
        ("therapy", "Yes"),
        ("inhaler", "No"),
        ("feel", feel),
        ("sleep", "4"),
        ("breath", "Mild"),
        ("cough", "No"),
        ("digestion", "No"),
        ("appetite", "3"),
        ("infectionSigns", "Fever, Increased mucus"),
        ("exercise", "No"),
        ("hydration", "Yes"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}
