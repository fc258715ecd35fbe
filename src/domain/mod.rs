/// Domain module containing core data types
///
/// This module defines the entities the sync pipeline moves around (raw samples,
/// daily aggregates, questionnaire entries, the patient profile) and their
/// validation rules.

pub mod types;
pub mod sample;
pub mod aggregate;
pub mod questionnaire;
pub mod patient;

// Re-export public types for easy access
pub use types::*;
pub use sample::*;
pub use aggregate::*;
pub use questionnaire::*;
pub use patient::*;

use thiserror::Error;

/// Errors that can occur during domain operations
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Invalid value: {message}")]
    InvalidValue { message: String },
}
