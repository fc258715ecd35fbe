/// Patient profile kept on the device and mirrored as remote metadata

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use chrono::NaiveDate;

use crate::domain::DomainError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientProfile {
    pub first_name: String,
    pub last_name: String,
    pub birth_date: Option<NaiveDate>,
}

impl PatientProfile {
    /// Create a profile, trimming names and rejecting future birth dates
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        birth_date: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Result<Self, DomainError> {
        let first_name = first_name.into().trim().to_string();
        let last_name = last_name.into().trim().to_string();

        if first_name.len() > 100 || last_name.len() > 100 {
            return Err(DomainError::Validation {
                message: "Names cannot be longer than 100 characters".to_string(),
            });
        }
        if let Some(born) = birth_date {
            if born > today {
                return Err(DomainError::InvalidDate(
                    "Birth date cannot be in the future".to_string(),
                ));
            }
        }

        Ok(Self { first_name, last_name, birth_date })
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }

    /// Nothing has been entered yet
    pub fn is_empty(&self) -> bool {
        self.first_name.is_empty() && self.last_name.is_empty() && self.birth_date.is_none()
    }

    /// Metadata document merged into `patients/{user}/meta/meta`
    pub fn to_document(&self) -> Value {
        json!({
            "firstName": self.first_name,
            "lastName": self.last_name,
            "birthDate": self.birth_date.map(|d| d.format("%Y-%m-%d").to_string()),
        })
    }
}
