/// Tool for editing the patient profile
///
/// This module implements the patient_update MCP tool. The profile is
/// uploaded as patient metadata on the next sync.

use chrono::{NaiveDate, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::domain::{DomainError, PatientProfile};
use crate::storage::PatientStorage;
use crate::tools::ToolError;

/// Parameters for updating the patient profile
///
/// Omitted fields keep their stored value.
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct UpdatePatientParams {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Birth date as YYYY-MM-DD
    pub birth_date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UpdatePatientResponse {
    pub profile: PatientProfile,
    pub message: String,
}

pub fn update_patient<S: PatientStorage + ?Sized>(
    storage: &S,
    params: UpdatePatientParams,
) -> Result<UpdatePatientResponse, ToolError> {
    let current = storage.load_patient()?;

    let birth_date = match params.birth_date.as_deref().map(str::trim) {
        Some(raw) => Some(NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
            DomainError::InvalidDate(format!("'{}' is not a YYYY-MM-DD date", raw))
        })?),
        None => current.birth_date,
    };

    let profile = PatientProfile::new(
        params.first_name.unwrap_or(current.first_name),
        params.last_name.unwrap_or(current.last_name),
        birth_date,
        Utc::now().date_naive(),
    )?;
    storage.save_patient(&profile)?;

    let message = match profile.birth_date {
        Some(born) => format!("Saved profile for {} (born {})", profile.full_name(), born),
        None => format!("Saved profile for {}", profile.full_name()),
    };

    Ok(UpdatePatientResponse { profile, message })
}
