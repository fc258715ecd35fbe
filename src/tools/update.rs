/// Tools for editing and deleting stored questionnaires
///
/// This module implements the questionnaire_update and questionnaire_delete
/// MCP tools. Only entries that have not been uploaded yet can be changed.
/// An edit replaces the entry with a new one carrying a fresh id and
/// timestamp.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::domain::{default_schema, EntryId, QuestionnaireEntry};
use crate::storage::QuestionnaireStorage;
use crate::tools::ToolError;

/// Parameters for editing a questionnaire
#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateQuestionnaireParams {
    /// ID of the stored entry
    pub entry_id: String,
    /// The complete new set of answers
    pub answers: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct UpdateQuestionnaireResponse {
    pub entry_id: String,
    pub message: String,
}

/// Parameters for deleting a questionnaire
#[derive(Debug, Deserialize, JsonSchema)]
pub struct DeleteQuestionnaireParams {
    /// ID of the stored entry
    pub entry_id: String,
}

#[derive(Debug, Serialize)]
pub struct DeleteQuestionnaireResponse {
    pub message: String,
}

pub fn update_questionnaire<S: QuestionnaireStorage + ?Sized>(
    storage: &S,
    params: UpdateQuestionnaireParams,
) -> Result<UpdateQuestionnaireResponse, ToolError> {
    let entry_id = parse_entry_id(&params.entry_id)?;

    // Validate before touching the stored list
    let replacement = QuestionnaireEntry::from_raw(&default_schema(), &params.answers)?;
    storage.replace_questionnaire(&entry_id, &replacement)?;

    Ok(UpdateQuestionnaireResponse {
        entry_id: replacement.id.to_string(),
        message: format!(
            "Questionnaire {} updated.\nNew entry ID: {}",
            entry_id, replacement.id
        ),
    })
}

pub fn delete_questionnaire<S: QuestionnaireStorage + ?Sized>(
    storage: &S,
    params: DeleteQuestionnaireParams,
) -> Result<DeleteQuestionnaireResponse, ToolError> {
    let entry_id = parse_entry_id(&params.entry_id)?;
    storage.delete_questionnaire(&entry_id)?;

    Ok(DeleteQuestionnaireResponse {
        message: format!("Questionnaire {} deleted.", entry_id),
    })
}

fn parse_entry_id(raw: &str) -> Result<EntryId, ToolError> {
    EntryId::from_string(raw.trim()).map_err(|_| ToolError::InvalidEntryId(raw.to_string()))
}
