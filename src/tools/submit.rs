/// Tool for submitting the daily questionnaire
///
/// This module implements the questionnaire_submit MCP tool. The entry is
/// only stored on the device; the next sync uploads it.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::domain::{default_schema, QuestionnaireEntry};
use crate::storage::QuestionnaireStorage;
use crate::tools::ToolError;

/// Parameters for submitting a questionnaire
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SubmitQuestionnaireParams {
    /// Answer per question id, e.g. {"feel": "4", "meds": "Yes"}.
    /// Multi-select answers are comma-separated.
    pub answers: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct SubmitQuestionnaireResponse {
    pub entry_id: String,
    pub message: String,
}

pub fn submit_questionnaire<S: QuestionnaireStorage + ?Sized>(
    storage: &S,
    params: SubmitQuestionnaireParams,
) -> Result<SubmitQuestionnaireResponse, ToolError> {
    let entry = QuestionnaireEntry::from_raw(&default_schema(), &params.answers)?;
    storage.save_questionnaire(&entry)?;

    tracing::info!("Stored questionnaire {}", entry.id);

    Ok(SubmitQuestionnaireResponse {
        entry_id: entry.id.to_string(),
        message: format!(
            "Questionnaire saved. It will be uploaded on the next sync.\nEntry ID: {}",
            entry.id
        ),
    })
}
