/// Tool for listing questionnaires waiting to be uploaded
///
/// This module implements the questionnaire_list MCP tool.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::storage::QuestionnaireStorage;
use crate::tools::ToolError;

/// Parameters for listing questionnaires
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct ListQuestionnairesParams {
    /// Only return the most recent entries
    pub limit: Option<usize>,
}

/// One stored entry, answers in their upload form
#[derive(Debug, Serialize)]
pub struct QuestionnaireSummary {
    pub entry_id: String,
    pub timestamp: String,
    pub answers: Value,
}

#[derive(Debug, Serialize)]
pub struct ListQuestionnairesResponse {
    pub entries: Vec<QuestionnaireSummary>,
    pub total: usize,
    pub message: String,
}

pub fn list_questionnaires<S: QuestionnaireStorage + ?Sized>(
    storage: &S,
    params: ListQuestionnairesParams,
) -> Result<ListQuestionnairesResponse, ToolError> {
    let mut entries = storage.load_questionnaires()?;
    let total = entries.len();

    // Newest first
    entries.reverse();
    if let Some(limit) = params.limit {
        entries.truncate(limit);
    }

    let summaries: Vec<QuestionnaireSummary> = entries
        .iter()
        .map(|entry| {
            let document = entry.to_document();
            QuestionnaireSummary {
                entry_id: entry.id.to_string(),
                timestamp: entry.timestamp.to_rfc3339(),
                answers: document["answers"].clone(),
            }
        })
        .collect();

    let message = if summaries.is_empty() {
        "No questionnaires waiting for upload.".to_string()
    } else {
        let lines: Vec<String> = summaries
            .iter()
            .map(|s| format!("- {} ({})\n  {}", s.entry_id, s.timestamp, s.answers))
            .collect();
        format!(
            "{} questionnaire(s) waiting for upload, showing {}:\n{}",
            total,
            summaries.len(),
            lines.join("\n")
        )
    };

    Ok(ListQuestionnairesResponse {
        entries: summaries,
        total,
        message,
    })
}
