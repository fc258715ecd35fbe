/// Tool describing the daily questionnaire
///
/// This module implements the questionnaire_schema MCP tool.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::domain::{default_schema, QuestionField, QuestionType};

/// The schema tool takes no arguments
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct SchemaParams {}

#[derive(Debug, Serialize)]
pub struct SchemaResponse {
    pub questions: Vec<QuestionField>,
    pub message: String,
}

/// List every question with the answers it accepts
pub fn questionnaire_schema(_params: SchemaParams) -> SchemaResponse {
    let questions = default_schema();

    let lines: Vec<String> = questions
        .iter()
        .map(|q| format!("- {} ({}): {}", q.id, accepted_answers(&q.question_type), q.label))
        .collect();
    let message = format!(
        "Daily questionnaire ({} questions, all required)\n{}",
        questions.len(),
        lines.join("\n")
    );

    SchemaResponse { questions, message }
}

fn accepted_answers(question_type: &QuestionType) -> String {
    match question_type {
        QuestionType::YesNo => "Yes/No".to_string(),
        QuestionType::Rating1To5 => "1-5".to_string(),
        QuestionType::MultipleChoice { options } => format!("one of {}", options.join(" | ")),
        QuestionType::MultiSelect { options } => {
            format!("comma-separated, any of {}", options.join(" | "))
        }
    }
}
