/// Questionnaire schema, typed answers and submitted entries
///
/// A QuestionnaireEntry is created when the patient submits the daily form. It
/// lives in local storage until it has been written to the remote store.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use chrono::{DateTime, SecondsFormat, Utc};

use crate::domain::{DomainError, EntryId};

/// Kind of answer a question accepts, with its valid options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum QuestionType {
    YesNo,
    Rating1To5,
    MultipleChoice { options: Vec<String> },
    MultiSelect { options: Vec<String> },
}

/// One question of the form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionField {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
}

impl QuestionField {
    fn new(id: &str, label: &str, question_type: QuestionType) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            question_type,
        }
    }
}

fn options(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// The fixed daily questionnaire
pub fn default_schema() -> Vec<QuestionField> {
    use QuestionType::*;

    vec![
        QuestionField::new("meds", "Did you take your medication today?", YesNo),
        QuestionField::new("therapy", "Did you do your airway clearance therapy today?", YesNo),
        QuestionField::new("inhaler", "Did you use your inhaler or nebulizer today?", YesNo),
        QuestionField::new("feel", "How do you feel today?", Rating1To5),
        QuestionField::new("sleep", "How well did you sleep last night?", Rating1To5),
        QuestionField::new(
            "breath",
            "Did you experience shortness of breath today?",
            MultipleChoice { options: options(&["None", "Mild", "Moderate", "Severe"]) },
        ),
        QuestionField::new(
            "cough",
            "Did you cough more than usual today?",
            MultipleChoice { options: options(&["Yes", "No", "Not sure"]) },
        ),
        QuestionField::new(
            "digestion",
            "Did you have any digestive issues today?",
            MultipleChoice { options: options(&["No", "Mild", "Severe"]) },
        ),
        QuestionField::new("appetite", "How was your appetite today?", Rating1To5),
        QuestionField::new(
            "infectionSigns",
            "Did you notice any of the following?",
            MultiSelect {
                options: options(&[
                    "Fever",
                    "Increased mucus",
                    "Change in mucus color",
                    "Chest pain",
                    "None of the above",
                ]),
            },
        ),
        QuestionField::new("exercise", "Did you exercise today?", YesNo),
        QuestionField::new(
            "hydration",
            "Did you stay hydrated today?",
            MultipleChoice { options: options(&["Yes", "No", "Not sure"]) },
        ),
    ]
}

/// A typed answer to one question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum Answer {
    YesNo(bool),
    Rating(u8),
    Choice(String),
    MultiSelect(Vec<String>),
}

impl Answer {
    /// Parse the string form the form widgets produce
    ///
    /// Yes/no accepts "Yes"/"No" in any case, ratings accept "1".."5" and
    /// multi-select values are comma-joined.
    pub fn parse(question: &QuestionField, raw: &str) -> Result<Self, DomainError> {
        let raw = raw.trim();
        let answer = match &question.question_type {
            QuestionType::YesNo => match raw.to_ascii_lowercase().as_str() {
                "yes" | "true" => Answer::YesNo(true),
                "no" | "false" => Answer::YesNo(false),
                _ => return Err(invalid_answer(question, raw)),
            },
            QuestionType::Rating1To5 => raw
                .parse::<u8>()
                .map(Answer::Rating)
                .map_err(|_| invalid_answer(question, raw))?,
            QuestionType::MultipleChoice { .. } => Answer::Choice(raw.to_string()),
            QuestionType::MultiSelect { .. } => {
                let mut selected: Vec<String> = raw
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
                selected.sort();
                selected.dedup();
                Answer::MultiSelect(selected)
            }
        };

        answer.validate(question)?;
        Ok(answer)
    }

    /// Check that this answer fits the question's type and options
    pub fn validate(&self, question: &QuestionField) -> Result<(), DomainError> {
        match (&question.question_type, self) {
            (QuestionType::YesNo, Answer::YesNo(_)) => Ok(()),
            (QuestionType::Rating1To5, Answer::Rating(r)) => {
                if (1..=5).contains(r) {
                    Ok(())
                } else {
                    Err(DomainError::InvalidValue {
                        message: format!("Rating for '{}' must be between 1 and 5, got {}", question.id, r),
                    })
                }
            }
            (QuestionType::MultipleChoice { options }, Answer::Choice(choice)) => {
                if options.contains(choice) {
                    Ok(())
                } else {
                    Err(invalid_answer(question, choice))
                }
            }
            (QuestionType::MultiSelect { options }, Answer::MultiSelect(selected)) => {
                match selected.iter().find(|s| !options.contains(s)) {
                    Some(unknown) => Err(invalid_answer(question, unknown)),
                    None => Ok(()),
                }
            }
            _ => Err(DomainError::InvalidValue {
                message: format!("Answer type does not match question '{}'", question.id),
            }),
        }
    }

    /// Remote representation: ratings become integers, yes/no booleans,
    /// multi-select a list and single choices a string
    pub fn to_value(&self) -> Value {
        match self {
            Answer::YesNo(b) => Value::Bool(*b),
            Answer::Rating(r) => Value::from(*r),
            Answer::Choice(c) => Value::String(c.clone()),
            Answer::MultiSelect(values) => {
                Value::Array(values.iter().cloned().map(Value::String).collect())
            }
        }
    }
}

fn invalid_answer(question: &QuestionField, raw: &str) -> DomainError {
    DomainError::InvalidValue {
        message: format!("'{}' is not a valid answer for '{}'", raw, question.id),
    }
}

/// A submitted questionnaire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionnaireEntry {
    pub id: EntryId,
    pub timestamp: DateTime<Utc>,
    pub answers: BTreeMap<String, Answer>,
}

impl QuestionnaireEntry {
    /// Create a new entry, validated against the schema
    ///
    /// Every question must be answered, and no answers for unknown questions
    /// are accepted.
    pub fn new(
        schema: &[QuestionField],
        answers: BTreeMap<String, Answer>,
    ) -> Result<Self, DomainError> {
        Self::validate_answers(schema, &answers)?;

        Ok(Self {
            id: EntryId::new(),
            timestamp: Utc::now(),
            answers,
        })
    }

    /// Create an entry from the string answers a form produces
    pub fn from_raw(
        schema: &[QuestionField],
        raw: &BTreeMap<String, String>,
    ) -> Result<Self, DomainError> {
        let mut answers = BTreeMap::new();
        for question in schema {
            if let Some(value) = raw.get(&question.id) {
                answers.insert(question.id.clone(), Answer::parse(question, value)?);
            }
        }
        if let Some(unknown) = raw.keys().find(|k| !schema.iter().any(|q| &q.id == *k)) {
            return Err(DomainError::Validation {
                message: format!("Unknown question: {}", unknown),
            });
        }
        Self::new(schema, answers)
    }

    /// Create an entry from existing data (used when loading from storage)
    pub fn from_existing(
        id: EntryId,
        timestamp: DateTime<Utc>,
        answers: BTreeMap<String, Answer>,
    ) -> Self {
        Self { id, timestamp, answers }
    }

    /// Remote document body
    pub fn to_document(&self) -> Value {
        let answers: Map<String, Value> = self
            .answers
            .iter()
            .map(|(k, v)| (k.clone(), v.to_value()))
            .collect();

        serde_json::json!({
            "id": self.id.to_string(),
            "timestamp": self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            "answers": answers,
        })
    }

    fn validate_answers(
        schema: &[QuestionField],
        answers: &BTreeMap<String, Answer>,
    ) -> Result<(), DomainError> {
        for question in schema {
            match answers.get(&question.id) {
                Some(answer) => answer.validate(question)?,
                None => {
                    return Err(DomainError::Validation {
                        message: format!("Question '{}' has not been answered", question.id),
                    })
                }
            }
        }

        if let Some(unknown) = answers.keys().find(|k| !schema.iter().any(|q| &q.id == *k)) {
            return Err(DomainError::Validation {
                message: format!("Unknown question: {}", unknown),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_raw_answers() -> BTreeMap<String, String> {
        [
            ("meds", "Yes"),
            ("therapy", "No"),
            ("inhaler", "Yes"),
            ("feel", "3"),
            ("sleep", "4"),
            ("breath", "Mild"),
            ("cough", "Not sure"),
            ("digestion", "No"),
            ("appetite", "5"),
            ("infectionSigns", "Fever,Chest pain"),
            ("exercise", "no"),
            ("hydration", "Yes"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn test_schema_has_twelve_unique_questions() {
        let schema = default_schema();
        assert_eq!(schema.len(), 12);
        let mut ids: Vec<_> = schema.iter().map(|q| q.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 12);
    }

    #[test]
    fn test_raw_answers_become_typed_document_values() {
        let entry = QuestionnaireEntry::from_raw(&default_schema(), &complete_raw_answers()).unwrap();
        let doc = entry.to_document();

        assert_eq!(doc["answers"]["feel"], 3);
        assert_eq!(doc["answers"]["meds"], true);
        assert_eq!(doc["answers"]["exercise"], false);
        assert_eq!(doc["answers"]["breath"], "Mild");
        assert_eq!(
            doc["answers"]["infectionSigns"],
            serde_json::json!(["Chest pain", "Fever"])
        );
        assert_eq!(doc["id"], entry.id.to_string());
    }

    #[test]
    fn test_missing_answer_rejected() {
        let mut raw = complete_raw_answers();
        raw.remove("appetite");
        assert!(QuestionnaireEntry::from_raw(&default_schema(), &raw).is_err());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let schema = default_schema();
        let feel = schema.iter().find(|q| q.id == "feel").unwrap();
        assert!(Answer::parse(feel, "6").is_err());
        assert!(Answer::parse(feel, "great").is_err());

        let breath = schema.iter().find(|q| q.id == "breath").unwrap();
        assert!(Answer::parse(breath, "Terrible").is_err());

        let signs = schema.iter().find(|q| q.id == "infectionSigns").unwrap();
        assert!(Answer::parse(signs, "Fever,Headache").is_err());
        assert_eq!(
            Answer::parse(signs, "").unwrap(),
            Answer::MultiSelect(vec![])
        );
    }

    #[test]
    fn test_unknown_question_rejected() {
        let mut raw = complete_raw_answers();
        raw.insert("mood".to_string(), "Yes".to_string());
        assert!(QuestionnaireEntry::from_raw(&default_schema(), &raw).is_err());
    }

    #[test]
    fn test_mismatched_answer_type_rejected() {
        let schema = default_schema();
        let meds = schema.iter().find(|q| q.id == "meds").unwrap();
        assert!(Answer::Rating(3).validate(meds).is_err());
    }
}
