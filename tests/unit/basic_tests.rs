/// Basic unit tests to verify core functionality
use chrono::NaiveDate;
use pulmo_sync::aggregation::{reduce, Calendar};
use pulmo_sync::health::adapter_for;
use pulmo_sync::*;
use tempfile::NamedTempFile;

#[cfg(test)]
mod basic_unit_tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_questionnaire_entry_creation() {
        let mut raw = std::collections::BTreeMap::new();
        for question in default_schema() {
            let answer = match question.question_type {
                QuestionType::YesNo => "No".to_string(),
                QuestionType::Rating1To5 => "5".to_string(),
                QuestionType::MultipleChoice { options } => options[0].clone(),
                QuestionType::MultiSelect { .. } => String::new(),
            };
            raw.insert(question.id, answer);
        }

        let entry = QuestionnaireEntry::from_raw(&default_schema(), &raw);
        assert!(entry.is_ok());
        let entry = entry.unwrap();
        assert_eq!(entry.answers.len(), 12);
        assert_eq!(entry.answers["infectionSigns"], Answer::MultiSelect(vec![]));
    }

    #[test]
    fn test_day_key_and_user_id() {
        let day = DayKey::parse("2025-02-28").unwrap();
        assert_eq!(day.date(), NaiveDate::from_ymd_opt(2025, 2, 28).unwrap());
        assert!(DayKey::parse("28.02.2025").is_err());

        assert!(UserId::new("patient-1").is_ok());
        assert!(UserId::new("").is_err());
    }

    #[test]
    fn test_calendar_offset_moves_day_boundary() {
        let late_evening = Utc.with_ymd_and_hms(2025, 7, 1, 23, 30, 0).unwrap();
        let berlin = Calendar::from_offset_minutes(120).unwrap();

        assert_eq!(Calendar::utc().day_of(late_evening).to_string(), "2025-07-01");
        assert_eq!(berlin.day_of(late_evening).to_string(), "2025-07-02");
        assert_eq!(
            berlin.start_of_day(DayKey::parse("2025-07-02").unwrap()),
            Utc.with_ymd_and_hms(2025, 7, 1, 22, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_reduce_steps_by_day() {
        let sample = |day: u32, value: f64| {
            let t = Utc.with_ymd_and_hms(2025, 7, day, 9, 0, 0).unwrap();
            RawSample::quantity(MetricType::Steps, value, t, t, "Phone")
        };
        let samples = vec![sample(1, 300.0), sample(1, 200.5), sample(3, 40.0)];

        let reduction = reduce(adapter_for(MetricType::Steps).as_ref(), &samples, &Calendar::utc(), || false);

        assert!(!reduction.interrupted);
        assert_eq!(reduction.days.len(), 2);
        let first = &reduction.days[&DayKey::parse("2025-07-01").unwrap()];
        assert_eq!(first.statistic, DailyStatistic::Steps { steps: 500 });
    }

    #[test]
    fn test_storage_creation() {
        let temp_file = NamedTempFile::new().expect("Failed to create temp file");
        let storage = SqliteStorage::new(temp_file.path().to_path_buf());
        assert!(storage.is_ok());

        let storage = storage.unwrap();
        let _: &dyn LocalStore = &storage;
        assert!(storage.load_patient().unwrap().is_empty());
    }

    #[test]
    fn test_summary_strings() {
        let summary = SyncSummary {
            questionnaires_sent: 1,
            health_records_sent: 12,
            ..Default::default()
        };
        assert_eq!(summary.to_string(), "Sent 1 questionnaires and 12 health data records.");
    }
}
