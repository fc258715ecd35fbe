/// Basic integration tests: building the app from configuration and syncing
/// into the local document store
use chrono::{Duration, SecondsFormat, Utc};
use pulmo_sync::aggregation::Calendar;
use pulmo_sync::remote::{paths, DocumentStore, SqliteDocumentStore};
use pulmo_sync::*;
use tempfile::TempDir;

#[cfg(test)]
mod basic_integration_tests {
    use super::*;

    fn answers() -> std::collections::BTreeMap<String, String> {
        [
            ("meds", "Yes"),
            ("therapy", "No"),
            ("inhaler", "Yes"),
            ("feel", "4"),
            ("sleep", "3"),
            ("breath", "None"),
            ("cough", "Not sure"),
            ("digestion", "No"),
            ("appetite", "5"),
            ("infectionSigns", "None of the above"),
            ("exercise", "Yes"),
            ("hydration", "Yes"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[tokio::test]
    async fn test_app_creation_with_defaults() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let app = PulmoSyncApp::new(temp_dir.path().join("pulmo.db"), &Config::default())
            .await
            .expect("Failed to create app");

        assert!(app.storage().load_questionnaires().unwrap().is_empty());
        assert!(!app.cancel_flag().is_cancelled());
    }

    #[tokio::test]
    async fn test_database_persistence() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("pulmo.db");

        let first = PulmoSyncApp::new(db_path.clone(), &Config::default())
            .await
            .expect("Failed to create first app");
        let entry = QuestionnaireEntry::from_raw(&default_schema(), &answers()).unwrap();
        first.storage().save_questionnaire(&entry).unwrap();
        drop(first);

        let second = PulmoSyncApp::new(db_path, &Config::default())
            .await
            .expect("Failed to create second app");
        assert_eq!(second.storage().load_questionnaires().unwrap(), vec![entry]);
    }

    #[tokio::test]
    async fn test_missing_health_export_is_an_error() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config = Config {
            health_export: Some(temp_dir.path().join("missing.json")),
            ..Default::default()
        };

        let result = PulmoSyncApp::new(temp_dir.path().join("pulmo.db"), &config).await;
        assert!(matches!(result, Err(AppError::Source(_))));
    }

    #[tokio::test]
    async fn test_sync_from_export_into_local_documents() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("pulmo.db");
        let export_path = temp_dir.path().join("export.json");

        let measured = Utc::now() - Duration::days(2);
        let stamp = measured.to_rfc3339_opts(SecondsFormat::Secs, true);
        let export = format!(
            r#"{{
                "authorized": ["heartRate"],
                "samples": [
                    {{ "metric": "heartRate", "value": 60, "start": "{stamp}" }},
                    {{ "metric": "heartRate", "value": 70, "start": "{stamp}" }}
                ]
            }}"#
        );
        std::fs::write(&export_path, export).unwrap();

        let config = Config {
            user_id: Some("patient-7".to_string()),
            health_export: Some(export_path),
            utc_offset_minutes: Some(0),
            ..Default::default()
        };
        let app = PulmoSyncApp::new(db_path.clone(), &config).await.unwrap();
        let entry = QuestionnaireEntry::from_raw(&default_schema(), &answers()).unwrap();
        app.storage().save_questionnaire(&entry).unwrap();

        let (run, mut events) = app.begin_run();
        let summary = app.sync_once(run).await;

        assert_eq!(summary.to_string(), "Sent 1 questionnaires and 1 health data records.");
        assert!(app.storage().load_questionnaires().unwrap().is_empty());

        let mut completed = None;
        while let Ok(event) = events.try_recv() {
            if let SyncEvent::Completed(text) = event {
                completed = Some(text);
            }
        }
        assert_eq!(completed.as_deref(), Some(summary.to_string().as_str()));

        let user = UserId::new("patient-7").unwrap();
        let day = Calendar::utc().day_of(measured);
        let documents = SqliteDocumentStore::open(&db_path).unwrap();
        let stored = documents
            .get(&paths::daily_health_path(&user, MetricType::HeartRate, day))
            .await
            .unwrap()
            .expect("daily heart rate document");
        assert_eq!(stored["bpmAvg"], 65.0);
        assert_eq!(stored["type"], "heartRate");

        let questionnaires = documents
            .list_paths(&paths::questionnaires_collection(&user))
            .unwrap();
        assert_eq!(questionnaires.len(), 1);
    }

    #[test]
    fn test_config_file_round_trip() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("config.toml");

        let config = Config {
            max_days_back: 14,
            user_id: Some("patient-7".to_string()),
            ..Default::default()
        };
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.sync_settings().max_days_back, 14);
        assert_eq!(loaded.user().unwrap().as_str(), "patient-7");
    }
}
