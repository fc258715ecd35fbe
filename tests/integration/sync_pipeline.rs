/// End-to-end sync scenarios against the in-memory test doubles
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::Value;
use tokio::sync::mpsc::UnboundedReceiver;

use pulmo_sync::aggregation::Calendar;
use pulmo_sync::health::MockHealthSource;
use pulmo_sync::remote::{DocumentStore, MemoryDocumentStore, RemoteError, WriteMode};
use pulmo_sync::sync::{StaticIdentity, SyncSettings};
use pulmo_sync::*;

fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 7, day, hour, 0, 0).unwrap()
}

fn sample(metric: MetricType, day: u32, hour: u32, value: f64) -> RawSample {
    RawSample::quantity(metric, value, at(day, hour), at(day, hour), "Watch")
}

fn user() -> UserId {
    UserId::new("u1").unwrap()
}

fn settings(max_concurrent_writes: usize) -> SyncSettings {
    SyncSettings {
        max_days_back: 7,
        max_concurrent_writes,
        calendar: Calendar::utc(),
    }
}

fn questionnaire() -> QuestionnaireEntry {
    let raw: std::collections::BTreeMap<String, String> = [
        ("meds", "Yes"),
        ("therapy", "Yes"),
        ("inhaler", "Yes"),
        ("feel", "2"),
        ("sleep", "2"),
        ("breath", "Moderate"),
        ("cough", "Yes"),
        ("digestion", "Mild"),
        ("appetite", "2"),
        ("infectionSigns", "Fever,Chest pain"),
        ("exercise", "No"),
        ("hydration", "Not sure"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    QuestionnaireEntry::from_raw(&default_schema(), &raw).unwrap()
}

fn orchestrator(
    identity: StaticIdentity,
    local: Arc<SqliteStorage>,
    source: Arc<MockHealthSource>,
    documents: Arc<dyn DocumentStore>,
    max_concurrent_writes: usize,
) -> SyncOrchestrator {
    SyncOrchestrator::new(
        Arc::new(identity),
        local,
        source,
        documents,
        settings(max_concurrent_writes),
    )
}

/// Run started at noon on the given July day
fn run_on(day: u32, cancel: CancelFlag) -> (SyncRun, UnboundedReceiver<SyncEvent>) {
    SyncRun::starting_at(at(day, 12), cancel)
}

fn drain(events: &mut UnboundedReceiver<SyncEvent>) -> Vec<SyncEvent> {
    let mut all = Vec::new();
    while let Ok(event) = events.try_recv() {
        all.push(event);
    }
    all
}

/// Document store that sets the cancel flag once a number of daily health
/// documents have been written
struct CancelAfterWrites {
    inner: MemoryDocumentStore,
    cancel: CancelFlag,
    after: usize,
    health_writes: AtomicUsize,
}

#[async_trait]
impl DocumentStore for CancelAfterWrites {
    async fn set(&self, path: &str, data: Value, mode: WriteMode) -> Result<(), RemoteError> {
        self.inner.set(path, data, mode).await?;
        if path.contains("/healthData/") {
            let written = self.health_writes.fetch_add(1, Ordering::SeqCst) + 1;
            if written >= self.after {
                self.cancel.cancel();
            }
        }
        Ok(())
    }

    async fn add(&self, collection: &str, data: Value) -> Result<String, RemoteError> {
        self.inner.add(collection, data).await
    }

    async fn get(&self, path: &str) -> Result<Option<Value>, RemoteError> {
        self.inner.get(path).await
    }
}

#[tokio::test]
async fn test_full_sync_uploads_everything_in_order() {
    let local = Arc::new(SqliteStorage::in_memory().unwrap());
    local.save_questionnaire(&questionnaire()).unwrap();
    let today = NaiveDate::from_ymd_opt(2025, 7, 5).unwrap();
    local
        .save_patient(&PatientProfile::new("Grace", "Hopper", None, today).unwrap())
        .unwrap();

    let source = Arc::new(MockHealthSource::with_samples(vec![
        sample(MetricType::HeartRate, 1, 8, 72.0),
        sample(MetricType::HeartRate, 1, 9, 80.0),
        sample(MetricType::Steps, 2, 10, 1200.0),
        sample(MetricType::Steps, 3, 10, 800.0),
        sample(MetricType::BodyWeight, 3, 7, 70.56),
    ]));
    let docs = Arc::new(MemoryDocumentStore::new());
    let sync = orchestrator(StaticIdentity::new(Some(user())), local.clone(), source, docs.clone(), 8);
    let (run, mut events) = run_on(5, CancelFlag::new());

    let summary = sync.run_full_sync(&run).await;

    assert_eq!(summary.questionnaires_sent, 1);
    assert_eq!(summary.health_records_sent, 4);
    assert_eq!(summary.per_metric[&MetricType::HeartRate], 1);
    assert_eq!(summary.per_metric[&MetricType::Steps], 2);
    assert_eq!(summary.per_metric[&MetricType::BodyWeight], 1);
    assert_eq!(summary.per_metric[&MetricType::Sleep], 0);
    assert!(!summary.cancelled);
    assert_eq!(summary.to_string(), "Sent 1 questionnaires and 4 health data records.");

    // Questionnaire moved from the device to the remote collection
    assert!(local.load_questionnaires().unwrap().is_empty());
    let remote_entries = docs.paths_under("patients/u1/questionnaires");
    assert_eq!(remote_entries.len(), 1);
    let remote = docs.document(&remote_entries[0]).unwrap();
    assert_eq!(remote["answers"]["breath"], "Moderate");
    assert_eq!(remote["answers"]["cough"], "Yes");
    assert_eq!(
        remote["answers"]["infectionSigns"],
        serde_json::json!(["Chest pain", "Fever"])
    );

    let meta = docs.document("patients/u1/meta/meta").unwrap();
    assert_eq!(meta["lastName"], "Hopper");

    let heart = docs
        .document("patients/u1/healthData/heartRate/daily/2025-07-01")
        .unwrap();
    assert_eq!(heart["bpmAvg"], 76.0);
    assert_eq!(heart["bpmMin"], 72.0);
    assert_eq!(heart["bpmMax"], 80.0);
    let weight = docs
        .document("patients/u1/healthData/bodyWeight/daily/2025-07-03")
        .unwrap();
    assert_eq!(weight["kg"], 70.6);

    let tracking = docs.document("patients/u1/meta/uploadTracking").unwrap();
    assert_eq!(tracking["heartRate"], "2025-07-01");
    assert_eq!(tracking["steps"], "2025-07-03");
    assert_eq!(tracking["bodyWeight"], "2025-07-03");
    assert!(tracking.get("sleep").is_none());

    // The completion event is delivered last
    let all = drain(&mut events);
    assert_eq!(
        all.last(),
        Some(&SyncEvent::Completed(summary.to_string()))
    );
    assert_eq!(run.total_uploaded(), 4);
}

#[tokio::test]
async fn test_metrics_are_logged_in_fixed_order() {
    let local = Arc::new(SqliteStorage::in_memory().unwrap());
    let source = Arc::new(MockHealthSource::new());
    let docs = Arc::new(MemoryDocumentStore::new());
    let sync = orchestrator(StaticIdentity::new(Some(user())), local, source, docs, 8);
    let (run, _events) = run_on(5, CancelFlag::new());

    sync.run_full_sync(&run).await;

    let lines = run.log_lines();
    let position = |metric: MetricType| {
        let prefix = format!("{}: no samples", metric.display_name());
        lines.iter().position(|l| l == &prefix).unwrap()
    };
    let order: Vec<usize> = MetricType::ALL.iter().map(|m| position(*m)).collect();
    assert!(order.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test]
async fn test_without_user_only_reports_questionnaires() {
    let local = Arc::new(SqliteStorage::in_memory().unwrap());
    local.save_questionnaire(&questionnaire()).unwrap();
    let source = Arc::new(MockHealthSource::with_samples(vec![sample(
        MetricType::Steps,
        2,
        10,
        1000.0,
    )]));
    let docs = Arc::new(MemoryDocumentStore::new());
    let sync = orchestrator(StaticIdentity::signed_out(), local.clone(), source.clone(), docs.clone(), 8);
    let (run, mut events) = run_on(5, CancelFlag::new());

    let summary = sync.run_full_sync(&run).await;

    assert!(summary.no_user);
    assert_eq!(summary.to_string(), "Sent 0 questionnaires. No health data sent.");
    assert_eq!(source.query_count(), 0);
    assert!(docs.is_empty());
    assert_eq!(local.load_questionnaires().unwrap().len(), 1);
    assert_eq!(
        drain(&mut events).last(),
        Some(&SyncEvent::Completed("Sent 0 questionnaires. No health data sent.".to_string()))
    );
}

#[tokio::test]
async fn test_cancel_during_upload_stops_new_writes() {
    let local = Arc::new(SqliteStorage::in_memory().unwrap());
    let source = Arc::new(MockHealthSource::with_samples(
        (1..=5).map(|d| sample(MetricType::Steps, d, 10, 100.0)).collect(),
    ));
    source.add_samples(vec![sample(MetricType::Activity, 1, 10, 250.0)]);

    let cancel = CancelFlag::new();
    let docs = Arc::new(CancelAfterWrites {
        inner: MemoryDocumentStore::new(),
        cancel: cancel.clone(),
        after: 2,
        health_writes: AtomicUsize::new(0),
    });
    let sync = orchestrator(StaticIdentity::new(Some(user())), local, source, docs.clone(), 1);
    let (run, _events) = run_on(6, cancel);

    let summary = sync.run_full_sync(&run).await;

    assert!(summary.cancelled);
    assert_eq!(summary.health_records_sent, 2);
    assert_eq!(
        summary.to_string(),
        "Sync cancelled. Sent 0 questionnaires and 2 health data records."
    );
    assert_eq!(docs.inner.paths_under("patients/u1/healthData/steps").len(), 2);
    // Later metrics are never started
    assert!(docs.inner.paths_under("patients/u1/healthData/activity").is_empty());
    // The watermark reflects what was written
    assert_eq!(
        docs.inner.document("patients/u1/meta/uploadTracking").unwrap()["steps"],
        "2025-07-02"
    );
}

#[tokio::test]
async fn test_cancelled_before_start_writes_no_health_data() {
    let local = Arc::new(SqliteStorage::in_memory().unwrap());
    let source = Arc::new(MockHealthSource::with_samples(vec![sample(
        MetricType::HeartRate,
        1,
        8,
        70.0,
    )]));
    let docs = Arc::new(MemoryDocumentStore::new());
    let sync = orchestrator(StaticIdentity::new(Some(user())), local, source.clone(), docs.clone(), 8);
    let cancel = CancelFlag::new();
    cancel.cancel();
    let (run, _events) = run_on(5, cancel);

    let summary = sync.run_full_sync(&run).await;

    assert!(summary.cancelled);
    assert_eq!(summary.health_records_sent, 0);
    assert_eq!(source.query_count(), 0);
    assert!(docs.paths_under("patients/u1/healthData").is_empty());
}

#[tokio::test]
async fn test_failed_questionnaire_stays_on_device() {
    let local = Arc::new(SqliteStorage::in_memory().unwrap());
    let entry = questionnaire();
    local.save_questionnaire(&entry).unwrap();
    let source = Arc::new(MockHealthSource::new());
    let docs = Arc::new(MemoryDocumentStore::new());
    docs.fail_path("patients/u1/questionnaires");
    let sync = orchestrator(StaticIdentity::new(Some(user())), local.clone(), source, docs, 8);
    let (run, _events) = run_on(5, CancelFlag::new());

    let summary = sync.run_full_sync(&run).await;

    assert_eq!(summary.questionnaires_sent, 0);
    assert_eq!(local.load_questionnaires().unwrap(), vec![entry]);
    assert!(run
        .log_lines()
        .iter()
        .any(|l| l.starts_with("Failed to upload questionnaire")));
}

#[tokio::test]
async fn test_denied_and_failing_metrics_do_not_stop_the_sync() {
    let local = Arc::new(SqliteStorage::in_memory().unwrap());
    let source = Arc::new(MockHealthSource::with_samples(vec![
        sample(MetricType::HeartRate, 1, 8, 70.0),
        sample(MetricType::OxygenSaturation, 1, 8, 0.97),
        sample(MetricType::Steps, 1, 8, 500.0),
    ]));
    source.deny(MetricType::HeartRate);
    source.fail_queries(MetricType::OxygenSaturation);
    let docs = Arc::new(MemoryDocumentStore::new());
    let sync = orchestrator(StaticIdentity::new(Some(user())), local, source, docs.clone(), 8);
    let (run, _events) = run_on(5, CancelFlag::new());

    let summary = sync.run_full_sync(&run).await;

    assert_eq!(summary.health_records_sent, 1);
    assert!(docs.document("patients/u1/healthData/steps/daily/2025-07-01").is_some());
    let lines = run.log_lines();
    assert!(lines.iter().any(|l| l.contains("read access not granted")));
    assert!(lines.iter().any(|l| l.contains("query failed")));
}

#[tokio::test]
async fn test_next_sync_resumes_from_watermark() {
    let local = Arc::new(SqliteStorage::in_memory().unwrap());
    let source = Arc::new(MockHealthSource::with_samples(vec![
        sample(MetricType::Steps, 2, 10, 100.0),
        sample(MetricType::Steps, 3, 10, 100.0),
    ]));
    let docs = Arc::new(MemoryDocumentStore::new());
    let sync = orchestrator(StaticIdentity::new(Some(user())), local, source.clone(), docs.clone(), 8);

    let (first, _events) = run_on(4, CancelFlag::new());
    assert_eq!(sync.run_full_sync(&first).await.health_records_sent, 2);

    // More steps arrive on the watermark day and later
    source.add_samples(vec![
        sample(MetricType::Steps, 3, 18, 50.0),
        sample(MetricType::Steps, 5, 10, 300.0),
    ]);
    let (second, _events) = run_on(6, CancelFlag::new());
    let summary = sync.run_full_sync(&second).await;

    // The watermark day is sent again with its complete total; older days are not
    assert_eq!(summary.per_metric[&MetricType::Steps], 2);
    assert_eq!(
        docs.document("patients/u1/healthData/steps/daily/2025-07-03").unwrap()["steps"],
        150
    );
    assert_eq!(
        docs.document("patients/u1/meta/uploadTracking").unwrap()["steps"],
        "2025-07-05"
    );

    let status = sync.status().await;
    assert_eq!(status.user.as_deref(), Some("u1"));
    assert_eq!(
        status.watermarks[&MetricType::Steps],
        Some(DayKey::parse("2025-07-05").unwrap())
    );
    assert_eq!(status.watermarks[&MetricType::Sleep], None);
}
