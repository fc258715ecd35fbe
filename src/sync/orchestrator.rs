/// Full sync: patient metadata, questionnaires, then every metric in order
///
/// Steps never overlap. Metrics are uploaded one at a time so only one
/// metric's progress is ever on screen and only one query runs at once.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::aggregation::Calendar;
use crate::domain::{DayKey, MetricType, UserId};
use crate::health::{default_adapters, HealthSource};
use crate::remote::DocumentStore;
use crate::storage::LocalStore;
use crate::sync::questionnaires::{upload_patient_metadata, upload_questionnaires};
use crate::sync::run::SyncRun;
use crate::sync::uploader::{MetricUploader, UploadTarget};
use crate::sync::watermark::WatermarkStore;

/// Supplies the signed-in user, if any
pub trait IdentityProvider: Send + Sync {
    fn current_user(&self) -> Option<UserId>;
}

/// Identity fixed at startup (from configuration or the command line)
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity(Option<UserId>);

impl StaticIdentity {
    pub fn new(user: Option<UserId>) -> Self {
        Self(user)
    }

    pub fn signed_out() -> Self {
        Self(None)
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user(&self) -> Option<UserId> {
        self.0.clone()
    }
}

/// Tunables of a sync
#[derive(Debug, Clone, Copy)]
pub struct SyncSettings {
    /// Oldest day fetched, counted back from today
    pub max_days_back: u32,
    /// Per-metric bound on concurrently dispatched writes
    pub max_concurrent_writes: usize,
    pub calendar: Calendar,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            max_days_back: 7,
            max_concurrent_writes: 8,
            calendar: Calendar::local(),
        }
    }
}

/// Result of a full sync
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub questionnaires_sent: usize,
    pub health_records_sent: usize,
    pub per_metric: BTreeMap<MetricType, usize>,
    /// No user was signed in for the health data step
    pub no_user: bool,
    pub cancelled: bool,
}

impl fmt::Display for SyncSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.no_user {
            return write!(f, "Sent {} questionnaires. No health data sent.", self.questionnaires_sent);
        }
        if self.cancelled {
            f.write_str("Sync cancelled. ")?;
        }
        write!(
            f,
            "Sent {} questionnaires and {} health data records.",
            self.questionnaires_sent, self.health_records_sent
        )
    }
}

/// What is waiting to be synced and how far each metric has got
#[derive(Debug, Clone, Serialize)]
pub struct SyncStatus {
    pub user: Option<String>,
    pub pending_questionnaires: usize,
    pub watermarks: BTreeMap<MetricType, Option<DayKey>>,
}

pub struct SyncOrchestrator {
    identity: Arc<dyn IdentityProvider>,
    local: Arc<dyn LocalStore>,
    documents: Arc<dyn DocumentStore>,
    watermarks: WatermarkStore,
    uploaders: Vec<MetricUploader>,
    settings: SyncSettings,
}

impl SyncOrchestrator {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        local: Arc<dyn LocalStore>,
        source: Arc<dyn HealthSource>,
        documents: Arc<dyn DocumentStore>,
        settings: SyncSettings,
    ) -> Self {
        let watermarks = WatermarkStore::new(documents.clone());
        let target = UploadTarget {
            source,
            documents: documents.clone(),
            watermarks: watermarks.clone(),
            calendar: settings.calendar,
            max_concurrent_writes: settings.max_concurrent_writes,
        };
        let uploaders = default_adapters()
            .into_iter()
            .map(|adapter| MetricUploader::new(adapter, target.clone()))
            .collect();

        Self {
            identity,
            local,
            documents,
            watermarks,
            uploaders,
            settings,
        }
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Run every sync step and report the outcome on the run's event channel
    pub async fn run_full_sync(&self, run: &SyncRun) -> SyncSummary {
        info!("Starting sync run at {}", run.started_at());
        let mut summary = SyncSummary::default();

        // Metadata and questionnaires need a user as well
        match self.identity.current_user() {
            Some(user) => {
                upload_patient_metadata(self.local.as_ref(), self.documents.as_ref(), &user, run)
                    .await;
                let report =
                    upload_questionnaires(self.local.as_ref(), self.documents.as_ref(), &user, run)
                        .await;
                summary.questionnaires_sent = report.sent;
            }
            None => run.log("No signed-in user; questionnaires stay on this device"),
        }

        let Some(user) = self.identity.current_user() else {
            summary.no_user = true;
            run.log("No signed-in user; skipping health data");
            return self.finish(run, summary);
        };

        let today = self.settings.calendar.today(run.started_at());
        for uploader in &self.uploaders {
            if run.is_cancelled() {
                run.log(format!("Sync cancelled before {}", uploader.metric().display_name()));
                break;
            }

            let start = self
                .watermarks
                .effective_start(uploader.metric(), &user, self.settings.max_days_back, today)
                .await;
            let report = uploader.upload_since(run, start, &user).await;
            summary.health_records_sent += report.uploaded;
            summary.per_metric.insert(report.metric, report.uploaded);
        }

        summary.cancelled = run.is_cancelled();
        self.finish(run, summary)
    }

    fn finish(&self, run: &SyncRun, summary: SyncSummary) -> SyncSummary {
        let text = summary.to_string();
        info!("{}", text);
        run.complete(&text);
        summary
    }

    /// Pending questionnaires and per-metric watermarks of the current user
    pub async fn status(&self) -> SyncStatus {
        let pending_questionnaires = self
            .local
            .load_questionnaires()
            .map(|entries| entries.len())
            .unwrap_or(0);
        let user = self.identity.current_user();

        let mut watermarks: BTreeMap<MetricType, Option<DayKey>> =
            MetricType::ALL.iter().map(|m| (*m, None)).collect();
        if let Some(user) = &user {
            match self.watermarks.all(user).await {
                Ok(stored) => {
                    for (metric, day) in stored {
                        watermarks.insert(metric, Some(day));
                    }
                }
                Err(e) => tracing::warn!("Could not read watermarks: {}", e),
            }
        }

        SyncStatus {
            user: user.map(|u| u.to_string()),
            pending_questionnaires,
            watermarks,
        }
    }
}
