/// Upload of one metric: fetch, aggregate, write per day, advance watermark
///
/// Cancellation is observed at entry, between samples while aggregating, and
/// before every write is dispatched. Writes already in flight always finish.
/// When aggregation itself was interrupted the completed days of that partial
/// grouping are still written.
///
/// The watermark never passes a day whose write failed, so that day is sent
/// again on the next run.

use std::sync::Arc;
use std::time::Instant;

use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;
use tracing::debug;

use crate::aggregation::{self, Calendar};
use crate::domain::{DayKey, MetricType, UserId};
use crate::health::{HealthSource, MetricAdapter};
use crate::remote::{paths, DocumentStore, RemoteError, WriteMode};
use crate::sync::run::SyncRun;
use crate::sync::watermark::WatermarkStore;

/// Outcome of one `upload_since` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReport {
    pub metric: MetricType,
    /// Day documents written successfully
    pub uploaded: usize,
    /// Day documents whose write was dispatched
    pub attempted: usize,
    pub failed: usize,
    /// The run was cancelled while this metric was active
    pub cancelled: bool,
    /// Latest day written successfully
    pub latest_day: Option<DayKey>,
    /// Earliest day whose write failed
    pub first_failed_day: Option<DayKey>,
    /// Day the watermark was advanced to, if any
    pub watermark_day: Option<DayKey>,
    pub log: Vec<String>,
}

impl UploadReport {
    fn new(metric: MetricType) -> Self {
        Self {
            metric,
            uploaded: 0,
            attempted: 0,
            failed: 0,
            cancelled: false,
            latest_day: None,
            first_failed_day: None,
            watermark_day: None,
            log: Vec::new(),
        }
    }
}

/// Everything an uploader needs besides its adapter
#[derive(Clone)]
pub struct UploadTarget {
    pub source: Arc<dyn HealthSource>,
    pub documents: Arc<dyn DocumentStore>,
    pub watermarks: WatermarkStore,
    pub calendar: Calendar,
    pub max_concurrent_writes: usize,
}

pub struct MetricUploader {
    adapter: Box<dyn MetricAdapter>,
    target: UploadTarget,
}

impl MetricUploader {
    pub fn new(adapter: Box<dyn MetricAdapter>, target: UploadTarget) -> Self {
        Self { adapter, target }
    }

    pub fn metric(&self) -> MetricType {
        self.adapter.metric()
    }

    fn note(run: &SyncRun, report: &mut UploadReport, line: String) {
        run.log(line.clone());
        report.log.push(line);
    }

    /// Upload every day from `start` up to the run's start time
    pub async fn upload_since(&self, run: &SyncRun, start: DayKey, user: &UserId) -> UploadReport {
        let metric = self.metric();
        let name = metric.display_name();
        let mut report = UploadReport::new(metric);

        if run.is_cancelled() {
            report.cancelled = true;
            Self::note(run, &mut report, format!("{}: sync cancelled, skipping", name));
            return report;
        }

        // Fetch
        let fetch_started = Instant::now();
        let window_start = self.target.calendar.start_of_day(start);
        let fetched = self
            .adapter
            .fetch(self.target.source.as_ref(), window_start, run.started_at())
            .await;
        if let Some(diagnostic) = fetched.diagnostic {
            Self::note(run, &mut report, diagnostic);
        }
        Self::note(
            run,
            &mut report,
            format!(
                "{}: fetched {} samples since {} in {} ms",
                name,
                fetched.samples.len(),
                start,
                fetch_started.elapsed().as_millis()
            ),
        );

        if fetched.samples.is_empty() {
            Self::note(run, &mut report, format!("{}: no samples", name));
            return report;
        }

        // Aggregate
        let reduction = aggregation::reduce(
            self.adapter.as_ref(),
            &fetched.samples,
            &self.target.calendar,
            || run.is_cancelled(),
        );
        if reduction.interrupted {
            report.cancelled = true;
            Self::note(
                run,
                &mut report,
                format!(
                    "{}: aggregation cancelled after {} of {} samples",
                    name,
                    reduction.samples_grouped,
                    fetched.samples.len()
                ),
            );
            if let Some(day) = reduction.dropped_day {
                Self::note(run, &mut report, format!("{}: left out incomplete day {}", name, day));
            }
        }
        if reduction.is_empty() {
            Self::note(run, &mut report, format!("{}: nothing to upload", name));
            return report;
        }

        // Upload
        let total = reduction.days.len();
        let documents: Vec<(DayKey, String, Value)> = reduction
            .days
            .values()
            .map(|aggregate| {
                let day_start = self.target.calendar.start_of_day(aggregate.day);
                (
                    aggregate.day,
                    paths::daily_health_path(user, metric, aggregate.day),
                    aggregate.to_document(day_start),
                )
            })
            .collect();

        // A partial grouping is written in full; otherwise a cancel stops new dispatches.
        let stop_on_cancel = !reduction.interrupted;
        let limit = self.target.max_concurrent_writes.max(1);
        let store = self.target.documents.as_ref();

        let mut pending = documents.into_iter();
        let mut in_flight = FuturesUnordered::new();
        let mut dispatching = true;
        let mut succeeded = Vec::new();

        loop {
            while dispatching && in_flight.len() < limit {
                if stop_on_cancel && run.is_cancelled() {
                    dispatching = false;
                    report.cancelled = true;
                    Self::note(
                        run,
                        &mut report,
                        format!("{}: sync cancelled, waiting for writes in flight", name),
                    );
                    break;
                }
                match pending.next() {
                    Some((day, path, doc)) => {
                        report.attempted += 1;
                        in_flight.push(async move {
                            let result = store.set(&path, doc, WriteMode::Overwrite).await;
                            (day, result)
                        });
                    }
                    None => dispatching = false,
                }
            }

            let Some((day, result)) = in_flight.next().await else {
                break;
            };
            if self.settle(run, &mut report, day, result) {
                succeeded.push(day);
            }
            run.progress(report.uploaded, total);
        }

        // Finalize
        report.watermark_day = watermark_day(&succeeded, report.first_failed_day);
        if let Some(latest) = report.watermark_day {
            if let Err(e) = self.target.watermarks.update(metric, user, latest).await {
                Self::note(
                    run,
                    &mut report,
                    format!("{}: could not save watermark {}: {}", name, latest, e),
                );
            }
        }

        run.record_uploaded(metric, report.uploaded);
        let uploaded = report.uploaded;
        Self::note(
            run,
            &mut report,
            format!("{}: uploaded {} of {} days", name, uploaded, total),
        );
        report
    }

    fn settle(
        &self,
        run: &SyncRun,
        report: &mut UploadReport,
        day: DayKey,
        result: Result<(), RemoteError>,
    ) -> bool {
        match result {
            Ok(()) => {
                debug!("{}: wrote {}", self.metric(), day);
                report.uploaded += 1;
                report.latest_day = report.latest_day.max(Some(day));
                true
            }
            Err(e) => {
                report.failed += 1;
                report.first_failed_day = Some(match report.first_failed_day {
                    Some(first) => first.min(day),
                    None => day,
                });
                Self::note(
                    run,
                    report,
                    format!("{}: failed to write {}: {}", self.metric().display_name(), day, e),
                );
                false
            }
        }
    }
}

/// Latest written day that lies before every failed day
fn watermark_day(succeeded: &[DayKey], first_failed: Option<DayKey>) -> Option<DayKey> {
    succeeded
        .iter()
        .copied()
        .filter(|day| first_failed.map_or(true, |failed| *day < failed))
        .max()
}
