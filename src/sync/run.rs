/// Per-invocation sync context
///
/// A SyncRun is built for every sync, handed by reference to each uploader and
/// dropped when the run ends. It carries the cancel flag, the counters and the
/// event channel the UI listens on.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::info;

use crate::domain::MetricType;

/// Shared cancellation flag
///
/// Set from the UI at any time, read by the uploaders between samples and
/// before every write dispatch. Clearing it before the next run is the caller's
/// job.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Events delivered to the UI while a run progresses
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// Documents written so far out of the total for the active metric
    Progress { current: usize, total: usize },
    Log(String),
    Completed(String),
}

/// Counters and log of one sync run
pub struct SyncRun {
    started_at: DateTime<Utc>,
    cancel: CancelFlag,
    events: mpsc::UnboundedSender<SyncEvent>,
    per_metric: Mutex<BTreeMap<MetricType, usize>>,
    log_lines: Mutex<Vec<String>>,
}

impl SyncRun {
    /// Start a run now; the receiver is the single delivery path for events
    pub fn new(cancel: CancelFlag) -> (Self, mpsc::UnboundedReceiver<SyncEvent>) {
        Self::starting_at(Utc::now(), cancel)
    }

    /// Start a run with an explicit clock reading
    pub fn starting_at(
        started_at: DateTime<Utc>,
        cancel: CancelFlag,
    ) -> (Self, mpsc::UnboundedReceiver<SyncEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let run = Self {
            started_at,
            cancel,
            events,
            per_metric: Mutex::new(BTreeMap::new()),
            log_lines: Mutex::new(Vec::new()),
        };
        (run, receiver)
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Record a log line and forward it to the UI
    pub fn log(&self, line: impl Into<String>) {
        let line = line.into();
        info!(target: "pulmo_sync::run", "{}", line);
        if let Ok(mut lines) = self.log_lines.lock() {
            lines.push(line.clone());
        }
        // Nobody listening is fine: the run keeps its own copy of the log.
        let _ = self.events.send(SyncEvent::Log(line));
    }

    pub fn progress(&self, current: usize, total: usize) {
        let _ = self.events.send(SyncEvent::Progress { current, total });
    }

    pub fn complete(&self, summary: &str) {
        let _ = self.events.send(SyncEvent::Completed(summary.to_string()));
    }

    pub fn record_uploaded(&self, metric: MetricType, count: usize) {
        if let Ok(mut counts) = self.per_metric.lock() {
            *counts.entry(metric).or_insert(0) += count;
        }
    }

    pub fn per_metric_counts(&self) -> BTreeMap<MetricType, usize> {
        self.per_metric.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn total_uploaded(&self) -> usize {
        self.per_metric_counts().values().sum()
    }

    pub fn log_lines(&self) -> Vec<String> {
        self.log_lines.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_flag_shared_between_clones() {
        let flag = CancelFlag::new();
        let other = flag.clone();
        assert!(!other.is_cancelled());
        flag.cancel();
        assert!(other.is_cancelled());
        other.reset();
        assert!(!flag.is_cancelled());
    }

    #[test]
    fn test_events_arrive_in_order() {
        let (run, mut rx) = SyncRun::new(CancelFlag::new());
        run.log("first");
        run.progress(1, 2);
        run.complete("done");

        assert_eq!(rx.try_recv().unwrap(), SyncEvent::Log("first".to_string()));
        assert_eq!(rx.try_recv().unwrap(), SyncEvent::Progress { current: 1, total: 2 });
        assert_eq!(rx.try_recv().unwrap(), SyncEvent::Completed("done".to_string()));
        assert_eq!(run.log_lines(), vec!["first".to_string()]);
    }

    #[test]
    fn test_counts_accumulate_per_metric() {
        let (run, _rx) = SyncRun::new(CancelFlag::new());
        run.record_uploaded(MetricType::Steps, 3);
        run.record_uploaded(MetricType::Steps, 2);
        run.record_uploaded(MetricType::Sleep, 1);
        assert_eq!(run.per_metric_counts()[&MetricType::Steps], 5);
        assert_eq!(run.total_uploaded(), 6);
    }

    #[test]
    fn test_log_without_listener_does_not_panic() {
        let (run, rx) = SyncRun::new(CancelFlag::new());
        drop(rx);
        run.log("still recorded");
        assert_eq!(run.log_lines().len(), 1);
    }
}
