/// Mock health source for testing
///
/// Serves a fixed list of samples. Access to individual metrics can be denied
/// and queries can be made to fail, so the non-fatal error paths of a sync can
/// be exercised without a device.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{MetricType, RawSample};
use crate::health::{HealthSource, SourceError};

#[derive(Debug, Default)]
pub struct MockHealthSource {
    samples: Mutex<Vec<RawSample>>,
    denied: Mutex<HashSet<MetricType>>,
    failing: Mutex<HashSet<MetricType>>,
    queries: AtomicU64,
}

impl MockHealthSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_samples(samples: Vec<RawSample>) -> Self {
        let source = Self::new();
        source.add_samples(samples);
        source
    }

    pub fn add_samples(&self, samples: impl IntoIterator<Item = RawSample>) {
        if let Ok(mut stored) = self.samples.lock() {
            stored.extend(samples);
        }
    }

    /// Withhold read access to `metric`
    pub fn deny(&self, metric: MetricType) {
        if let Ok(mut denied) = self.denied.lock() {
            denied.insert(metric);
        }
    }

    /// Make queries for `metric` return an error
    pub fn fail_queries(&self, metric: MetricType) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert(metric);
        }
    }

    /// Number of queries served, failed ones included
    pub fn query_count(&self) -> u64 {
        self.queries.load(Ordering::SeqCst)
    }

    fn contains(set: &Mutex<HashSet<MetricType>>, metric: MetricType) -> bool {
        set.lock().map(|s| s.contains(&metric)).unwrap_or(false)
    }
}

#[async_trait]
impl HealthSource for MockHealthSource {
    async fn is_authorized(&self, metric: MetricType) -> Result<bool, SourceError> {
        Ok(!Self::contains(&self.denied, metric))
    }

    async fn query(
        &self,
        metric: MetricType,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<RawSample>, SourceError> {
        self.queries.fetch_add(1, Ordering::SeqCst);

        if Self::contains(&self.denied, metric) {
            return Err(SourceError::NotAuthorized(metric));
        }
        if Self::contains(&self.failing, metric) {
            return Err(SourceError::Query {
                metric,
                message: "simulated query failure".to_string(),
            });
        }

        let samples = self
            .samples
            .lock()
            .map(|all| {
                all.iter()
                    .filter(|s| s.metric == metric && s.start >= start && s.start < end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(samples)
    }
}
