/// Per-metric upload watermarks
///
/// The watermark of a metric is the last day whose aggregate was written
/// successfully. All watermarks of a user live in one remote document,
/// `patients/{user}/meta/uploadTracking`, one `yyyy-MM-dd` field per metric.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Days, NaiveDate};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::domain::{DayKey, MetricType, UserId};
use crate::remote::{paths, DocumentStore, RemoteError, WriteMode};

/// First day a sync may start from, given the stored watermark
///
/// A watermark in the future is clamped to today, and nothing older than
/// `max_days_back` days before today is ever fetched.
pub fn effective_start_from(stored: Option<DayKey>, today: DayKey, max_days_back: u32) -> DayKey {
    let floor = today
        .date()
        .checked_sub_days(Days::new(u64::from(max_days_back)))
        .unwrap_or(NaiveDate::MIN);

    match stored {
        Some(stored) => DayKey::new(stored.date().min(today.date()).max(floor)),
        None => DayKey::new(floor),
    }
}

#[derive(Clone)]
pub struct WatermarkStore {
    documents: Arc<dyn DocumentStore>,
}

impl WatermarkStore {
    pub fn new(documents: Arc<dyn DocumentStore>) -> Self {
        Self { documents }
    }

    /// All stored watermarks of a user
    ///
    /// Fields that are not a known metric or not a valid date are ignored.
    pub async fn all(&self, user: &UserId) -> Result<BTreeMap<MetricType, DayKey>, RemoteError> {
        let doc = self.documents.get(&paths::upload_tracking_path(user)).await?;
        let mut marks = BTreeMap::new();

        if let Some(Value::Object(fields)) = doc {
            for (key, value) in fields {
                let metric = key.parse::<MetricType>().ok();
                let day = value.as_str().and_then(|s| DayKey::parse(s).ok());
                if let (Some(metric), Some(day)) = (metric, day) {
                    marks.insert(metric, day);
                }
            }
        }
        Ok(marks)
    }

    /// Stored watermark of one metric
    pub async fn stored(&self, metric: MetricType, user: &UserId) -> Result<Option<DayKey>, RemoteError> {
        Ok(self.all(user).await?.remove(&metric))
    }

    /// Day the next fetch of `metric` should start from
    ///
    /// An unreadable watermark is treated as missing.
    pub async fn effective_start(
        &self,
        metric: MetricType,
        user: &UserId,
        max_days_back: u32,
        today: DayKey,
    ) -> DayKey {
        let stored = match self.stored(metric, user).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!("Could not read watermark for {}: {}", metric, e);
                None
            }
        };

        let start = effective_start_from(stored, today, max_days_back);
        debug!(
            "Effective start for {}: {} (stored {:?})",
            metric,
            start,
            stored.map(|d| d.to_string())
        );
        start
    }

    /// Advance the watermark of `metric` to `day`
    ///
    /// Never moves a watermark backwards; returns the watermark now stored.
    pub async fn update(
        &self,
        metric: MetricType,
        user: &UserId,
        day: DayKey,
    ) -> Result<DayKey, RemoteError> {
        if let Some(previous) = self.stored(metric, user).await? {
            if previous >= day {
                debug!("Watermark for {} already at {}", metric, previous);
                return Ok(previous);
            }
        }

        let mut fields = Map::new();
        fields.insert(metric.identifier().to_string(), Value::String(day.to_string()));
        self.documents
            .set(&paths::upload_tracking_path(user), Value::Object(fields), WriteMode::Merge)
            .await?;

        debug!("Watermark for {} advanced to {}", metric, day);
        Ok(day)
    }
}
