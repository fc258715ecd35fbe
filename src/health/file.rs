/// Health source backed by a JSON export file
///
/// Lets the pipeline run away from the phone. The export lists the metrics the
/// user granted access to and the raw samples:
///
/// ```json
/// {
///   "authorized": ["heartRate", "steps", "sleep"],
///   "samples": [
///     { "metric": "heartRate", "value": 72, "start": "2025-07-01T08:00:00Z",
///       "end": "2025-07-01T08:00:00Z", "source": "Watch" }
///   ]
/// }
/// ```
///
/// Sleep values are category codes. A missing `authorized` list grants every
/// metric.

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::domain::{MetricType, RawSample};
use crate::health::{HealthSource, SourceError};

#[derive(Debug, Deserialize)]
struct ExportFile {
    #[serde(default)]
    authorized: Option<Vec<MetricType>>,
    #[serde(default)]
    samples: Vec<ExportSample>,
}

#[derive(Debug, Deserialize)]
struct ExportSample {
    metric: MetricType,
    value: f64,
    start: DateTime<Utc>,
    #[serde(default)]
    end: Option<DateTime<Utc>>,
    #[serde(default)]
    source: Option<String>,
}

impl ExportSample {
    fn into_sample(self) -> Result<RawSample, SourceError> {
        if !self.value.is_finite() {
            return Err(SourceError::InvalidSample(format!(
                "{} sample at {} has a non-finite value",
                self.metric, self.start
            )));
        }
        let end = self.end.unwrap_or(self.start);
        let source = self.source.unwrap_or_else(|| "export".to_string());

        Ok(if self.metric.is_interval() {
            RawSample::sleep(self.value as i64, self.start, end, source)
        } else {
            RawSample::quantity(self.metric, self.value, self.start, end, source)
        })
    }
}

#[derive(Debug, Clone)]
pub struct FileHealthSource {
    authorized: HashSet<MetricType>,
    samples: Vec<RawSample>,
}

impl FileHealthSource {
    /// Read an export file from disk
    pub fn load(path: &Path) -> Result<Self, SourceError> {
        let content = std::fs::read_to_string(path)?;
        let source = Self::from_json(&content)?;
        tracing::info!(
            "Loaded {} samples from health export {:?}",
            source.samples.len(),
            path
        );
        Ok(source)
    }

    /// A source without data or granted access, used when no export is configured
    pub fn empty() -> Self {
        Self {
            authorized: HashSet::new(),
            samples: Vec::new(),
        }
    }

    pub fn from_json(content: &str) -> Result<Self, SourceError> {
        let export: ExportFile = serde_json::from_str(content)?;

        let authorized = match export.authorized {
            Some(metrics) => metrics.into_iter().collect(),
            None => MetricType::ALL.into_iter().collect(),
        };
        let samples = export
            .samples
            .into_iter()
            .map(ExportSample::into_sample)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { authorized, samples })
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }
}

#[async_trait]
impl HealthSource for FileHealthSource {
    async fn is_authorized(&self, metric: MetricType) -> Result<bool, SourceError> {
        Ok(self.authorized.contains(&metric))
    }

    async fn query(
        &self,
        metric: MetricType,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<RawSample>, SourceError> {
        if !self.authorized.contains(&metric) {
            return Err(SourceError::NotAuthorized(metric));
        }

        Ok(self
            .samples
            .iter()
            .filter(|s| s.metric == metric && s.start >= start && s.start < end)
            .cloned()
            .collect())
    }
}
