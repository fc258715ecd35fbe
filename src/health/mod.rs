/// Health data sources and per-metric adapters
///
/// `HealthSource` is the port to the on-device health store. A `MetricAdapter`
/// pairs one metric's fetch policy with its daily reduction policy, so each
/// metric's rules live in one type.

pub mod adapters;
pub mod file;
pub mod mock;

pub use adapters::*;
pub use file::FileHealthSource;
pub use mock::MockHealthSource;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::aggregation::DayReducer;
use crate::domain::{MetricType, RawSample};

/// Errors reported by a health source
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Not authorized to read {0}")]
    NotAuthorized(MetricType),

    #[error("Query for {metric} failed: {message}")]
    Query { metric: MetricType, message: String },

    #[error("Health export could not be read: {0}")]
    Io(#[from] std::io::Error),

    #[error("Health export is malformed: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid sample: {0}")]
    InvalidSample(String),
}

/// Port to the local health data store
#[async_trait]
pub trait HealthSource: Send + Sync {
    /// Whether reading `metric` has been granted
    async fn is_authorized(&self, metric: MetricType) -> Result<bool, SourceError>;

    /// Samples of `metric` whose start lies in `[start, end)`
    async fn query(
        &self,
        metric: MetricType,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<RawSample>, SourceError>;
}

/// Samples returned by an adapter fetch
///
/// A fetch never fails: authorization and query problems come back as an
/// empty sample list with a diagnostic line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fetched {
    pub samples: Vec<RawSample>,
    pub diagnostic: Option<String>,
}

impl Fetched {
    fn failed(diagnostic: String) -> Self {
        tracing::warn!("{}", diagnostic);
        Self {
            samples: Vec::new(),
            diagnostic: Some(diagnostic),
        }
    }
}

/// Fetch and reduction policy for one metric
#[async_trait]
pub trait MetricAdapter: DayReducer + Send + Sync {
    /// Whether a sample from the source has the shape this metric expects
    fn accepts(&self, sample: &RawSample) -> bool;

    /// Read samples starting in `[start, end)`
    async fn fetch(
        &self,
        source: &dyn HealthSource,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Fetched {
        let metric = self.metric();

        match source.is_authorized(metric).await {
            Ok(true) => {}
            Ok(false) => {
                return Fetched::failed(format!("{}: read access not granted", metric.display_name()))
            }
            Err(e) => {
                return Fetched::failed(format!(
                    "{}: authorization check failed: {}",
                    metric.display_name(),
                    e
                ))
            }
        }

        match source.query(metric, start, end).await {
            Ok(samples) => Fetched {
                samples: samples
                    .into_iter()
                    .filter(|s| s.metric == metric && self.accepts(s))
                    .collect(),
                diagnostic: None,
            },
            Err(e) => Fetched::failed(format!("{}: query failed: {}", metric.display_name(), e)),
        }
    }
}
