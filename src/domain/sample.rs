/// Raw samples as read from the on-device health store
///
/// Samples are ephemeral: they live only for the duration of one sync run and
/// are reduced to daily aggregates before anything leaves the device.

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Duration, Utc};

use crate::domain::MetricType;

/// Value carried by a raw sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum SampleValue {
    /// Numeric measurement in the metric's source unit
    Quantity(f64),
    /// Category code of an interval sample (sleep analysis)
    Category(i64),
}

/// How a sleep interval is classified
///
/// The codes follow the platform health store's sleep analysis values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SleepStage {
    InBed,
    Asleep,
    Awake,
}

impl SleepStage {
    /// Map a raw category code to a stage
    ///
    /// 0 is in bed; 1 (unspecified), 3 (core), 4 (deep) and 5 (REM) are asleep;
    /// 2 and anything unknown count as awake.
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => SleepStage::InBed,
            1 | 3 | 4 | 5 => SleepStage::Asleep,
            _ => SleepStage::Awake,
        }
    }
}

/// A single reading (or interval) of one health metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    pub metric: MetricType,
    pub value: SampleValue,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub source_name: String,
}

impl RawSample {
    /// Build a quantity sample
    pub fn quantity(
        metric: MetricType,
        value: f64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        source_name: impl Into<String>,
    ) -> Self {
        Self {
            metric,
            value: SampleValue::Quantity(value),
            start,
            end,
            source_name: source_name.into(),
        }
    }

    /// Build a sleep interval sample
    pub fn sleep(
        code: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        source_name: impl Into<String>,
    ) -> Self {
        Self {
            metric: MetricType::Sleep,
            value: SampleValue::Category(code),
            start,
            end,
            source_name: source_name.into(),
        }
    }

    /// Quantity value, if this is a quantity sample
    pub fn quantity_value(&self) -> Option<f64> {
        match self.value {
            SampleValue::Quantity(v) => Some(v),
            SampleValue::Category(_) => None,
        }
    }

    /// Sleep stage, if this is a category sample
    pub fn sleep_stage(&self) -> Option<SleepStage> {
        match self.value {
            SampleValue::Category(code) => Some(SleepStage::from_code(code)),
            SampleValue::Quantity(_) => None,
        }
    }

    /// Length of the sample interval; negative intervals count as zero
    pub fn duration(&self) -> Duration {
        let d = self.end - self.start;
        if d < Duration::zero() { Duration::zero() } else { d }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_sleep_stage_mapping() {
        assert_eq!(SleepStage::from_code(0), SleepStage::InBed);
        for code in [1, 3, 4, 5] {
            assert_eq!(SleepStage::from_code(code), SleepStage::Asleep);
        }
        assert_eq!(SleepStage::from_code(2), SleepStage::Awake);
        assert_eq!(SleepStage::from_code(42), SleepStage::Awake);
    }

    #[test]
    fn test_inverted_interval_has_zero_duration() {
        let start = Utc.with_ymd_and_hms(2025, 7, 1, 8, 0, 0).unwrap();
        let sample = RawSample::sleep(1, start, start - Duration::minutes(5), "Watch");
        assert_eq!(sample.duration(), Duration::zero());
        assert_eq!(sample.sleep_stage(), Some(SleepStage::Asleep));
        assert_eq!(sample.quantity_value(), None);
    }
}
