/// Aggregation of raw samples into daily statistics
///
/// Samples are bucketed by the local calendar date of their start time and each
/// bucket is reduced by a per-metric policy (see `DayReducer`). The grouping
/// loop observes the run's cancel flag between samples.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, FixedOffset, Local, NaiveTime, Offset, TimeZone, Utc};

use crate::domain::{DailyAggregate, DailyStatistic, DayKey, MetricType, RawSample};

/// Maps instants to local calendar days
///
/// Uses a fixed UTC offset for the whole run so a day boundary can't move while
/// a sync is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calendar {
    offset: FixedOffset,
}

impl Calendar {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// The host's current local offset
    pub fn local() -> Self {
        Self::new(*Local::now().offset())
    }

    pub fn utc() -> Self {
        Self::new(Utc.fix())
    }

    /// Offset given in minutes east of UTC; `None` when out of range
    pub fn from_offset_minutes(minutes: i32) -> Option<Self> {
        FixedOffset::east_opt(minutes.checked_mul(60)?).map(Self::new)
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Local calendar day containing `ts`
    pub fn day_of(&self, ts: DateTime<Utc>) -> DayKey {
        DayKey::new(ts.with_timezone(&self.offset).date_naive())
    }

    /// Instant at which the local day begins
    pub fn start_of_day(&self, day: DayKey) -> DateTime<Utc> {
        let local_midnight = day.date().and_time(NaiveTime::MIN);
        let utc_naive = local_midnight - Duration::seconds(i64::from(self.offset.local_minus_utc()));
        Utc.from_utc_datetime(&utc_naive)
    }

    pub fn today(&self, now: DateTime<Utc>) -> DayKey {
        self.day_of(now)
    }
}

/// Per-metric reduction policy for one day's samples
///
/// Returns `None` when the day has no qualifying samples, in which case no
/// aggregate is emitted for it.
pub trait DayReducer {
    fn metric(&self) -> MetricType;

    fn reduce_day(&self, samples: &[&RawSample]) -> Option<DailyStatistic>;
}

/// Result of reducing a batch of samples
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reduction {
    pub days: BTreeMap<DayKey, DailyAggregate>,
    /// Grouping stopped early because the run was cancelled
    pub interrupted: bool,
    /// Day left out because only part of its samples had been grouped
    pub dropped_day: Option<DayKey>,
    /// Samples looked at before grouping stopped
    pub samples_grouped: usize,
}

impl Reduction {
    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

/// Group samples by day and reduce each day with `reducer`
///
/// Samples of other metrics are ignored. Samples are taken in ascending start
/// order so the policy sees a stable sequence regardless of query order.
/// `is_cancelled` is polled before each sample; when it reports true the days
/// grouped so far are kept except the one still being filled.
pub fn reduce<R, C>(
    reducer: &R,
    samples: &[RawSample],
    calendar: &Calendar,
    is_cancelled: C,
) -> Reduction
where
    R: DayReducer + ?Sized,
    C: Fn() -> bool,
{
    let metric = reducer.metric();
    let mut ordered: Vec<&RawSample> = samples.iter().filter(|s| s.metric == metric).collect();
    ordered.sort_by_key(|s| (s.start, s.end));

    let mut grouped: BTreeMap<DayKey, Vec<&RawSample>> = BTreeMap::new();
    let mut interrupted = false;
    let mut dropped_day = None;
    let mut samples_grouped = 0;

    for (index, sample) in ordered.iter().enumerate() {
        if is_cancelled() {
            interrupted = true;
            // The day of the next unprocessed sample is incomplete if we already
            // started filling it.
            let pending_day = calendar.day_of(sample.start);
            if index > 0 && grouped.contains_key(&pending_day) {
                grouped.remove(&pending_day);
                dropped_day = Some(pending_day);
            }
            break;
        }

        grouped
            .entry(calendar.day_of(sample.start))
            .or_default()
            .push(sample);
        samples_grouped += 1;
    }

    let days = grouped
        .into_iter()
        .filter_map(|(day, day_samples)| {
            reducer
                .reduce_day(&day_samples)
                .map(|statistic| (day, DailyAggregate::new(day, statistic)))
        })
        .collect();

    Reduction {
        days,
        interrupted,
        dropped_day,
        samples_grouped,
    }
}

/// Mean, minimum and maximum of a day's values
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeStats {
    pub avg: f64,
    pub min: f64,
    pub max: f64,
}

impl RangeStats {
    pub fn of(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let sum: f64 = values.iter().sum();
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some(Self {
            avg: sum / values.len() as f64,
            min,
            max,
        })
    }
}

/// Round half away from zero to one decimal place
pub fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Round half away from zero to an integer
pub fn round_int(value: f64) -> i64 {
    value.round() as i64
}

/// Quantity values of the given samples, skipping non-finite readings
pub fn quantities(samples: &[&RawSample]) -> Vec<f64> {
    samples
        .iter()
        .filter_map(|s| s.quantity_value())
        .filter(|v| v.is_finite())
        .collect()
}
