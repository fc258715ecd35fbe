/// The seven metric adapters
///
/// Each adapter carries its own reduction rule. All of them read quantity
/// samples except sleep, which reads category intervals.

use chrono::Duration;

use crate::aggregation::{quantities, round_int, round_tenth, DayReducer, RangeStats};
use crate::domain::{DailyStatistic, MetricType, RawSample, SampleValue, SleepStage};
use crate::health::MetricAdapter;

fn is_quantity(sample: &RawSample) -> bool {
    matches!(sample.value, SampleValue::Quantity(v) if v.is_finite())
}

/// Heart rate: mean, minimum and maximum bpm, rounded to 0.1
#[derive(Debug, Default)]
pub struct HeartRateAdapter;

impl DayReducer for HeartRateAdapter {
    fn metric(&self) -> MetricType {
        MetricType::HeartRate
    }

    fn reduce_day(&self, samples: &[&RawSample]) -> Option<DailyStatistic> {
        let stats = RangeStats::of(&quantities(samples))?;
        Some(DailyStatistic::HeartRate {
            avg: round_tenth(stats.avg),
            min: round_tenth(stats.min),
            max: round_tenth(stats.max),
        })
    }
}

impl MetricAdapter for HeartRateAdapter {
    fn accepts(&self, sample: &RawSample) -> bool {
        is_quantity(sample)
    }
}

/// Oxygen saturation: fractions scaled to percent, then mean/min/max as integers
#[derive(Debug, Default)]
pub struct OxygenSaturationAdapter;

impl DayReducer for OxygenSaturationAdapter {
    fn metric(&self) -> MetricType {
        MetricType::OxygenSaturation
    }

    fn reduce_day(&self, samples: &[&RawSample]) -> Option<DailyStatistic> {
        let percent: Vec<f64> = quantities(samples).into_iter().map(|v| v * 100.0).collect();
        let stats = RangeStats::of(&percent)?;
        Some(DailyStatistic::OxygenSaturation {
            avg: round_int(stats.avg),
            min: round_int(stats.min),
            max: round_int(stats.max),
        })
    }
}

impl MetricAdapter for OxygenSaturationAdapter {
    fn accepts(&self, sample: &RawSample) -> bool {
        is_quantity(sample)
    }
}

/// Steps: daily sum
#[derive(Debug, Default)]
pub struct StepsAdapter;

impl DayReducer for StepsAdapter {
    fn metric(&self) -> MetricType {
        MetricType::Steps
    }

    fn reduce_day(&self, samples: &[&RawSample]) -> Option<DailyStatistic> {
        let values = quantities(samples);
        if values.is_empty() {
            return None;
        }
        let total: f64 = values.iter().sum();
        Some(DailyStatistic::Steps { steps: total.trunc() as i64 })
    }
}

impl MetricAdapter for StepsAdapter {
    fn accepts(&self, sample: &RawSample) -> bool {
        is_quantity(sample)
    }
}

/// Sleep: minutes asleep and in bed, plus the number of intervals
#[derive(Debug, Default)]
pub struct SleepAdapter;

impl DayReducer for SleepAdapter {
    fn metric(&self) -> MetricType {
        MetricType::Sleep
    }

    fn reduce_day(&self, samples: &[&RawSample]) -> Option<DailyStatistic> {
        let mut asleep = Duration::zero();
        let mut in_bed = Duration::zero();
        let mut sessions = 0u32;

        for sample in samples {
            let Some(stage) = sample.sleep_stage() else {
                continue;
            };
            sessions += 1;
            match stage {
                SleepStage::Asleep => asleep = asleep + sample.duration(),
                SleepStage::InBed => in_bed = in_bed + sample.duration(),
                SleepStage::Awake => {}
            }
        }

        if sessions == 0 {
            return None;
        }
        Some(DailyStatistic::Sleep {
            asleep_minutes: asleep.num_minutes(),
            in_bed_minutes: in_bed.num_minutes(),
            sessions,
        })
    }
}

impl MetricAdapter for SleepAdapter {
    fn accepts(&self, sample: &RawSample) -> bool {
        matches!(sample.value, SampleValue::Category(_))
    }
}

/// Active energy: daily sum floored to whole kcal
#[derive(Debug, Default)]
pub struct ActivityAdapter;

impl DayReducer for ActivityAdapter {
    fn metric(&self) -> MetricType {
        MetricType::Activity
    }

    fn reduce_day(&self, samples: &[&RawSample]) -> Option<DailyStatistic> {
        let values = quantities(samples);
        if values.is_empty() {
            return None;
        }
        let total: f64 = values.iter().sum();
        Some(DailyStatistic::Activity { kcal: total.floor() as i64 })
    }
}

impl MetricAdapter for ActivityAdapter {
    fn accepts(&self, sample: &RawSample) -> bool {
        is_quantity(sample)
    }
}

/// Respiratory rate: mean, minimum and maximum breaths per minute as integers
#[derive(Debug, Default)]
pub struct RespiratoryRateAdapter;

impl DayReducer for RespiratoryRateAdapter {
    fn metric(&self) -> MetricType {
        MetricType::RespiratoryRate
    }

    fn reduce_day(&self, samples: &[&RawSample]) -> Option<DailyStatistic> {
        let stats = RangeStats::of(&quantities(samples))?;
        Some(DailyStatistic::RespiratoryRate {
            avg: round_int(stats.avg),
            min: round_int(stats.min),
            max: round_int(stats.max),
        })
    }
}

impl MetricAdapter for RespiratoryRateAdapter {
    fn accepts(&self, sample: &RawSample) -> bool {
        is_quantity(sample)
    }
}

/// Body weight: the day's latest reading, rounded to 0.1 kg
#[derive(Debug, Default)]
pub struct BodyWeightAdapter;

impl DayReducer for BodyWeightAdapter {
    fn metric(&self) -> MetricType {
        MetricType::BodyWeight
    }

    fn reduce_day(&self, samples: &[&RawSample]) -> Option<DailyStatistic> {
        // First sample wins when two share a timestamp
        let mut latest: Option<(&RawSample, f64)> = None;
        for sample in samples {
            let Some(value) = sample.quantity_value().filter(|v| v.is_finite()) else {
                continue;
            };
            match latest {
                Some((current, _)) if sample.start <= current.start => {}
                _ => latest = Some((sample, value)),
            }
        }

        latest.map(|(_, kg)| DailyStatistic::BodyWeight { kg: round_tenth(kg) })
    }
}

impl MetricAdapter for BodyWeightAdapter {
    fn accepts(&self, sample: &RawSample) -> bool {
        is_quantity(sample)
    }
}

/// One adapter per metric, in upload order
pub fn default_adapters() -> Vec<Box<dyn MetricAdapter>> {
    MetricType::ALL.iter().map(|metric| adapter_for(*metric)).collect()
}

/// The adapter responsible for `metric`
pub fn adapter_for(metric: MetricType) -> Box<dyn MetricAdapter> {
    match metric {
        MetricType::HeartRate => Box::new(HeartRateAdapter),
        MetricType::OxygenSaturation => Box::new(OxygenSaturationAdapter),
        MetricType::Steps => Box::new(StepsAdapter),
        MetricType::Sleep => Box::new(SleepAdapter),
        MetricType::Activity => Box::new(ActivityAdapter),
        MetricType::RespiratoryRate => Box::new(RespiratoryRateAdapter),
        MetricType::BodyWeight => Box::new(BodyWeightAdapter),
    }
}
