/// Daily aggregates computed from raw samples
///
/// One DailyAggregate exists per (metric, day) per sync pass. It is what gets
/// written to the remote store, replacing whatever was there for that day.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use chrono::{DateTime, SecondsFormat, Utc};

use crate::domain::{DayKey, MetricType};

/// The reduced statistic for one day, shaped per metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DailyStatistic {
    /// bpm, rounded to 0.1
    HeartRate { avg: f64, min: f64, max: f64 },
    /// Percent, rounded to integers
    OxygenSaturation { avg: i64, min: i64, max: i64 },
    /// Breaths per minute, rounded to integers
    RespiratoryRate { avg: i64, min: i64, max: i64 },
    Steps { steps: i64 },
    /// Floored kcal
    Activity { kcal: i64 },
    /// Latest weight of the day, rounded to 0.1 kg
    BodyWeight { kg: f64 },
    Sleep { asleep_minutes: i64, in_bed_minutes: i64, sessions: u32 },
}

impl DailyStatistic {
    /// Metric this statistic belongs to
    pub fn metric(&self) -> MetricType {
        match self {
            DailyStatistic::HeartRate { .. } => MetricType::HeartRate,
            DailyStatistic::OxygenSaturation { .. } => MetricType::OxygenSaturation,
            DailyStatistic::RespiratoryRate { .. } => MetricType::RespiratoryRate,
            DailyStatistic::Steps { .. } => MetricType::Steps,
            DailyStatistic::Activity { .. } => MetricType::Activity,
            DailyStatistic::BodyWeight { .. } => MetricType::BodyWeight,
            DailyStatistic::Sleep { .. } => MetricType::Sleep,
        }
    }

    /// Document fields for this statistic
    fn fields(&self) -> Map<String, Value> {
        let value = match self {
            DailyStatistic::HeartRate { avg, min, max } => {
                json!({ "bpmAvg": avg, "bpmMin": min, "bpmMax": max })
            }
            DailyStatistic::OxygenSaturation { avg, min, max } => {
                json!({ "avgSpO2": avg, "minSpO2": min, "maxSpO2": max })
            }
            DailyStatistic::RespiratoryRate { avg, min, max } => {
                json!({ "brpmAvg": avg, "brpmMin": min, "brpmMax": max })
            }
            DailyStatistic::Steps { steps } => json!({ "steps": steps }),
            DailyStatistic::Activity { kcal } => json!({ "kcal": kcal }),
            DailyStatistic::BodyWeight { kg } => json!({ "kg": kg }),
            DailyStatistic::Sleep { asleep_minutes, in_bed_minutes, sessions } => json!({
                "asleepMinutes": asleep_minutes,
                "inBedMinutes": in_bed_minutes,
                "sleepSessions": sessions,
            }),
        };

        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    /// Short human-readable rendering for log lines
    pub fn summary(&self) -> String {
        match self {
            DailyStatistic::HeartRate { avg, min, max } => {
                format!("avg {:.1} bpm (min {:.1}, max {:.1})", avg, min, max)
            }
            DailyStatistic::OxygenSaturation { avg, min, max } => {
                format!("avg {}% (min {}, max {})", avg, min, max)
            }
            DailyStatistic::RespiratoryRate { avg, min, max } => {
                format!("avg {} brpm (min {}, max {})", avg, min, max)
            }
            DailyStatistic::Steps { steps } => format!("{} steps", steps),
            DailyStatistic::Activity { kcal } => format!("{} kcal", kcal),
            DailyStatistic::BodyWeight { kg } => format!("{:.1} kg", kg),
            DailyStatistic::Sleep { asleep_minutes, in_bed_minutes, sessions } => format!(
                "{} min asleep, {} min in bed, {} sessions",
                asleep_minutes, in_bed_minutes, sessions
            ),
        }
    }
}

/// One reduced day of one metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyAggregate {
    pub metric: MetricType,
    pub day: DayKey,
    pub statistic: DailyStatistic,
}

impl DailyAggregate {
    pub fn new(day: DayKey, statistic: DailyStatistic) -> Self {
        Self {
            metric: statistic.metric(),
            day,
            statistic,
        }
    }

    /// Render the remote document body
    ///
    /// `day_start` is the instant the local calendar day begins; it is stored as
    /// the `date` field so consumers don't need to know our timezone.
    pub fn to_document(&self, day_start: DateTime<Utc>) -> Value {
        let mut doc = Map::new();
        doc.insert(
            "date".to_string(),
            Value::String(day_start.to_rfc3339_opts(SecondsFormat::Secs, true)),
        );
        doc.insert("type".to_string(), Value::String(self.metric.identifier().to_string()));
        doc.extend(self.statistic.fields());
        Value::Object(doc)
    }
}
