/// Core types and enums used throughout the domain layer
///
/// This module defines the fundamental types like MetricType, DayKey and the ID
/// types that are used by samples, aggregates and questionnaire entries.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use chrono::NaiveDate;
use uuid::Uuid;

use crate::domain::DomainError;

/// Unique identifier for a questionnaire entry
///
/// This is a wrapper around UUID to provide type safety - you can't accidentally
/// pass an entry ID where a user ID is expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryId(pub Uuid);

impl EntryId {
    /// Generate a new random entry ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an entry ID from a string (useful for tool arguments)
    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identifier of the authenticated patient
///
/// The identity provider hands these out; we never look inside them, we only
/// use them as the first segment of every remote document path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    /// Wrap a provider-issued identifier, rejecting blank values and path separators
    pub fn new(raw: impl Into<String>) -> Result<Self, DomainError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::Validation {
                message: "User ID cannot be empty".to_string(),
            });
        }
        if trimmed.contains('/') {
            return Err(DomainError::Validation {
                message: format!("User ID cannot contain '/': {}", trimmed),
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Calendar day used as the aggregation bucket (local time)
///
/// Rendered as `yyyy-MM-dd`, which is also the last segment of the remote
/// document path for a daily aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct DayKey(NaiveDate);

impl DayKey {
    pub const FORMAT: &'static str = "%Y-%m-%d";

    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// Parse a `yyyy-MM-dd` string
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        NaiveDate::parse_from_str(s.trim(), Self::FORMAT)
            .map(Self)
            .map_err(|_| DomainError::InvalidDate(format!("Expected yyyy-MM-dd, got '{}'", s)))
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(Self::FORMAT))
    }
}

impl From<NaiveDate> for DayKey {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

impl From<DayKey> for String {
    fn from(day: DayKey) -> Self {
        day.to_string()
    }
}

impl TryFrom<String> for DayKey {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

/// The health measurements we synchronize
///
/// The declaration order is the fixed upload order used by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MetricType {
    /// Beats per minute
    HeartRate,
    /// Blood oxygen as a 0..1 fraction at the source
    OxygenSaturation,
    /// Step count
    Steps,
    /// Sleep analysis intervals
    Sleep,
    /// Active energy burned in kcal
    Activity,
    /// Breaths per minute
    RespiratoryRate,
    /// Body mass in kg
    BodyWeight,
}

impl MetricType {
    /// All metrics in upload order
    pub const ALL: [MetricType; 7] = [
        MetricType::HeartRate,
        MetricType::OxygenSaturation,
        MetricType::Steps,
        MetricType::Sleep,
        MetricType::Activity,
        MetricType::RespiratoryRate,
        MetricType::BodyWeight,
    ];

    /// Identifier used in document paths, the `type` field and watermark keys
    pub fn identifier(&self) -> &'static str {
        match self {
            MetricType::HeartRate => "heartRate",
            MetricType::OxygenSaturation => "oxygenSaturation",
            MetricType::Steps => "steps",
            MetricType::Sleep => "sleep",
            MetricType::Activity => "activity",
            MetricType::RespiratoryRate => "respiratoryRate",
            MetricType::BodyWeight => "bodyWeight",
        }
    }

    /// Get the display name for this metric
    pub fn display_name(&self) -> &'static str {
        match self {
            MetricType::HeartRate => "heart rate",
            MetricType::OxygenSaturation => "oxygen saturation",
            MetricType::Steps => "steps",
            MetricType::Sleep => "sleep",
            MetricType::Activity => "activity",
            MetricType::RespiratoryRate => "respiratory rate",
            MetricType::BodyWeight => "body weight",
        }
    }

    /// Unit the health source reports quantity values in
    pub fn source_unit(&self) -> &'static str {
        match self {
            MetricType::HeartRate => "count/min",
            MetricType::OxygenSaturation => "%",
            MetricType::Steps => "count",
            MetricType::Sleep => "category",
            MetricType::Activity => "kcal",
            MetricType::RespiratoryRate => "count/min",
            MetricType::BodyWeight => "kg",
        }
    }

    /// Sleep is recorded as typed intervals rather than quantities
    pub fn is_interval(&self) -> bool {
        matches!(self, MetricType::Sleep)
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

impl FromStr for MetricType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricType::ALL
            .iter()
            .copied()
            .find(|m| m.identifier().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DomainError::Validation {
                message: format!("Unknown metric type: {}", s),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_identifiers_round_trip() {
        for metric in MetricType::ALL {
            let parsed: MetricType = metric.identifier().parse().unwrap();
            assert_eq!(parsed, metric);
        }
        assert!("bloodPressure".parse::<MetricType>().is_err());
    }

    #[test]
    fn test_upload_order_is_declaration_order() {
        let mut sorted = MetricType::ALL;
        sorted.sort();
        assert_eq!(sorted, MetricType::ALL);
        assert_eq!(MetricType::ALL[0], MetricType::HeartRate);
        assert_eq!(MetricType::ALL[6], MetricType::BodyWeight);
    }

    #[test]
    fn test_day_key_format() {
        let day = DayKey::parse("2025-07-01").unwrap();
        assert_eq!(day.to_string(), "2025-07-01");
        assert!(DayKey::parse("01/07/2025").is_err());

        let json = serde_json::to_string(&day).unwrap();
        assert_eq!(json, "\"2025-07-01\"");
    }

    #[test]
    fn test_user_id_validation() {
        assert!(UserId::new("  ").is_err());
        assert!(UserId::new("a/b").is_err());
        assert_eq!(UserId::new(" abc123 ").unwrap().as_str(), "abc123");
    }
}
