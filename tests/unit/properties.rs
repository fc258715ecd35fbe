/// Property tests for day grouping and sync windows
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use proptest::prelude::*;

use pulmo_sync::aggregation::{reduce, Calendar};
use pulmo_sync::health::adapter_for;
use pulmo_sync::sync::effective_start_from;
use pulmo_sync::{DayKey, MetricType, RawSample};

fn metric_strategy() -> impl Strategy<Value = MetricType> {
    prop::sample::select(vec![
        MetricType::HeartRate,
        MetricType::OxygenSaturation,
        MetricType::Steps,
        MetricType::Activity,
        MetricType::RespiratoryRate,
        MetricType::BodyWeight,
    ])
}

/// Quantity samples spread over about two weeks, at most one per minute
fn samples_strategy(metric: MetricType) -> impl Strategy<Value = Vec<RawSample>> {
    prop::collection::btree_map(0i64..14 * 24 * 60, 0.0f64..2000.0, 0..60).prop_map(move |points| {
        let base = Utc.with_ymd_and_hms(2025, 6, 20, 0, 0, 0).unwrap();
        points
            .into_iter()
            .map(|(minute, value)| {
                let at = base + Duration::minutes(minute);
                RawSample::quantity(metric, value, at, at, "prop")
            })
            .collect()
    })
}

fn day_strategy() -> impl Strategy<Value = DayKey> {
    (0i64..3650).prop_map(|offset| {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        DayKey::new(start + Duration::days(offset))
    })
}

proptest! {
    #[test]
    fn reduction_ignores_query_order(
        (metric, samples) in metric_strategy().prop_flat_map(|m| (Just(m), samples_strategy(m))),
        offset in -12 * 60i32..=14 * 60,
    ) {
        let calendar = Calendar::from_offset_minutes(offset).unwrap();
        let adapter = adapter_for(metric);

        let first = reduce(adapter.as_ref(), &samples, &calendar, || false);
        let mut reversed = samples.clone();
        reversed.reverse();
        let second = reduce(adapter.as_ref(), &reversed, &calendar, || false);

        prop_assert_eq!(first, second);
    }

    #[test]
    fn every_reduced_day_has_samples(
        (metric, samples) in metric_strategy().prop_flat_map(|m| (Just(m), samples_strategy(m))),
    ) {
        let calendar = Calendar::utc();
        let reduction = reduce(adapter_for(metric).as_ref(), &samples, &calendar, || false);

        for day in reduction.days.keys() {
            prop_assert!(samples.iter().any(|s| calendar.day_of(s.start) == *day));
        }
        prop_assert_eq!(reduction.samples_grouped, samples.len());
    }

    #[test]
    fn effective_start_stays_in_window(
        stored in prop::option::of(day_strategy()),
        today in day_strategy(),
        max_days_back in 0u32..60,
    ) {
        let start = effective_start_from(stored, today, max_days_back);
        let floor = today.date() - Duration::days(i64::from(max_days_back));

        prop_assert!(start.date() <= today.date());
        prop_assert!(start.date() >= floor);
        if let Some(stored) = stored {
            if stored.date() >= floor && stored.date() <= today.date() {
                prop_assert_eq!(start, stored);
            }
        } else {
            prop_assert_eq!(start.date(), floor);
        }
    }
}
