//! Route metrics: totals, display formatting and averages

use serde::{Deserialize, Serialize};

use crate::error::RouteError;
use crate::types::DirectionsResult;

/// Shown while metrics are pending or failed
pub const PLACEHOLDER_PENDING: &str = "Calculating...";
pub const PLACEHOLDER_DURATION: &str = "-- min";
pub const PLACEHOLDER_DISTANCE: &str = "-- mi";

/// Miles per meter, scaled by 10^9 so conversion stays in integers
const MILES_PER_METER_NANO: u128 = 621_371;

/// Derived totals for one sequenced route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteMetrics {
    pub stop_count: usize,
    pub travel_seconds: u64,
    pub dwell_seconds: u64,
    pub total_duration_seconds: u64,
    pub total_distance_meters: u64,
}

impl RouteMetrics {
    /// Total duration rounded to the nearest minute
    pub fn total_minutes(&self) -> u64 {
        (self.total_duration_seconds + 30) / 60
    }

    pub fn duration_display(&self) -> String {
        format_duration(self.total_minutes())
    }

    pub fn distance_display(&self) -> String {
        format_miles(self.total_distance_meters)
    }
}

/// Sum leg durations and distances and add dwell time for every stop.
pub fn aggregate(
    directions: &DirectionsResult,
    stop_count: usize,
    dwell_seconds_per_stop: u64,
) -> Result<RouteMetrics, RouteError> {
    if directions.legs.is_empty() && stop_count >= 2 {
        return Err(RouteError::NoLegs { stop_count });
    }

    let (travel_seconds, total_distance_meters) = directions
        .legs
        .iter()
        .fold((0u64, 0u64), |(secs, meters), leg| {
            (
                secs.saturating_add(leg.duration_seconds),
                meters.saturating_add(leg.distance_meters),
            )
        });

    let dwell_seconds = (stop_count as u64).saturating_mul(dwell_seconds_per_stop);

    Ok(RouteMetrics {
        stop_count,
        travel_seconds,
        dwell_seconds,
        total_duration_seconds: travel_seconds.saturating_add(dwell_seconds),
        total_distance_meters,
    })
}

/// `"45 min"`, `"1h"`, `"1h 30m"`
pub fn format_duration(minutes: u64) -> String {
    if minutes < 60 {
        return format!("{} min", minutes);
    }
    let hours = minutes / 60;
    let rest = minutes % 60;
    if rest == 0 {
        format!("{}h", hours)
    } else {
        format!("{}h {}m", hours, rest)
    }
}

/// Meters to miles, one decimal, rounded half-up.
pub fn format_miles(meters: u64) -> String {
    // tenths of a mile = meters * 621371 / 10^8
    let scaled = meters as u128 * MILES_PER_METER_NANO;
    let tenths = (scaled + 50_000_000) / 100_000_000;
    format!("{}.{} mi", tenths / 10, tenths % 10)
}

/// Mean duration over resolved routes, formatted like a single duration.
///
/// Only entries that finished computing should be passed in; with none the
/// result is the pending placeholder rather than a zero.
pub fn average_duration<'a, I>(resolved: I) -> String
where
    I: IntoIterator<Item = &'a RouteMetrics>,
{
    let (count, total_seconds) = resolved
        .into_iter()
        .fold((0u64, 0u64), |(n, secs), m| (n + 1, secs + m.total_duration_seconds));

    if count == 0 {
        return PLACEHOLDER_PENDING.to_string();
    }

    let mean_minutes = total_seconds as f64 / 60.0 / count as f64;
    format_duration(mean_minutes.round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Leg;

    fn legs(values: &[(u64, u64)]) -> DirectionsResult {
        DirectionsResult {
            legs: values
                .iter()
                .map(|&(duration_seconds, distance_meters)| Leg {
                    duration_seconds,
                    distance_meters,
                    steps: vec![],
                })
                .collect(),
            waypoint_order: vec![],
            bounds: None,
            geometry: vec![],
        }
    }

    #[test]
    fn test_format_duration_rules() {
        assert_eq!(format_duration(45), "45 min");
        assert_eq!(format_duration(60), "1h");
        assert_eq!(format_duration(90), "1h 30m");
        assert_eq!(format_duration(0), "0 min");
        assert_eq!(format_duration(59), "59 min");
        assert_eq!(format_duration(115), "1h 55m");
        assert_eq!(format_duration(600), "10h");
    }

    #[test]
    fn test_two_leg_route_totals() {
        let metrics = aggregate(&legs(&[(600, 2000), (900, 3000)]), 3, 1800).unwrap();
        assert_eq!(metrics.travel_seconds, 1500);
        assert_eq!(metrics.dwell_seconds, 5400);
        assert_eq!(metrics.total_duration_seconds, 6900);
        assert_eq!(metrics.total_minutes(), 115);
        assert_eq!(metrics.duration_display(), "1h 55m");
        assert_eq!(metrics.total_distance_meters, 5000);
        assert_eq!(metrics.distance_display(), "3.1 mi");
    }

    #[test]
    fn test_leg_order_does_not_change_totals() {
        let forward = aggregate(&legs(&[(120, 10), (7, 3), (3600, 25_000)]), 4, 60).unwrap();
        let backward = aggregate(&legs(&[(3600, 25_000), (7, 3), (120, 10)]), 4, 60).unwrap();
        assert_eq!(forward, backward);
        assert_eq!(forward.total_duration_seconds, 120 + 7 + 3600 + 4 * 60);
        assert_eq!(forward.total_distance_meters, 25_013);
    }

    #[test]
    fn test_many_legs_sum_exactly() {
        let values: Vec<(u64, u64)> = (1..=1000).map(|i| (i, i * 3)).collect();
        let metrics = aggregate(&legs(&values), 1001, 0).unwrap();
        assert_eq!(metrics.total_duration_seconds, 500_500);
        assert_eq!(metrics.total_distance_meters, 1_501_500);
    }

    #[test]
    fn test_no_legs_with_stops_is_an_error() {
        let err = aggregate(&legs(&[]), 2, 1800).unwrap_err();
        assert_eq!(err, RouteError::NoLegs { stop_count: 2 });
    }

    #[test]
    fn test_no_legs_without_stops_is_zero() {
        let metrics = aggregate(&legs(&[]), 0, 1800).unwrap();
        assert_eq!(metrics.total_duration_seconds, 0);
        assert_eq!(metrics.total_distance_meters, 0);
    }

    #[test]
    fn test_format_miles_rounding() {
        assert_eq!(format_miles(0), "0.0 mi");
        assert_eq!(format_miles(5000), "3.1 mi");
        assert_eq!(format_miles(1609), "1.0 mi");
        // 80467 m = 49.99986 mi
        assert_eq!(format_miles(80_467), "50.0 mi");
        // 241 m = 0.14975 mi
        assert_eq!(format_miles(241), "0.1 mi");
    }

    #[test]
    fn test_average_of_nothing_is_pending() {
        let empty: Vec<RouteMetrics> = vec![];
        assert_eq!(average_duration(&empty), PLACEHOLDER_PENDING);
    }

    #[test]
    fn test_average_rounds_to_nearest_minute() {
        let a = aggregate(&legs(&[(1800, 0)]), 1, 0).unwrap(); // 30 min
        let b = aggregate(&legs(&[(5460, 0)]), 1, 0).unwrap(); // 91 min
        // mean 60.5 min rounds to 61
        assert_eq!(average_duration([&a, &b]), "1h 1m");
    }

    #[test]
    fn test_average_of_whole_hours() {
        let a = aggregate(&legs(&[(3600, 0)]), 1, 0).unwrap();
        let b = aggregate(&legs(&[(10_800, 0)]), 1, 0).unwrap();
        assert_eq!(average_duration(vec![&a, &b]), "2h");
    }

    #[test]
    fn test_aggregate_is_idempotent() {
        let d = legs(&[(600, 2000), (900, 3000)]);
        assert_eq!(aggregate(&d, 3, 1800).unwrap(), aggregate(&d, 3, 1800).unwrap());
    }
}
