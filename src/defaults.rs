use crate::types::Coordinates;

/// On-site time added for every stop of a route
pub const DEFAULT_DWELL_SECONDS_PER_STOP: u64 = 30 * 60;

/// Map center when a route gives nothing better (New York City)
pub const DEFAULT_CENTER: Coordinates = Coordinates {
    lat: 40.7128,
    lng: -74.006,
};

/// Routes whose metrics are computed at the same time by "compute all"
pub const DEFAULT_METRICS_CONCURRENCY: usize = 4;

pub const DEFAULT_EXPORT_DIR: &str = "./exports";
