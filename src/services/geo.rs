//! Geographic calculations

use crate::types::Coordinates;

/// Earth radius in kilometers
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Road distance coefficient (straight line to road)
const ROAD_COEFFICIENT: f64 = 1.3;

/// Average speed in km/h for travel time estimation
const AVERAGE_SPEED_KMH: f64 = 40.0;

/// Calculate Haversine distance between two points in kilometers
pub fn haversine_distance(from: &Coordinates, to: &Coordinates) -> f64 {
    let d_lat = (to.lat - from.lat).to_radians();
    let d_lon = (to.lng - from.lng).to_radians();

    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);

    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_KM * c
}

/// Estimated road distance in whole meters
pub fn road_distance_meters(from: &Coordinates, to: &Coordinates) -> u64 {
    (haversine_distance(from, to) * ROAD_COEFFICIENT * 1000.0).round() as u64
}

/// Estimated driving time in whole seconds
pub fn travel_time_seconds(from: &Coordinates, to: &Coordinates) -> u64 {
    let road_km = haversine_distance(from, to) * ROAD_COEFFICIENT;
    (road_km / AVERAGE_SPEED_KMH * 3600.0).round() as u64
}

/// Smallest box containing all points, as (south-west, north-east)
pub fn bounding_box(points: &[Coordinates]) -> Option<(Coordinates, Coordinates)> {
    let first = points.first()?;
    let init = (*first, *first);
    Some(points.iter().fold(init, |(sw, ne), p| {
        (
            Coordinates { lat: sw.lat.min(p.lat), lng: sw.lng.min(p.lng) },
            Coordinates { lat: ne.lat.max(p.lat), lng: ne.lng.max(p.lng) },
        )
    }))
}
