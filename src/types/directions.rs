//! Directions provider types

use serde::{Deserialize, Serialize};

use super::{Address, Route};
use crate::error::RouteError;

/// Geographic coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// Bounding box of a route as reported by the provider
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    pub south_west: Coordinates,
    pub north_east: Coordinates,
}

impl Bounds {
    pub fn center(&self) -> Coordinates {
        Coordinates {
            lat: (self.south_west.lat + self.north_east.lat) / 2.0,
            lng: (self.south_west.lng + self.north_east.lng) / 2.0,
        }
    }
}

/// Travel between two consecutive stops in sequenced order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Leg {
    pub distance_meters: u64,
    pub duration_seconds: u64,
    /// Turn-by-turn instructions; may contain HTML markup
    #[serde(default)]
    pub steps: Vec<String>,
}

/// Optimized directions for a route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectionsResult {
    pub legs: Vec<Leg>,
    /// Indices into the route's interior stops, in visiting order
    pub waypoint_order: Vec<usize>,
    #[serde(default)]
    pub bounds: Option<Bounds>,
    /// Route polyline as `[lng, lat]` pairs; empty when unavailable
    #[serde(default)]
    pub geometry: Vec<[f64; 2]>,
}

/// Request sent to a directions provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectionsRequest {
    pub origin: Address,
    pub destination: Address,
    pub waypoints: Vec<Address>,
    pub optimize_waypoints: bool,
}

impl DirectionsRequest {
    /// Build an optimizing request from a route's stops.
    pub fn for_route(route: &Route) -> Result<Self, RouteError> {
        match (route.origin(), route.destination()) {
            (Some(origin), Some(destination)) => Ok(Self {
                origin: origin.clone(),
                destination: destination.clone(),
                waypoints: route.interior().to_vec(),
                optimize_waypoints: true,
            }),
            _ => Err(RouteError::InsufficientStops {
                found: route.stops.len(),
            }),
        }
    }

    /// All addresses in request order: origin, waypoints, destination.
    pub fn locations(&self) -> Vec<&Address> {
        std::iter::once(&self.origin)
            .chain(self.waypoints.iter())
            .chain(std::iter::once(&self.destination))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_for_route_splits_stops() {
        let route = Route::new("Loop", vec!["A".into(), "B".into(), "C".into(), "D".into()]);
        let request = DirectionsRequest::for_route(&route).unwrap();
        assert_eq!(request.origin, "A");
        assert_eq!(request.destination, "D");
        assert_eq!(request.waypoints, vec!["B".to_string(), "C".to_string()]);
        assert!(request.optimize_waypoints);
        assert_eq!(request.locations().len(), 4);
    }

    #[test]
    fn test_request_for_single_stop_route_fails() {
        let route = Route::new("Loop", vec!["A".into()]);
        assert_eq!(
            DirectionsRequest::for_route(&route),
            Err(RouteError::InsufficientStops { found: 1 })
        );
    }

    #[test]
    fn test_bounds_center() {
        let bounds = Bounds {
            south_west: Coordinates { lat: 40.0, lng: -75.0 },
            north_east: Coordinates { lat: 41.0, lng: -73.0 },
        };
        let center = bounds.center();
        assert!((center.lat - 40.5).abs() < 1e-9);
        assert!((center.lng + 74.0).abs() < 1e-9);
    }

    #[test]
    fn test_directions_result_parses_without_optional_fields() {
        let json = r#"{
            "legs": [{"distanceMeters": 2000, "durationSeconds": 600}],
            "waypointOrder": []
        }"#;
        let result: DirectionsResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.legs[0].distance_meters, 2000);
        assert!(result.legs[0].steps.is_empty());
        assert!(result.bounds.is_none());
        assert!(result.geometry.is_empty());
    }
}
