//! Valhalla routing engine client
//!
//! Valhalla API documentation:
//! https://valhalla.github.io/valhalla/api/optimized/api-reference/

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{geocode_all, DirectionsProvider};
use crate::error::RouteError;
use crate::services::geocoding::Geocoder;
use crate::types::{Bounds, Coordinates, DirectionsRequest, DirectionsResult, Leg};

/// Valhalla client configuration
#[derive(Debug, Clone)]
pub struct ValhallaConfig {
    /// Base URL of Valhalla server (e.g., "http://localhost:8002")
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for ValhallaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8002".to_string(),
            timeout_seconds: 30,
        }
    }
}

impl ValhallaConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ..Default::default()
        }
    }
}

/// Valhalla directions client. Addresses are geocoded first since Valhalla
/// only accepts coordinates.
pub struct ValhallaDirections {
    client: Client,
    config: ValhallaConfig,
    geocoder: Arc<dyn Geocoder>,
}

impl ValhallaDirections {
    pub fn new(config: ValhallaConfig, geocoder: Arc<dyn Geocoder>) -> Result<Self, RouteError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| RouteError::Provider(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            geocoder,
        })
    }

    /// Build the optimized_route request. Valhalla keeps the first and last
    /// locations fixed and reorders everything between them.
    fn build_optimized_route_request(&self, locations: &[Coordinates]) -> OptimizedRouteRequest {
        OptimizedRouteRequest {
            locations: locations
                .iter()
                .map(|c| ValhallaLocation {
                    lat: c.lat,
                    lon: c.lng,
                    // 500m radius, enough for geocoded building centroids
                    radius: Some(500),
                })
                .collect(),
            costing: "auto".to_string(),
            units: "kilometers".to_string(),
        }
    }
}

#[async_trait]
impl DirectionsProvider for ValhallaDirections {
    async fn directions(&self, request: &DirectionsRequest) -> Result<DirectionsResult, RouteError> {
        let locations = request.locations();
        let coords = geocode_all(self.geocoder.as_ref(), &locations).await?;

        // Without optimization a plain route keeps the entered order
        let endpoint = if request.optimize_waypoints { "optimized_route" } else { "route" };
        let body = self.build_optimized_route_request(&coords);
        let url = format!("{}/{}", self.config.base_url, endpoint);

        debug!("Requesting {} from Valhalla for {} locations", endpoint, coords.len());

        let response = self.client.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RouteError::Provider(format!(
                "Valhalla returned error {}: {}",
                status, body
            )));
        }

        let parsed: OptimizedRouteResponse = response
            .json()
            .await
            .map_err(|e| RouteError::Provider(format!("Failed to parse Valhalla response: {}", e)))?;

        map_trip(parsed.trip, request.waypoints.len())
    }

    fn name(&self) -> &str {
        "Valhalla"
    }
}

/// Convert a Valhalla trip into provider-neutral directions.
fn map_trip(trip: Trip, waypoint_count: usize) -> Result<DirectionsResult, RouteError> {
    let waypoint_order = if trip.locations.is_empty() {
        // Plain /route responses carry no original indices
        (0..waypoint_count).collect()
    } else {
        let inner = trip
            .locations
            .get(1..trip.locations.len().saturating_sub(1))
            .unwrap_or_default();
        inner
            .iter()
            .map(|loc| {
                loc.original_index
                    .and_then(|i| i.checked_sub(1))
                    .ok_or_else(|| {
                        RouteError::Provider("Valhalla trip location without waypoint index".to_string())
                    })
            })
            .collect::<Result<Vec<_>, _>>()?
    };

    let mut geometry: Vec<[f64; 2]> = Vec::new();
    let mut legs = Vec::with_capacity(trip.legs.len());

    for (i, leg) in trip.legs.into_iter().enumerate() {
        let points = decode_polyline(&leg.shape, 6)?;
        // The first point of each later leg repeats the previous leg's last point
        let skip = usize::from(i > 0);
        geometry.extend(points.into_iter().skip(skip));

        legs.push(Leg {
            distance_meters: (leg.summary.length * 1000.0).round() as u64,
            duration_seconds: leg.summary.time.round() as u64,
            steps: leg.maneuvers.into_iter().map(|m| m.instruction).collect(),
        });
    }

    let bounds = trip.summary.and_then(|s| {
        Some(Bounds {
            south_west: Coordinates { lat: s.min_lat?, lng: s.min_lon? },
            north_east: Coordinates { lat: s.max_lat?, lng: s.max_lon? },
        })
    });

    Ok(DirectionsResult {
        legs,
        waypoint_order,
        bounds,
        geometry,
    })
}

// Valhalla API types

#[derive(Debug, Serialize)]
struct OptimizedRouteRequest {
    locations: Vec<ValhallaLocation>,
    costing: String,
    units: String,
}

#[derive(Debug, Serialize, Clone)]
struct ValhallaLocation {
    lat: f64,
    lon: f64,
    /// Radius in meters for snapping to roads
    #[serde(skip_serializing_if = "Option::is_none")]
    radius: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OptimizedRouteResponse {
    trip: Trip,
}

#[derive(Debug, Deserialize)]
struct Trip {
    #[serde(default)]
    locations: Vec<TripLocation>,
    legs: Vec<TripLeg>,
    summary: Option<TripSummary>,
}

#[derive(Debug, Deserialize)]
struct TripLocation {
    original_index: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct TripLeg {
    summary: LegSummary,
    #[serde(default)]
    maneuvers: Vec<Maneuver>,
    /// Encoded polyline shape
    #[serde(default)]
    shape: String,
}

#[derive(Debug, Deserialize)]
struct LegSummary {
    /// Kilometers (when units="kilometers")
    length: f64,
    /// Seconds
    time: f64,
}

#[derive(Debug, Deserialize)]
struct Maneuver {
    instruction: String,
}

#[derive(Debug, Deserialize)]
struct TripSummary {
    min_lat: Option<f64>,
    min_lon: Option<f64>,
    max_lat: Option<f64>,
    max_lon: Option<f64>,
}

/// Read one zig-zag encoded value starting at `pos`
fn invalid_polyline() -> RouteError {
    RouteError::Provider("Invalid polyline encoding".to_string())
}

fn read_value(bytes: &[u8], pos: &mut usize) -> Result<i64, RouteError> {
    let mut shift = 0;
    let mut result = 0i64;
    loop {
        // More than 13 chunks cannot come from a 64-bit value
        if shift > 60 {
            return Err(invalid_polyline());
        }
        let byte = match bytes.get(*pos) {
            Some(&b) => b as i64 - 63,
            None => return Err(invalid_polyline()),
        };
        *pos += 1;
        result |= (byte & 0x1f) << shift;
        shift += 5;
        if byte < 0x20 {
            break;
        }
    }
    Ok(if result & 1 != 0 { !(result >> 1) } else { result >> 1 })
}

/// Decode an encoded polyline into `[lng, lat]` pairs.
/// Precision is 6 decimal places for Valhalla (vs 5 for Google)
fn decode_polyline(encoded: &str, precision: u32) -> Result<Vec<[f64; 2]>, RouteError> {
    let factor = 10_f64.powi(precision as i32);
    let bytes = encoded.as_bytes();
    let mut pos = 0;
    let (mut lat, mut lng) = (0i64, 0i64);
    let mut coordinates = Vec::new();

    while pos < bytes.len() {
        lat = lat.checked_add(read_value(bytes, &mut pos)?).ok_or_else(invalid_polyline)?;
        lng = lng.checked_add(read_value(bytes, &mut pos)?).ok_or_else(invalid_polyline)?;
        // GeoJSON uses [lng, lat] order
        coordinates.push([lng as f64 / factor, lat as f64 / factor]);
    }

    Ok(coordinates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::geocoding::MockGeocoder;

    fn client() -> ValhallaDirections {
        ValhallaDirections::new(ValhallaConfig::default(), Arc::new(MockGeocoder::new())).unwrap()
    }

    #[test]
    fn test_valhalla_config_default() {
        let config = ValhallaConfig::default();
        assert_eq!(config.base_url, "http://localhost:8002");
        assert_eq!(config.timeout_seconds, 30);
    }

    #[test]
    fn test_valhalla_config_strips_trailing_slash() {
        let config = ValhallaConfig::new("http://valhalla:8002/");
        assert_eq!(config.base_url, "http://valhalla:8002");
    }

    #[test]
    fn test_build_optimized_route_request() {
        let locations = vec![
            Coordinates { lat: 40.7128, lng: -74.006 },
            Coordinates { lat: 40.7357, lng: -74.1724 },
        ];

        let request = client().build_optimized_route_request(&locations);

        assert_eq!(request.locations.len(), 2);
        assert_eq!(request.costing, "auto");
        assert_eq!(request.units, "kilometers");
        assert!((request.locations[1].lon + 74.1724).abs() < 0.0001);

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["locations"][0]["radius"], 500);
    }

    #[test]
    fn test_decode_polyline_precision_5() {
        // Reference example from the encoded polyline format documentation
        let coords = decode_polyline("_p~iF~ps|U_ulLnnqC_mqNvxq`@", 5).unwrap();
        assert_eq!(coords.len(), 3);
        assert!((coords[0][0] + 120.2).abs() < 1e-6);
        assert!((coords[0][1] - 38.5).abs() < 1e-6);
        assert!((coords[1][0] + 120.95).abs() < 1e-6);
        assert!((coords[1][1] - 40.7).abs() < 1e-6);
        assert!((coords[2][0] + 126.453).abs() < 1e-6);
        assert!((coords[2][1] - 43.252).abs() < 1e-6);
    }

    #[test]
    fn test_decode_polyline_truncated_input() {
        assert!(decode_polyline("_p~iF~ps|", 6).is_err());
        assert!(decode_polyline("", 6).unwrap().is_empty());
    }

    #[test]
    fn test_decode_polyline_rejects_overlong_value() {
        // Every '~' is a continuation chunk; the value would need more than 64 bits
        let shape = format!("{}?", "~".repeat(20));
        let err = decode_polyline(&shape, 6).unwrap_err();
        assert_eq!(err, RouteError::Provider("Invalid polyline encoding".to_string()));
    }

    #[test]
    fn test_map_trip_from_optimized_route_response() {
        let json = r#"{
            "trip": {
                "locations": [
                    {"original_index": 0},
                    {"original_index": 2},
                    {"original_index": 1},
                    {"original_index": 3}
                ],
                "legs": [
                    {"summary": {"length": 1.2346, "time": 180.4},
                     "maneuvers": [{"instruction": "Drive north."}, {"instruction": "Turn right."}],
                     "shape": "_p~iF~ps|U_ulLnnqC"},
                    {"summary": {"length": 0.5, "time": 60.6},
                     "maneuvers": [{"instruction": "Continue."}],
                     "shape": "_ulLnnqC_mqNvxq`@"},
                    {"summary": {"length": 2.0, "time": 240.0},
                     "maneuvers": [],
                     "shape": ""}
                ],
                "summary": {"min_lat": 40.70, "min_lon": -74.10, "max_lat": 40.80, "max_lon": -73.90}
            }
        }"#;
        let response: OptimizedRouteResponse = serde_json::from_str(json).unwrap();
        let result = map_trip(response.trip, 2).unwrap();

        assert_eq!(result.waypoint_order, vec![1, 0]);
        assert_eq!(result.legs.len(), 3);
        assert_eq!(result.legs[0].distance_meters, 1235);
        assert_eq!(result.legs[0].duration_seconds, 180);
        assert_eq!(result.legs[1].duration_seconds, 61);
        assert_eq!(result.legs[0].steps, vec!["Drive north.", "Turn right."]);
        assert!(result.legs[2].steps.is_empty());
        // 2 points + 2 points minus the shared junction
        assert_eq!(result.geometry.len(), 3);

        let bounds = result.bounds.unwrap();
        assert_eq!(bounds.south_west, Coordinates { lat: 40.70, lng: -74.10 });
        assert_eq!(bounds.north_east, Coordinates { lat: 40.80, lng: -73.90 });
    }

    #[test]
    fn test_map_trip_without_locations_keeps_order() {
        let json = r#"{"trip": {"legs": [{"summary": {"length": 1.0, "time": 60.0}}]}}"#;
        let response: OptimizedRouteResponse = serde_json::from_str(json).unwrap();
        let result = map_trip(response.trip, 0).unwrap();
        assert!(result.waypoint_order.is_empty());
        assert!(result.bounds.is_none());
        assert_eq!(result.legs[0].distance_meters, 1000);
    }

    #[test]
    fn test_map_trip_rejects_origin_index_as_waypoint() {
        let json = r#"{"trip": {
            "locations": [{"original_index": 0}, {"original_index": 0}, {"original_index": 2}],
            "legs": []
        }}"#;
        let response: OptimizedRouteResponse = serde_json::from_str(json).unwrap();
        assert!(matches!(map_trip(response.trip, 1), Err(RouteError::Provider(_))));
    }

    #[test]
    fn test_valhalla_client_name() {
        assert_eq!(client().name(), "Valhalla");
    }

    #[tokio::test]
    #[ignore = "Requires running Valhalla server"]
    async fn test_valhalla_integration_new_york() {
        let request = DirectionsRequest {
            origin: "Times Square, New York".to_string(),
            destination: "Brooklyn Bridge, New York".to_string(),
            waypoints: vec!["Central Park, New York".to_string()],
            optimize_waypoints: true,
        };

        let result = client().directions(&request).await.unwrap();

        assert_eq!(result.legs.len(), 2);
        assert_eq!(result.waypoint_order, vec![0]);
    }
}
