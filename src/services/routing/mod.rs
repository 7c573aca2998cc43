//! Directions providers for optimized multi-stop routes
//!
//! Uses Valhalla for production, mock for tests.

mod valhalla;

pub use valhalla::{ValhallaConfig, ValhallaDirections};

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::RouteError;
use crate::services::geo::{bounding_box, road_distance_meters, travel_time_seconds};
use crate::services::geocoding::Geocoder;
use crate::types::{Address, Bounds, Coordinates, DirectionsRequest, DirectionsResult, Leg};

/// Directions provider trait for abstraction (Valhalla, mock, etc.)
#[async_trait]
pub trait DirectionsProvider: Send + Sync {
    /// Optimized directions from origin through the waypoints to the
    /// destination. Origin and destination keep their positions.
    async fn directions(&self, request: &DirectionsRequest) -> Result<DirectionsResult, RouteError>;

    /// Get service name for logging
    fn name(&self) -> &str;
}

/// Geocode every location of a request, in request order.
/// An address the geocoder cannot place fails the whole request.
pub(crate) async fn geocode_all(
    geocoder: &dyn Geocoder,
    addresses: &[&Address],
) -> Result<Vec<Coordinates>, RouteError> {
    let mut coordinates = Vec::with_capacity(addresses.len());
    for address in addresses {
        match geocoder.geocode(address).await? {
            Some(c) => coordinates.push(c),
            None => {
                return Err(RouteError::Provider(format!(
                    "Could not geocode address '{}'",
                    address
                )))
            }
        }
    }
    Ok(coordinates)
}

/// Mock directions for tests and development.
///
/// Orders waypoints greedily by nearest neighbour from the origin and
/// estimates legs from straight-line distance.
pub struct MockDirections {
    geocoder: Arc<dyn Geocoder>,
}

impl MockDirections {
    pub fn new(geocoder: Arc<dyn Geocoder>) -> Self {
        Self { geocoder }
    }
}

/// Greedy nearest-neighbour visiting order over `waypoints`, starting at
/// `origin`. Ties go to the lower index.
fn nearest_neighbour_order(origin: &Coordinates, waypoints: &[Coordinates]) -> Vec<usize> {
    let mut remaining: Vec<usize> = (0..waypoints.len()).collect();
    let mut order = Vec::with_capacity(waypoints.len());
    let mut current = *origin;

    while !remaining.is_empty() {
        let mut best = 0;
        for (pos, &index) in remaining.iter().enumerate() {
            if road_distance_meters(&current, &waypoints[index])
                < road_distance_meters(&current, &waypoints[remaining[best]])
            {
                best = pos;
            }
        }
        let next = remaining.remove(best);
        current = waypoints[next];
        order.push(next);
    }

    order
}

#[async_trait]
impl DirectionsProvider for MockDirections {
    async fn directions(&self, request: &DirectionsRequest) -> Result<DirectionsResult, RouteError> {
        let locations = request.locations();
        let coords = geocode_all(self.geocoder.as_ref(), &locations).await?;

        let origin = coords[0];
        let interior = &coords[1..coords.len() - 1];

        let waypoint_order = if request.optimize_waypoints {
            nearest_neighbour_order(&origin, interior)
        } else {
            (0..interior.len()).collect()
        };

        // Positions into `locations` in visiting order
        let visit: Vec<usize> = std::iter::once(0)
            .chain(waypoint_order.iter().map(|i| i + 1))
            .chain(std::iter::once(coords.len() - 1))
            .collect();

        let legs = visit
            .windows(2)
            .map(|pair| {
                let (from, to) = (&coords[pair[0]], &coords[pair[1]]);
                Leg {
                    distance_meters: road_distance_meters(from, to),
                    duration_seconds: travel_time_seconds(from, to),
                    steps: vec![
                        format!("Head to <b>{}</b>", locations[pair[1]]),
                        "Arrive at destination".to_string(),
                    ],
                }
            })
            .collect();

        let bounds = bounding_box(&coords).map(|(south_west, north_east)| Bounds {
            south_west,
            north_east,
        });

        Ok(DirectionsResult {
            legs,
            waypoint_order,
            bounds,
            geometry: visit.iter().map(|&i| [coords[i].lng, coords[i].lat]).collect(),
        })
    }

    fn name(&self) -> &str {
        "MockDirections"
    }
}

/// Create directions provider with automatic Valhalla detection and fallback
///
/// Tries to connect to Valhalla if URL is provided. Falls back to mock
/// directions if Valhalla is unavailable or URL is not configured.
pub async fn create_directions_provider_with_fallback(
    valhalla_url: Option<String>,
    geocoder: Arc<dyn Geocoder>,
) -> Arc<dyn DirectionsProvider> {
    if let Some(url) = valhalla_url {
        match check_valhalla_health(&url).await {
            Ok(()) => match ValhallaDirections::new(ValhallaConfig::new(&url), geocoder.clone()) {
                Ok(client) => {
                    info!("Valhalla directions available at {}", url);
                    return Arc::new(client);
                }
                Err(e) => warn!("Failed to create Valhalla client: {}", e),
            },
            Err(e) => {
                warn!("Valhalla not available at {}: {}. Falling back to mock directions.", url, e);
            }
        }
    }

    info!("Using mock directions (Valhalla not configured or unavailable)");
    Arc::new(MockDirections::new(geocoder))
}

/// Check if Valhalla is healthy by making a simple status request
async fn check_valhalla_health(base_url: &str) -> Result<(), RouteError> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()?;

    let url = format!("{}/status", base_url.trim_end_matches('/'));
    let response = client.get(&url).send().await?;

    if response.status().is_success() {
        Ok(())
    } else {
        Err(RouteError::Provider(format!(
            "Valhalla returned status {}",
            response.status()
        )))
    }
}
