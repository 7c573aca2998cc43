//! Geocoding abstraction layer
//!
//! - `MockGeocoder` for tests and development (deterministic, no network)
//! - `NominatimGeocoder` for production, throttled to the public usage policy
//!
//! Selected via the GEOCODER_BACKEND env variable ("mock" or "nominatim").

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::defaults::DEFAULT_CENTER;
use crate::error::RouteError;
use crate::services::nominatim::NominatimGeocoder;
use crate::types::{Coordinates, DirectionsResult};

/// Geocoder trait - abstraction for all geocoding implementations
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Resolve a free-form address. `Ok(None)` means the provider answered
    /// but found nothing.
    async fn geocode(&self, address: &str) -> Result<Option<Coordinates>, RouteError>;

    /// Get the name of this geocoder implementation
    fn name(&self) -> &'static str;
}

/// Deterministic geocoder: hashes the address to a point near New York.
#[derive(Debug, Default)]
pub struct MockGeocoder {
    unknown: HashSet<String>,
    failing: bool,
}

impl MockGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Addresses that resolve to nothing
    pub fn with_unknown<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            unknown: addresses.into_iter().map(Into::into).collect(),
            failing: false,
        }
    }

    /// A geocoder whose every call errors, as if the provider were down
    pub fn failing() -> Self {
        Self {
            unknown: HashSet::new(),
            failing: true,
        }
    }
}

/// FNV-1a, stable across runs and platforms
fn address_hash(address: &str) -> u64 {
    address
        .trim()
        .to_lowercase()
        .bytes()
        .fold(0xcbf2_9ce4_8422_2325u64, |hash, byte| {
            (hash ^ byte as u64).wrapping_mul(0x0000_0100_0000_01b3)
        })
}

#[async_trait]
impl Geocoder for MockGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<Coordinates>, RouteError> {
        if self.failing {
            return Err(RouteError::Provider("mock geocoder unavailable".to_string()));
        }
        if self.unknown.contains(address) {
            return Ok(None);
        }

        let hash = address_hash(address);
        // Two independent offsets in [-0.15, 0.15] degrees
        let lat_offset = ((hash & 0xffff) as f64 / 65535.0 - 0.5) * 0.3;
        let lng_offset = (((hash >> 16) & 0xffff) as f64 / 65535.0 - 0.5) * 0.3;

        Ok(Some(Coordinates {
            lat: DEFAULT_CENTER.lat + lat_offset,
            lng: DEFAULT_CENTER.lng + lng_offset,
        }))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Create the geocoder selected by GEOCODER_BACKEND
pub fn create_geocoder(backend: &str, nominatim_url: &str) -> Result<Arc<dyn Geocoder>, RouteError> {
    match backend {
        "nominatim" => Ok(Arc::new(NominatimGeocoder::new(nominatim_url)?)),
        "mock" => Ok(Arc::new(MockGeocoder::new())),
        other => {
            warn!("Unknown GEOCODER_BACKEND '{}', using mock geocoder", other);
            Ok(Arc::new(MockGeocoder::new()))
        }
    }
}

/// Map center for a route.
///
/// Uses the directions bounds when present, otherwise geocodes the first
/// address, otherwise falls back to the default center. Never fails: a
/// geocoding error only costs the nicer center.
pub async fn route_center(
    geocoder: &dyn Geocoder,
    addresses: &[String],
    directions: Option<&DirectionsResult>,
) -> Coordinates {
    if let Some(bounds) = directions.and_then(|d| d.bounds) {
        return bounds.center();
    }

    let first = match addresses.first() {
        Some(first) => first,
        None => return DEFAULT_CENTER,
    };

    match geocoder.geocode(first).await {
        Ok(Some(coordinates)) => coordinates,
        Ok(None) => {
            debug!("No geocoding result for '{}', using default center", first);
            DEFAULT_CENTER
        }
        Err(e) => {
            warn!("Error calculating route center: {}", e);
            DEFAULT_CENTER
        }
    }
}
