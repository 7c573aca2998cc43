//! Nominatim geocoding client

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::error::RouteError;
use crate::services::geocoding::Geocoder;
use crate::types::Coordinates;

/// Public Nominatim allows one request per second
const MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(1000);

/// Nominatim API response
#[derive(Debug, Deserialize)]
pub struct NominatimResult {
    pub lat: String,
    pub lon: String,
    pub display_name: String,
}

/// Nominatim geocoding client
pub struct NominatimGeocoder {
    base_url: String,
    client: reqwest::Client,
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl NominatimGeocoder {
    /// Create a new client
    pub fn new(base_url: &str) -> Result<Self, RouteError> {
        let client = reqwest::Client::builder()
            .user_agent("Routopia/1.0 (https://routopia.app)")
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| RouteError::Provider(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            min_interval: MIN_REQUEST_INTERVAL,
            last_request: Mutex::new(None),
        })
    }

    /// Override the spacing between requests, for self-hosted instances
    pub fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval;
        self
    }

    fn search_url(&self, address: &str) -> String {
        format!(
            "{}/search?q={}&format=json&limit=1",
            self.base_url,
            urlencoding::encode(address)
        )
    }

    /// Wait until the minimum interval since the previous request has passed
    async fn throttle(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

fn parse_first(results: &[NominatimResult]) -> Result<Option<Coordinates>, RouteError> {
    let Some(result) = results.first() else {
        return Ok(None);
    };

    let lat: f64 = result
        .lat
        .parse()
        .map_err(|_| RouteError::Provider(format!("Invalid latitude '{}'", result.lat)))?;
    let lng: f64 = result
        .lon
        .parse()
        .map_err(|_| RouteError::Provider(format!("Invalid longitude '{}'", result.lon)))?;

    Ok(Some(Coordinates { lat, lng }))
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<Coordinates>, RouteError> {
        self.throttle().await;

        let response = self.client.get(self.search_url(address)).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RouteError::Provider(format!(
                "Geocoding failed with status {}",
                status
            )));
        }

        let results: Vec<NominatimResult> = response.json().await?;
        if let Some(first) = results.first() {
            debug!("Geocoded '{}' as '{}'", address, first.display_name);
        }

        parse_first(&results)
    }

    fn name(&self) -> &'static str {
        "nominatim"
    }
}
