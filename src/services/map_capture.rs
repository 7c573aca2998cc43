//! Static map capture for route exports

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::error::RouteError;
use crate::services::export::MAP_IMAGE;
use crate::types::{Address, Coordinates};

/// What the map image should show
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapCaptureRequest {
    pub center: Coordinates,
    /// Route polyline as `[lng, lat]` pairs
    pub geometry: Vec<[f64; 2]>,
    /// Stop labels in visiting order
    pub stops: Vec<Address>,
    pub width: u32,
    pub height: u32,
}

impl MapCaptureRequest {
    /// Request sized for the export's map slot
    pub fn for_export(center: Coordinates, geometry: Vec<[f64; 2]>, stops: Vec<Address>) -> Self {
        Self {
            center,
            geometry,
            stops,
            width: MAP_IMAGE.width,
            height: MAP_IMAGE.height,
        }
    }
}

#[async_trait]
pub trait MapCapture: Send + Sync {
    /// Render the map as PNG bytes
    async fn capture(&self, request: &MapCaptureRequest) -> Result<Vec<u8>, RouteError>;

    fn name(&self) -> &'static str;
}

/// Posts the capture request to a static-map renderer and returns its PNG
pub struct HttpMapCapture {
    url: String,
    client: reqwest::Client,
}

impl HttpMapCapture {
    pub fn new(url: &str) -> Result<Self, RouteError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| RouteError::ExportFailed(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            url: url.to_string(),
            client,
        })
    }
}

#[async_trait]
impl MapCapture for HttpMapCapture {
    async fn capture(&self, request: &MapCaptureRequest) -> Result<Vec<u8>, RouteError> {
        debug!("Capturing map with {} geometry points", request.geometry.len());

        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| RouteError::ExportFailed(format!("Map capture request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RouteError::ExportFailed(format!(
                "Map capture returned status {}",
                status
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RouteError::ExportFailed(format!("Map capture body unreadable: {}", e)))?;

        if bytes.is_empty() {
            return Err(RouteError::ExportFailed("Map capture returned no image".to_string()));
        }

        Ok(bytes.to_vec())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Used when no renderer is configured. Every capture fails, so exports fail.
pub struct DisabledMapCapture;

#[async_trait]
impl MapCapture for DisabledMapCapture {
    async fn capture(&self, _request: &MapCaptureRequest) -> Result<Vec<u8>, RouteError> {
        Err(RouteError::ExportFailed("Map capture is not configured".to_string()))
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}

/// Create the map capture for an optional renderer URL
pub fn create_map_capture(url: Option<&str>) -> Result<Box<dyn MapCapture>, RouteError> {
    match url {
        Some(url) => Ok(Box::new(HttpMapCapture::new(url)?)),
        None => Ok(Box::new(DisabledMapCapture)),
    }
}
