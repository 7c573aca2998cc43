//! Route types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Postal address as entered by the user. Never parsed by the core.
pub type Address = String;

/// A named, ordered list of stops in the order the user entered them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub name: String,
    pub stops: Vec<Address>,
}

impl Route {
    pub fn new(name: impl Into<String>, stops: Vec<Address>) -> Self {
        Self {
            name: name.into(),
            stops,
        }
    }

    pub fn origin(&self) -> Option<&Address> {
        self.stops.first()
    }

    pub fn destination(&self) -> Option<&Address> {
        if self.stops.len() < 2 {
            return None;
        }
        self.stops.last()
    }

    /// Stops between origin and destination. Empty for routes with fewer
    /// than three stops.
    pub fn interior(&self) -> &[Address] {
        if self.stops.len() < 3 {
            return &[];
        }
        &self.stops[1..self.stops.len() - 1]
    }
}

/// A route after the provider's waypoint order has been applied.
///
/// Derived view state, recomputed on every view and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequencedRoute {
    pub name: String,
    pub stops: Vec<Address>,
}

impl SequencedRoute {
    pub fn stop_count(&self) -> usize {
        self.stops.len()
    }
}

/// Persisted route row (`routes` table)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RouteRecord {
    pub id: Uuid,
    pub organization_id: Uuid,
    /// Identity provider subject of the creator
    pub user_id: String,
    pub route_name: String,
    /// Raw input order; sequencing never writes back here
    pub addresses: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RouteRecord {
    pub fn to_route(&self) -> Route {
        Route::new(self.route_name.clone(), self.addresses.clone())
    }
}

/// Checks what the route form enforces: a name and no blank addresses.
pub fn validate_route_input(name: &str, addresses: &[String]) -> Result<(), crate::error::RouteError> {
    use crate::error::RouteError;

    if name.trim().is_empty() {
        return Err(RouteError::InvalidInput("route name is required".to_string()));
    }
    if addresses.is_empty() {
        return Err(RouteError::InvalidInput("at least one address is required".to_string()));
    }
    if let Some(index) = addresses.iter().position(|a| a.trim().is_empty()) {
        return Err(RouteError::InvalidInput(format!("address {} is empty", index + 1)));
    }
    Ok(())
}

/// Request payload for route.create
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRouteRequest {
    pub route_name: String,
    pub addresses: Vec<String>,
}

/// Request payload for route.update
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRouteRequest {
    pub route_id: Uuid,
    pub route_name: String,
    pub addresses: Vec<String>,
}

/// Request payload for subjects that address a single route
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteIdRequest {
    pub route_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRouteResponse {
    pub route_id: Uuid,
    pub deleted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectionsLinkResponse {
    pub route_id: Uuid,
    pub url: String,
}
