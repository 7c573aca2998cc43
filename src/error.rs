//! Route domain errors
//!
//! Every failure the route core can report to a caller. Handlers turn these
//! into `ErrorResponse` payloads using [`RouteError::code`].

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// A route needs an origin and a destination before it can be sequenced.
    #[error("at least two addresses are needed to display a route (found {found})")]
    InsufficientStops { found: usize },

    /// The directions provider answered with a waypoint order that does not
    /// describe a permutation of the route's interior stops.
    #[error("directions do not match the route: {0}")]
    SequencingInconsistency(String),

    #[error("directions provider returned no legs for a route with {stop_count} stops")]
    NoLegs { stop_count: usize },

    #[error("could not generate export: {0}")]
    ExportFailed(String),

    /// Geocoding or directions failure, carrying the provider's message.
    #[error("provider error: {0}")]
    Provider(String),

    #[error("invalid request: {0}")]
    InvalidInput(String),

    #[error("not found")]
    NotFound,

    /// The row to create already exists, e.g. a second onboarding.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl RouteError {
    /// Stable error code sent to clients.
    pub const fn code(&self) -> &'static str {
        match self {
            RouteError::InsufficientStops { .. } => "INSUFFICIENT_STOPS",
            RouteError::SequencingInconsistency(_) => "SEQUENCING_INCONSISTENCY",
            RouteError::NoLegs { .. } => "NO_LEGS",
            RouteError::ExportFailed(_) => "EXPORT_FAILED",
            RouteError::Provider(_) => "PROVIDER_ERROR",
            RouteError::InvalidInput(_) => "INVALID_REQUEST",
            RouteError::NotFound => "NOT_FOUND",
            RouteError::Conflict(_) => "CONFLICT",
            RouteError::Forbidden(_) => "FORBIDDEN",
            RouteError::Unauthorized(_) => "UNAUTHORIZED",
            RouteError::Storage(_) => "DATABASE_ERROR",
        }
    }
}

impl From<sqlx::Error> for RouteError {
    fn from(e: sqlx::Error) -> Self {
        RouteError::Storage(e.to_string())
    }
}

impl From<reqwest::Error> for RouteError {
    fn from(e: reqwest::Error) -> Self {
        RouteError::Provider(e.to_string())
    }
}
