//! Business logic services

pub mod client_service;
pub mod export;
pub mod export_sink;
pub mod geo;
pub mod geocoding;
pub mod link;
pub mod map_capture;
pub mod metrics;
pub mod metrics_cache;
pub mod nominatim;
pub mod onboarding;
pub mod permissions;
pub mod route_service;
pub mod routing;
pub mod sequencer;
pub mod session_cache;
