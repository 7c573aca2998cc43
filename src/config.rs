//! Configuration management

use std::path::PathBuf;

use anyhow::{self, Context, Result};

use crate::defaults::{DEFAULT_DWELL_SECONDS_PER_STOP, DEFAULT_EXPORT_DIR, DEFAULT_METRICS_CONCURRENCY};

const MIN_JWT_SECRET_BYTES: usize = 32;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// NATS server URL
    pub nats_url: String,

    /// PostgreSQL connection string
    pub database_url: String,

    /// Nominatim API URL (for geocoding)
    pub nominatim_url: String,

    /// "nominatim" or "mock"
    pub geocoder_backend: String,

    /// Valhalla routing engine URL (optional, falls back to mock if unavailable)
    pub valhalla_url: Option<String>,

    /// Static map renderer; exports fail without one
    pub map_capture_url: Option<String>,

    /// Where exported routes are written
    pub export_dir: PathBuf,

    /// Shared secret for identity provider tokens
    pub jwt_secret: String,

    pub dwell_seconds_per_stop: u64,

    /// Routes sequenced in parallel by "compute all"
    pub metrics_concurrency: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration again for a running worker. Values in `.env`
    /// replace those already in the process environment, so an edited
    /// file takes effect.
    pub fn reload() -> Result<Self> {
        dotenvy::dotenv_override().ok();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from any key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let nats_url = var("NATS_URL").unwrap_or_else(|| "nats://localhost:4222".to_string());

        let database_url = var("DATABASE_URL").context("DATABASE_URL must be set")?;

        let nominatim_url =
            var("NOMINATIM_URL").unwrap_or_else(|| "https://nominatim.openstreetmap.org".to_string());

        let geocoder_backend = var("GEOCODER_BACKEND").unwrap_or_else(|| "nominatim".to_string());

        let jwt_secret = var("JWT_SECRET").context("JWT_SECRET must be set to the identity provider signing secret")?;

        if jwt_secret.len() < MIN_JWT_SECRET_BYTES {
            anyhow::bail!(
                "JWT_SECRET must be at least {} bytes (current: {} bytes)",
                MIN_JWT_SECRET_BYTES,
                jwt_secret.len()
            );
        }

        let dwell_seconds_per_stop = match var("DWELL_SECONDS_PER_STOP") {
            Some(value) => value
                .parse()
                .with_context(|| format!("DWELL_SECONDS_PER_STOP must be a number of seconds, got '{}'", value))?,
            None => DEFAULT_DWELL_SECONDS_PER_STOP,
        };

        let metrics_concurrency = match var("METRICS_CONCURRENCY") {
            Some(value) => value
                .parse::<usize>()
                .with_context(|| format!("METRICS_CONCURRENCY must be a positive number, got '{}'", value))?
                .max(1),
            None => DEFAULT_METRICS_CONCURRENCY,
        };

        Ok(Self {
            nats_url,
            database_url,
            nominatim_url,
            geocoder_backend,
            valhalla_url: var("VALHALLA_URL"),
            map_capture_url: var("MAP_CAPTURE_URL"),
            export_dir: PathBuf::from(var("EXPORT_DIR").unwrap_or_else(|| DEFAULT_EXPORT_DIR.to_string())),
            jwt_secret,
            dwell_seconds_per_stop,
            metrics_concurrency,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tokio_test::{assert_err, assert_ok};

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn load(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    fn minimal() -> Vec<(&'static str, &'static str)> {
        vec![("DATABASE_URL", "postgres://test"), ("JWT_SECRET", SECRET)]
    }

    #[test]
    fn test_defaults() {
        let config = assert_ok!(load(&minimal()));
        assert_eq!(config.nats_url, "nats://localhost:4222");
        assert_eq!(config.nominatim_url, "https://nominatim.openstreetmap.org");
        assert_eq!(config.geocoder_backend, "nominatim");
        assert!(config.valhalla_url.is_none());
        assert!(config.map_capture_url.is_none());
        assert_eq!(config.export_dir, PathBuf::from("./exports"));
        assert_eq!(config.dwell_seconds_per_stop, 1800);
        assert_eq!(config.metrics_concurrency, 4);
    }

    #[test]
    fn test_optional_urls_when_set() {
        let mut pairs = minimal();
        pairs.push(("VALHALLA_URL", "http://localhost:8002"));
        pairs.push(("MAP_CAPTURE_URL", "http://localhost:8090/render"));
        let config = load(&pairs).unwrap();
        assert_eq!(config.valhalla_url.as_deref(), Some("http://localhost:8002"));
        assert_eq!(config.map_capture_url.as_deref(), Some("http://localhost:8090/render"));
    }

    #[test]
    fn test_blank_values_count_as_unset() {
        let mut pairs = minimal();
        pairs.push(("VALHALLA_URL", "  "));
        assert!(load(&pairs).unwrap().valhalla_url.is_none());
    }

    #[test]
    fn test_database_url_required() {
        let err = load(&[("JWT_SECRET", SECRET)]).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn test_short_jwt_secret_rejected() {
        let err = load(&[("DATABASE_URL", "postgres://test"), ("JWT_SECRET", "short")]).unwrap_err();
        assert!(err.to_string().contains("at least 32 bytes"));
    }

    #[test]
    fn test_dwell_override_and_validation() {
        let mut pairs = minimal();
        pairs.push(("DWELL_SECONDS_PER_STOP", "900"));
        assert_eq!(load(&pairs).unwrap().dwell_seconds_per_stop, 900);

        let mut pairs = minimal();
        pairs.push(("DWELL_SECONDS_PER_STOP", "half an hour"));
        assert_err!(load(&pairs));
    }

    #[test]
    fn test_metrics_concurrency_is_at_least_one() {
        let mut pairs = minimal();
        pairs.push(("METRICS_CONCURRENCY", "0"));
        assert_eq!(load(&pairs).unwrap().metrics_concurrency, 1);
    }
}
