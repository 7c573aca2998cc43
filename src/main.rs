//! Routopia Worker - Backend service for route sequencing and export
//!
//! This worker connects to NATS and handles messages from the frontend.

mod auth;
mod cli;
mod config;
mod db;
mod defaults;
mod error;
mod handlers;
mod services;
mod types;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Command};
use crate::config::Config;
use crate::db::PgStore;
use crate::services::client_service::ClientService;
use crate::services::export_sink::FileExportSink;
use crate::services::geocoding::create_geocoder;
use crate::services::map_capture::create_map_capture;
use crate::services::onboarding::OnboardingService;
use crate::services::route_service::{RouteService, RouteServiceDeps};
use crate::services::routing::create_directions_provider_with_fallback;
use crate::services::session_cache::SessionCache;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs directory - use LOGS_DIR env var or default to ../logs (relative to worker)
    let logs_dir = std::env::var("LOGS_DIR").unwrap_or_else(|_| "../logs".to_string());
    std::fs::create_dir_all(&logs_dir).ok();

    // File appender for persistent logs (daily rotation)
    let file_appender = RollingFileAppender::new(Rotation::DAILY, &logs_dir, "worker.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // Initialize logging - both stdout and file
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,routopia_worker=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer()) // stdout
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false)) // file
        .init();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve().await,
        Command::Migrate => migrate().await,
        Command::DevToken { subject, email, hours } => dev_token(&subject, email.as_deref(), hours),
    }
}

async fn migrate() -> Result<()> {
    let config = Config::from_env()?;
    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;
    Ok(())
}

fn dev_token(subject: &str, email: Option<&str>, hours: Option<u64>) -> Result<()> {
    dotenvy::dotenv().ok();
    let secret = std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
    let ttl_secs = match hours {
        Some(hours) => usize::try_from(hours.saturating_mul(3600)).context("token lifetime too long")?,
        None => auth::DEFAULT_TOKEN_TTL_SECS,
    };

    let token = auth::generate_token(subject, email, ttl_secs, &secret)?;
    println!("{token}");
    Ok(())
}

async fn serve() -> Result<()> {
    info!("Starting Routopia Worker...");

    // Load configuration
    let config = Config::from_env()?;
    info!("Configuration loaded");

    // Connect to database
    let pool = db::create_pool(&config.database_url).await?;
    info!("Connected to PostgreSQL");

    // Run migrations
    db::run_migrations(&pool).await?;

    let store = Arc::new(PgStore::new(pool));

    let geocoder = create_geocoder(&config.geocoder_backend, &config.nominatim_url)
        .context("Failed to create geocoder")?;
    info!("Geocoder initialized: {}", geocoder.name());

    // Valhalla when reachable, mock directions otherwise
    let directions = create_directions_provider_with_fallback(config.valhalla_url.clone(), Arc::clone(&geocoder)).await;
    info!("Directions provider initialized: {}", directions.name());

    let map_capture = create_map_capture(config.map_capture_url.as_deref()).context("Failed to create map capture")?;
    info!("Map capture initialized: {}", map_capture.name());

    let routes = RouteService::new(RouteServiceDeps {
        store: store.clone(),
        directions,
        geocoder,
        map_capture: Arc::from(map_capture),
        export_sink: Arc::new(FileExportSink::new(config.export_dir.clone())),
    })
    .with_dwell_seconds(config.dwell_seconds_per_stop)
    .with_metrics_concurrency(config.metrics_concurrency);

    let clients = Arc::new(ClientService::new(store.clone()));
    let onboarding = Arc::new(OnboardingService::new(store.clone()));

    let sessions = Arc::new(SessionCache::new(config.jwt_secret.clone(), store.clone()));
    watch_secret_rotation(Arc::clone(&sessions))?;

    // Connect to NATS (supports optional NATS_USER/NATS_PASSWORD auth).
    let nats_client = match (std::env::var("NATS_USER"), std::env::var("NATS_PASSWORD")) {
        (Ok(user), Ok(password)) if !user.is_empty() => {
            async_nats::ConnectOptions::new()
                .user_and_password(user, password)
                .connect(&config.nats_url)
                .await?
        }
        _ => async_nats::connect(&config.nats_url).await?,
    };
    info!("Connected to NATS at {}", config.nats_url);

    // Start message handlers
    let handler_result = handlers::start_handlers(nats_client, sessions, Arc::new(routes), clients, onboarding).await;

    if let Err(e) = handler_result {
        error!("Handler error: {}", e);
        return Err(e);
    }

    Ok(())
}

/// Reload `JWT_SECRET` on SIGHUP and drop every cached session
#[cfg(unix)]
fn watch_secret_rotation(sessions: Arc<SessionCache>) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup()).context("Failed to register SIGHUP handler")?;
    tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            match Config::reload() {
                Ok(config) => {
                    sessions.rotate_secret(config.jwt_secret);
                }
                Err(e) => error!("Failed to reload configuration, keeping current secret: {:#}", e),
            }
        }
    });
    Ok(())
}

#[cfg(not(unix))]
fn watch_secret_rotation(_sessions: Arc<SessionCache>) -> Result<()> {
    Ok(())
}
