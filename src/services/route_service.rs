//! Route operations behind the NATS handlers
//!
//! Every operation runs on behalf of a resolved [`Session`]: permissions
//! decide what may be touched, the data scope decides what may be listed.
//! Optimized order and metrics are recomputed per view and never stored.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::{NewRoute, RouteStore};
use crate::defaults::{DEFAULT_DWELL_SECONDS_PER_STOP, DEFAULT_METRICS_CONCURRENCY};
use crate::error::RouteError;
use crate::services::export::{format, paginate};
use crate::services::export_sink::{ExportArtifact, ExportDocument, ExportSink};
use crate::services::geocoding::{route_center, Geocoder};
use crate::services::link::build_directions_link;
use crate::services::map_capture::{MapCapture, MapCaptureRequest};
use crate::services::metrics::{
    aggregate, average_duration, RouteMetrics, PLACEHOLDER_DISTANCE, PLACEHOLDER_DURATION,
};
use crate::services::metrics_cache::{MetricsCache, ViewTracker};
use crate::services::routing::DirectionsProvider;
use crate::services::sequencer::sequence;
use crate::services::session_cache::Session;
use crate::types::{
    validate_route_input, Coordinates, DirectionsRequest, DirectionsResult, Route, RouteRecord,
    SequencedRoute,
};

/// A route row as listed, with cached metrics and what the viewer may do
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteListItem {
    #[serde(flatten)]
    pub route: RouteRecord,
    /// Cached duration or "Calculating..."
    pub duration: String,
    pub can_edit: bool,
    pub can_delete: bool,
}

/// Everything the map view needs for one route
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteView {
    pub route_id: Uuid,
    pub route: SequencedRoute,
    pub metrics: RouteMetrics,
    pub duration: String,
    pub distance: String,
    pub directions: DirectionsResult,
    pub center: Coordinates,
    pub directions_link: String,
}

/// Result of a view request. A view that finished after a newer view by
/// the same viewer is reported as superseded and carries no data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ViewOutcome {
    Applied(Box<RouteView>),
    #[serde(rename_all = "camelCase")]
    Superseded { route_id: Uuid },
}

/// Metrics of one route in a "compute all" run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteMetricsEntry {
    pub route_id: Uuid,
    pub metrics: Option<RouteMetrics>,
    pub duration: String,
    pub distance: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllMetrics {
    pub routes: Vec<RouteMetricsEntry>,
    pub average_duration: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportResult {
    pub artifact: ExportArtifact,
    pub page_count: usize,
}

/// Optimized order plus derived metrics for one route
struct Optimized {
    directions: DirectionsResult,
    sequenced: SequencedRoute,
    metrics: RouteMetrics,
}

/// Collaborators the service needs
pub struct RouteServiceDeps {
    pub store: Arc<dyn RouteStore>,
    pub directions: Arc<dyn DirectionsProvider>,
    pub geocoder: Arc<dyn Geocoder>,
    pub map_capture: Arc<dyn MapCapture>,
    pub export_sink: Arc<dyn ExportSink>,
}

pub struct RouteService {
    store: Arc<dyn RouteStore>,
    directions: Arc<dyn DirectionsProvider>,
    geocoder: Arc<dyn Geocoder>,
    map_capture: Arc<dyn MapCapture>,
    export_sink: Arc<dyn ExportSink>,
    metrics_cache: MetricsCache,
    views: ViewTracker,
    dwell_seconds_per_stop: u64,
    metrics_concurrency: usize,
}

impl RouteService {
    pub fn new(deps: RouteServiceDeps) -> Self {
        Self {
            store: deps.store,
            directions: deps.directions,
            geocoder: deps.geocoder,
            map_capture: deps.map_capture,
            export_sink: deps.export_sink,
            metrics_cache: MetricsCache::new(),
            views: ViewTracker::new(),
            dwell_seconds_per_stop: DEFAULT_DWELL_SECONDS_PER_STOP,
            metrics_concurrency: DEFAULT_METRICS_CONCURRENCY,
        }
    }

    pub fn with_dwell_seconds(mut self, dwell_seconds_per_stop: u64) -> Self {
        self.dwell_seconds_per_stop = dwell_seconds_per_stop;
        self
    }

    pub fn with_metrics_concurrency(mut self, concurrency: usize) -> Self {
        self.metrics_concurrency = concurrency.max(1);
        self
    }

    pub fn metrics_cache(&self) -> &MetricsCache {
        &self.metrics_cache
    }

    /// Drop per-viewer state when a credential is logged out
    pub fn forget_viewer(&self, token: &str) {
        self.views.forget(token);
    }

    // ---- CRUD ----

    pub async fn list_routes(&self, session: &Session) -> Result<Vec<RouteListItem>, RouteError> {
        let scope = session.permissions.route_scope();
        let records = self.store.list(&scope).await?;

        Ok(records
            .into_iter()
            .map(|route| RouteListItem {
                duration: self.metrics_cache.duration_display(&route.id),
                can_edit: session.permissions.can_edit_route(&route),
                can_delete: session.permissions.can_delete_route(&route),
                route,
            })
            .collect())
    }

    pub async fn create_route(
        &self,
        session: &Session,
        route_name: &str,
        addresses: Vec<String>,
    ) -> Result<RouteRecord, RouteError> {
        if !session.permissions.capabilities.routes.create {
            return Err(RouteError::Forbidden("You cannot create routes".to_string()));
        }
        validate_route_input(route_name, &addresses)?;

        let record = self
            .store
            .insert(NewRoute {
                organization_id: session.organization_id,
                user_id: session.subject.clone(),
                route_name: route_name.trim().to_string(),
                addresses,
            })
            .await?;

        info!("Route {} created by {}", record.id, session.subject);
        Ok(record)
    }

    /// Replace a route's name and addresses. The stored row is returned as
    /// the source of truth.
    pub async fn update_route(
        &self,
        session: &Session,
        route_id: Uuid,
        route_name: &str,
        addresses: Vec<String>,
    ) -> Result<RouteRecord, RouteError> {
        let existing = self.load(route_id).await?;
        if !session.permissions.can_edit_route(&existing) {
            return Err(RouteError::Forbidden("You cannot edit this route".to_string()));
        }
        validate_route_input(route_name, &addresses)?;

        let updated = self
            .store
            .update(route_id, route_name.trim(), &addresses)
            .await?
            .ok_or(RouteError::NotFound)?;

        self.metrics_cache.invalidate(&route_id);
        info!("Route {} updated by {}", route_id, session.subject);
        Ok(updated)
    }

    pub async fn delete_route(&self, session: &Session, route_id: Uuid) -> Result<(), RouteError> {
        let existing = self.load(route_id).await?;
        if !session.permissions.can_delete_route(&existing) {
            return Err(RouteError::Forbidden("You cannot delete this route".to_string()));
        }

        if !self.store.delete(route_id).await? {
            return Err(RouteError::NotFound);
        }

        self.metrics_cache.invalidate(&route_id);
        info!("Route {} deleted by {}", route_id, session.subject);
        Ok(())
    }

    // ---- Sequencing, metrics, export ----

    /// Optimize and describe a route for the map view.
    ///
    /// `viewer` identifies the client making the selection (its
    /// credential); only that viewer's newest selection is applied.
    pub async fn view_route(
        &self,
        session: &Session,
        viewer: &str,
        route_id: Uuid,
    ) -> Result<ViewOutcome, RouteError> {
        // Taken before any await so the latest request always holds the newest ticket
        let ticket = self.views.begin(viewer);
        let stamp = self.metrics_cache.stamp();

        let record = self.load_visible(session, route_id).await?;
        let optimized = self.optimize(&record.to_route()).await?;

        // A stale selection still yields a correct entry, unless the route
        // itself changed while the provider was working
        if !self.metrics_cache.insert(route_id, stamp, optimized.metrics) {
            debug!("Route {} changed during view, metrics not cached", route_id);
        }

        let center = route_center(
            self.geocoder.as_ref(),
            &optimized.sequenced.stops,
            Some(&optimized.directions),
        )
        .await;

        if !self.views.is_current(&ticket) {
            debug!("Discarding stale view of route {} for {}", route_id, session.subject);
            return Ok(ViewOutcome::Superseded { route_id });
        }

        let directions_link = build_directions_link(&optimized.sequenced.stops)?;

        Ok(ViewOutcome::Applied(Box::new(RouteView {
            route_id,
            duration: optimized.metrics.duration_display(),
            distance: optimized.metrics.distance_display(),
            metrics: optimized.metrics,
            route: optimized.sequenced,
            directions: optimized.directions,
            center,
            directions_link,
        })))
    }

    /// Compute metrics for every route in the session's scope.
    ///
    /// Failures are logged and shown as placeholders; they never abort the
    /// batch. The average covers only routes that resolved.
    pub async fn compute_all_metrics(&self, session: &Session) -> Result<AllMetrics, RouteError> {
        let scope = session.permissions.route_scope();
        let stamp = self.metrics_cache.stamp();
        let records = self.store.list(&scope).await?;

        let entries: Vec<RouteMetricsEntry> = stream::iter(records)
            .map(|record| async move {
                let route_id = record.id;
                match self.optimize(&record.to_route()).await {
                    Ok(optimized) => {
                        if !self.metrics_cache.insert(route_id, stamp, optimized.metrics) {
                            debug!("Route {} changed during metrics run, not cached", route_id);
                        }
                        RouteMetricsEntry {
                            route_id,
                            metrics: Some(optimized.metrics),
                            duration: optimized.metrics.duration_display(),
                            distance: optimized.metrics.distance_display(),
                        }
                    }
                    Err(e) => {
                        warn!("Failed to compute metrics for route {}: {}", route_id, e);
                        RouteMetricsEntry {
                            route_id,
                            metrics: None,
                            duration: PLACEHOLDER_DURATION.to_string(),
                            distance: PLACEHOLDER_DISTANCE.to_string(),
                        }
                    }
                }
            })
            .buffer_unordered(self.metrics_concurrency)
            .collect()
            .await;

        let resolved: Vec<RouteMetrics> = entries.iter().filter_map(|e| e.metrics).collect();
        let average_duration = average_duration(&resolved);

        info!(
            "Computed metrics for {}/{} routes of {}",
            resolved.len(),
            entries.len(),
            session.subject
        );

        Ok(AllMetrics {
            routes: entries,
            average_duration,
        })
    }

    /// Lay out, capture and write the export for a route. Any failure,
    /// including the map capture, aborts before anything is written.
    pub async fn export_route(&self, session: &Session, route_id: Uuid) -> Result<ExportResult, RouteError> {
        let record = self.load_visible(session, route_id).await?;
        let route = record.to_route();

        // A route without a destination is exported as entered, without directions
        let optimized = if route.stops.len() < 2 {
            let directions = DirectionsResult {
                legs: vec![],
                waypoint_order: vec![],
                bounds: None,
                geometry: vec![],
            };
            let metrics = aggregate(&directions, route.stops.len(), self.dwell_seconds_per_stop)?;
            Optimized {
                sequenced: SequencedRoute {
                    name: route.name.clone(),
                    stops: route.stops.clone(),
                },
                directions,
                metrics,
            }
        } else {
            self.optimize(&route).await?
        };

        let blocks = format(&optimized.sequenced, &optimized.metrics, &optimized.directions)?;
        let pages = paginate(&blocks);

        let center = route_center(
            self.geocoder.as_ref(),
            &optimized.sequenced.stops,
            Some(&optimized.directions),
        )
        .await;
        let capture = MapCaptureRequest::for_export(
            center,
            optimized.directions.geometry.clone(),
            optimized.sequenced.stops.clone(),
        );
        let png = self.map_capture.capture(&capture).await?;

        let page_count = pages.len();
        let document = ExportDocument::new(
            record.organization_id,
            route_id,
            &optimized.sequenced.name,
            pages,
            &png,
        );
        let artifact = self.export_sink.write(&document).await?;

        info!("Route {} exported by {} ({} pages)", route_id, session.subject, page_count);
        Ok(ExportResult { artifact, page_count })
    }

    /// Shareable driving directions link in optimized order
    pub async fn directions_link(&self, session: &Session, route_id: Uuid) -> Result<String, RouteError> {
        let record = self.load_visible(session, route_id).await?;
        let optimized = self.optimize(&record.to_route()).await?;
        build_directions_link(&optimized.sequenced.stops)
    }

    // ---- internals ----

    async fn load(&self, route_id: Uuid) -> Result<RouteRecord, RouteError> {
        self.store.get(route_id).await?.ok_or(RouteError::NotFound)
    }

    async fn load_visible(&self, session: &Session, route_id: Uuid) -> Result<RouteRecord, RouteError> {
        let record = self.load(route_id).await?;
        if !session.permissions.can_view_route(&record) {
            return Err(RouteError::Forbidden("You cannot view this route".to_string()));
        }
        Ok(record)
    }

    async fn optimize(&self, route: &Route) -> Result<Optimized, RouteError> {
        let request = DirectionsRequest::for_route(route)?;
        let directions = self.directions.directions(&request).await?;
        let sequenced = sequence(route, &directions)?;
        let metrics = aggregate(&directions, sequenced.stop_count(), self.dwell_seconds_per_stop)?;

        debug!(
            "Route '{}' sequenced via {}: {} stops, {} s",
            route.name,
            self.directions.name(),
            metrics.stop_count,
            metrics.total_duration_seconds
        );

        Ok(Optimized {
            directions,
            sequenced,
            metrics,
        })
    }
}
