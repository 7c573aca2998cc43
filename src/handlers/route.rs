//! Route message handlers
//!
//! Every subject authorizes the request's token through the session cache
//! and delegates to [`RouteService`].

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use tracing::{debug, warn};

use super::{authorize, parse_request, publish_json, reply_result};
use crate::error::RouteError;
use crate::services::route_service::RouteService;
use crate::services::session_cache::SessionCache;
use crate::types::{
    CreateRouteRequest, DeleteRouteResponse, DirectionsLinkResponse, EmptyPayload, Request,
    RouteIdRequest, UpdateRouteRequest,
};

/// Handle route.list messages
pub async fn handle_list(
    client: Client,
    mut subscriber: Subscriber,
    sessions: Arc<SessionCache>,
    routes: Arc<RouteService>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received route.list message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<Option<EmptyPayload>> = match parse_request(&msg.payload) {
            Ok(req) => req,
            Err(error) => {
                publish_json(&client, reply, &error).await?;
                continue;
            }
        };

        let result = async {
            let session = authorize(&sessions, &request).await?;
            routes.list_routes(&session).await
        }
        .await;

        reply_result(&client, reply, "route.list", request.id, result).await?;
    }

    Ok(())
}

/// Handle route.create messages
pub async fn handle_create(
    client: Client,
    mut subscriber: Subscriber,
    sessions: Arc<SessionCache>,
    routes: Arc<RouteService>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received route.create message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<CreateRouteRequest> = match parse_request(&msg.payload) {
            Ok(req) => req,
            Err(error) => {
                publish_json(&client, reply, &error).await?;
                continue;
            }
        };

        let result = async {
            let session = authorize(&sessions, &request).await?;
            let payload = &request.payload;
            routes
                .create_route(&session, &payload.route_name, payload.addresses.clone())
                .await
        }
        .await;

        reply_result(&client, reply, "route.create", request.id, result).await?;
    }

    Ok(())
}

/// Handle route.update messages. The reply carries the stored row.
pub async fn handle_update(
    client: Client,
    mut subscriber: Subscriber,
    sessions: Arc<SessionCache>,
    routes: Arc<RouteService>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received route.update message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<UpdateRouteRequest> = match parse_request(&msg.payload) {
            Ok(req) => req,
            Err(error) => {
                publish_json(&client, reply, &error).await?;
                continue;
            }
        };

        let result = async {
            let session = authorize(&sessions, &request).await?;
            let payload = &request.payload;
            routes
                .update_route(
                    &session,
                    payload.route_id,
                    &payload.route_name,
                    payload.addresses.clone(),
                )
                .await
        }
        .await;

        reply_result(&client, reply, "route.update", request.id, result).await?;
    }

    Ok(())
}

/// Handle route.delete messages
pub async fn handle_delete(
    client: Client,
    mut subscriber: Subscriber,
    sessions: Arc<SessionCache>,
    routes: Arc<RouteService>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received route.delete message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<RouteIdRequest> = match parse_request(&msg.payload) {
            Ok(req) => req,
            Err(error) => {
                publish_json(&client, reply, &error).await?;
                continue;
            }
        };

        let route_id = request.payload.route_id;
        let result = async {
            let session = authorize(&sessions, &request).await?;
            routes.delete_route(&session, route_id).await?;
            Ok::<_, RouteError>(DeleteRouteResponse { route_id, deleted: true })
        }
        .await;

        reply_result(&client, reply, "route.delete", request.id, result).await?;
    }

    Ok(())
}

/// Handle route.view messages
///
/// Replies `{"status": "superseded"}` when the same client selected another
/// route before this one finished.
pub async fn handle_view(
    client: Client,
    mut subscriber: Subscriber,
    sessions: Arc<SessionCache>,
    routes: Arc<RouteService>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received route.view message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<RouteIdRequest> = match parse_request(&msg.payload) {
            Ok(req) => req,
            Err(error) => {
                publish_json(&client, reply, &error).await?;
                continue;
            }
        };

        // Views of different routes overlap; each runs on its own task so a
        // slow provider call does not hold up the next selection
        let client = client.clone();
        let sessions = Arc::clone(&sessions);
        let routes = Arc::clone(&routes);
        tokio::spawn(async move {
            let result = async {
                let session = authorize(&sessions, &request).await?;
                let viewer = crate::auth::extract_token(&request)?;
                routes.view_route(&session, viewer, request.payload.route_id).await
            }
            .await;

            if let Err(e) = reply_result(&client, reply, "route.view", request.id, result).await {
                warn!("Failed to reply to route.view: {}", e);
            }
        });
    }

    Ok(())
}

/// Handle route.metrics.all messages
pub async fn handle_metrics_all(
    client: Client,
    mut subscriber: Subscriber,
    sessions: Arc<SessionCache>,
    routes: Arc<RouteService>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received route.metrics.all message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<Option<EmptyPayload>> = match parse_request(&msg.payload) {
            Ok(req) => req,
            Err(error) => {
                publish_json(&client, reply, &error).await?;
                continue;
            }
        };

        let result = async {
            let session = authorize(&sessions, &request).await?;
            routes.compute_all_metrics(&session).await
        }
        .await;

        reply_result(&client, reply, "route.metrics.all", request.id, result).await?;
    }

    Ok(())
}

/// Handle route.export messages
pub async fn handle_export(
    client: Client,
    mut subscriber: Subscriber,
    sessions: Arc<SessionCache>,
    routes: Arc<RouteService>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received route.export message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<RouteIdRequest> = match parse_request(&msg.payload) {
            Ok(req) => req,
            Err(error) => {
                publish_json(&client, reply, &error).await?;
                continue;
            }
        };

        let result = async {
            let session = authorize(&sessions, &request).await?;
            routes.export_route(&session, request.payload.route_id).await
        }
        .await;

        reply_result(&client, reply, "route.export", request.id, result).await?;
    }

    Ok(())
}

/// Handle route.link messages
pub async fn handle_link(
    client: Client,
    mut subscriber: Subscriber,
    sessions: Arc<SessionCache>,
    routes: Arc<RouteService>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received route.link message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<RouteIdRequest> = match parse_request(&msg.payload) {
            Ok(req) => req,
            Err(error) => {
                publish_json(&client, reply, &error).await?;
                continue;
            }
        };

        let route_id = request.payload.route_id;
        let result = async {
            let session = authorize(&sessions, &request).await?;
            let url = routes.directions_link(&session, route_id).await?;
            Ok::<_, RouteError>(DirectionsLinkResponse { route_id, url })
        }
        .await;

        reply_result(&client, reply, "route.link", request.id, result).await?;
    }

    Ok(())
}
