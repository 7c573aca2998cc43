//! NATS message handlers

pub mod auth;
pub mod client;
pub mod onboarding;
pub mod ping;
pub mod route;

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subject};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::select;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::RouteError;
use crate::services::client_service::ClientService;
use crate::services::onboarding::OnboardingService;
use crate::services::route_service::RouteService;
use crate::services::session_cache::{Session, SessionCache};
use crate::types::{ErrorResponse, Request, SuccessResponse};

/// Parse a request envelope. Malformed payloads become an
/// `INVALID_REQUEST` error addressed to the nil id.
pub(crate) fn parse_request<T: DeserializeOwned>(payload: &[u8]) -> Result<Request<T>, ErrorResponse> {
    serde_json::from_slice(payload).map_err(|e| {
        error!("Failed to parse request: {}", e);
        ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string())
    })
}

/// Resolve the session behind a request's token
pub(crate) async fn authorize<T>(sessions: &SessionCache, request: &Request<T>) -> Result<Arc<Session>, RouteError> {
    let token = crate::auth::extract_token(request)?;
    sessions.resolve(token).await
}

/// Serialize an operation outcome into its response envelope
pub(crate) fn response_bytes<T: Serialize>(
    request_id: Uuid,
    result: &Result<T, RouteError>,
) -> serde_json::Result<Vec<u8>> {
    match result {
        Ok(payload) => serde_json::to_vec(&SuccessResponse::new(request_id, payload)),
        Err(e) => serde_json::to_vec(&ErrorResponse::from_route_error(request_id, e)),
    }
}

/// Publish a JSON payload. A failed publish is logged, not fatal.
pub(crate) async fn publish_json<T: Serialize>(client: &Client, reply: Subject, payload: &T) -> Result<()> {
    let bytes = serde_json::to_vec(payload)?;
    if let Err(e) = client.publish(reply, bytes.into()).await {
        error!("Failed to publish reply: {}", e);
    }
    Ok(())
}

/// Publish the outcome of an operation received on `subject`
pub(crate) async fn reply_result<T: Serialize>(
    client: &Client,
    reply: Subject,
    subject: &str,
    request_id: Uuid,
    result: Result<T, RouteError>,
) -> Result<()> {
    if let Err(e) = &result {
        match e {
            RouteError::Storage(_) | RouteError::Provider(_) | RouteError::ExportFailed(_) => {
                error!("{} failed: {}", subject, e)
            }
            _ => warn!("{} rejected: {}", subject, e),
        }
    }

    let bytes = response_bytes(request_id, &result)?;
    if let Err(e) = client.publish(reply, bytes.into()).await {
        error!("Failed to publish {} reply: {}", subject, e);
    }
    Ok(())
}

/// Start all message handlers
pub async fn start_handlers(
    client: Client,
    sessions: Arc<SessionCache>,
    routes: Arc<RouteService>,
    clients: Arc<ClientService>,
    onboarding: Arc<OnboardingService>,
) -> Result<()> {
    info!("Starting message handlers...");

    let ping_sub = client.subscribe("routopia.ping").await?;

    // Auth subjects
    let auth_session_sub = client.subscribe("routopia.auth.session").await?;
    let auth_logout_sub = client.subscribe("routopia.auth.logout").await?;
    let auth_onboarding_status_sub = client.subscribe("routopia.auth.onboarding.status").await?;
    let auth_onboard_sub = client.subscribe("routopia.auth.onboard").await?;

    // Client subjects
    let client_list_sub = client.subscribe("routopia.client.list").await?;
    let client_create_sub = client.subscribe("routopia.client.create").await?;
    let client_update_sub = client.subscribe("routopia.client.update").await?;
    let client_delete_sub = client.subscribe("routopia.client.delete").await?;

    // Route subjects
    let route_list_sub = client.subscribe("routopia.route.list").await?;
    let route_create_sub = client.subscribe("routopia.route.create").await?;
    let route_update_sub = client.subscribe("routopia.route.update").await?;
    let route_delete_sub = client.subscribe("routopia.route.delete").await?;
    let route_view_sub = client.subscribe("routopia.route.view").await?;
    let route_metrics_all_sub = client.subscribe("routopia.route.metrics.all").await?;
    let route_export_sub = client.subscribe("routopia.route.export").await?;
    let route_link_sub = client.subscribe("routopia.route.link").await?;

    info!("Subscribed to NATS subjects");

    let ping_handle = tokio::spawn(ping::handle_ping(client.clone(), ping_sub));

    let auth_session_handle = tokio::spawn(auth::handle_session(
        client.clone(),
        auth_session_sub,
        Arc::clone(&sessions),
    ));
    let auth_logout_handle = tokio::spawn(auth::handle_logout(
        client.clone(),
        auth_logout_sub,
        Arc::clone(&sessions),
        Arc::clone(&routes),
    ));
    let auth_onboarding_status_handle = tokio::spawn(onboarding::handle_status(
        client.clone(),
        auth_onboarding_status_sub,
        Arc::clone(&sessions),
        Arc::clone(&onboarding),
    ));
    let auth_onboard_handle = tokio::spawn(onboarding::handle_onboard(
        client.clone(),
        auth_onboard_sub,
        Arc::clone(&sessions),
        onboarding,
    ));

    let client_list_handle = tokio::spawn(client::handle_list(
        client.clone(),
        client_list_sub,
        Arc::clone(&sessions),
        Arc::clone(&clients),
    ));
    let client_create_handle = tokio::spawn(client::handle_create(
        client.clone(),
        client_create_sub,
        Arc::clone(&sessions),
        Arc::clone(&clients),
    ));
    let client_update_handle = tokio::spawn(client::handle_update(
        client.clone(),
        client_update_sub,
        Arc::clone(&sessions),
        Arc::clone(&clients),
    ));
    let client_delete_handle = tokio::spawn(client::handle_delete(
        client.clone(),
        client_delete_sub,
        Arc::clone(&sessions),
        clients,
    ));

    let route_list_handle = tokio::spawn(route::handle_list(
        client.clone(),
        route_list_sub,
        Arc::clone(&sessions),
        Arc::clone(&routes),
    ));
    let route_create_handle = tokio::spawn(route::handle_create(
        client.clone(),
        route_create_sub,
        Arc::clone(&sessions),
        Arc::clone(&routes),
    ));
    let route_update_handle = tokio::spawn(route::handle_update(
        client.clone(),
        route_update_sub,
        Arc::clone(&sessions),
        Arc::clone(&routes),
    ));
    let route_delete_handle = tokio::spawn(route::handle_delete(
        client.clone(),
        route_delete_sub,
        Arc::clone(&sessions),
        Arc::clone(&routes),
    ));
    let route_view_handle = tokio::spawn(route::handle_view(
        client.clone(),
        route_view_sub,
        Arc::clone(&sessions),
        Arc::clone(&routes),
    ));
    let route_metrics_all_handle = tokio::spawn(route::handle_metrics_all(
        client.clone(),
        route_metrics_all_sub,
        Arc::clone(&sessions),
        Arc::clone(&routes),
    ));
    let route_export_handle = tokio::spawn(route::handle_export(
        client.clone(),
        route_export_sub,
        Arc::clone(&sessions),
        Arc::clone(&routes),
    ));
    let route_link_handle = tokio::spawn(route::handle_link(client, route_link_sub, sessions, routes));

    info!("All handlers started, waiting for messages...");

    // Wait for any handler to finish (which would indicate an error)
    select! {
        result = ping_handle => {
            error!("Ping handler finished: {:?}", result);
        }
        result = auth_session_handle => {
            error!("Auth session handler finished: {:?}", result);
        }
        result = auth_logout_handle => {
            error!("Auth logout handler finished: {:?}", result);
        }
        result = auth_onboarding_status_handle => {
            error!("Onboarding status handler finished: {:?}", result);
        }
        result = auth_onboard_handle => {
            error!("Onboard handler finished: {:?}", result);
        }
        result = client_list_handle => {
            error!("Client list handler finished: {:?}", result);
        }
        result = client_create_handle => {
            error!("Client create handler finished: {:?}", result);
        }
        result = client_update_handle => {
            error!("Client update handler finished: {:?}", result);
        }
        result = client_delete_handle => {
            error!("Client delete handler finished: {:?}", result);
        }
        result = route_list_handle => {
            error!("Route list handler finished: {:?}", result);
        }
        result = route_create_handle => {
            error!("Route create handler finished: {:?}", result);
        }
        result = route_update_handle => {
            error!("Route update handler finished: {:?}", result);
        }
        result = route_delete_handle => {
            error!("Route delete handler finished: {:?}", result);
        }
        result = route_view_handle => {
            error!("Route view handler finished: {:?}", result);
        }
        result = route_metrics_all_handle => {
            error!("Route metrics handler finished: {:?}", result);
        }
        result = route_export_handle => {
            error!("Route export handler finished: {:?}", result);
        }
        result = route_link_handle => {
            error!("Route link handler finished: {:?}", result);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::generate_token;
    use crate::auth::tests::TEST_SECRET;
    use crate::db::store::memory::MemoryStore;
    use crate::types::{EmptyPayload, Role};
    use tokio_test::assert_ok;

    fn request(token: Option<String>) -> Request<EmptyPayload> {
        Request {
            id: Uuid::from_u128(1),
            timestamp: chrono::Utc::now(),
            token,
            payload: EmptyPayload {},
        }
    }

    #[test]
    fn test_malformed_payload_is_invalid_request() {
        let err = parse_request::<EmptyPayload>(b"{not json").unwrap_err();
        assert_eq!(err.id, Uuid::nil());
        assert_eq!(err.error.code, "INVALID_REQUEST");
    }

    #[test]
    fn test_response_bytes_success_envelope() {
        let result: Result<u32, RouteError> = Ok(7);
        let value: serde_json::Value =
            serde_json::from_slice(&response_bytes(Uuid::from_u128(3), &result).unwrap()).unwrap();
        assert_eq!(value["payload"], 7);
        assert_eq!(value["id"], "00000000-0000-0000-0000-000000000003");
    }

    #[test]
    fn test_response_bytes_error_envelope() {
        let result: Result<u32, RouteError> = Err(RouteError::InsufficientStops { found: 1 });
        let value: serde_json::Value =
            serde_json::from_slice(&response_bytes(Uuid::nil(), &result).unwrap()).unwrap();
        assert_eq!(value["error"]["code"], "INSUFFICIENT_STOPS");
        assert!(value.get("payload").is_none());
    }

    #[tokio::test]
    async fn test_authorize_requires_token() {
        let sessions = SessionCache::new(TEST_SECRET, Arc::new(MemoryStore::default()));
        let err = authorize(&sessions, &request(None)).await.unwrap_err();
        assert_eq!(err.code(), "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_authorize_resolves_session() {
        let store = Arc::new(MemoryStore::default());
        store.add_user("auth0|alice", Uuid::from_u128(5), Role::Admin);
        let sessions = SessionCache::new(TEST_SECRET, store);
        let token = generate_token("auth0|alice", None, 3600, TEST_SECRET).unwrap();

        let session = assert_ok!(authorize(&sessions, &request(Some(token))).await);
        assert_eq!(session.role, Role::Admin);
        assert_eq!(session.organization_id, Uuid::from_u128(5));
    }
}
