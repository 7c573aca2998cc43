//! Session handlers for NATS messages

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{authorize, parse_request, publish_json, reply_result};
use crate::auth;
use crate::error::RouteError;
use crate::services::permissions::{AppPage, Capabilities};
use crate::services::route_service::RouteService;
use crate::services::session_cache::{Session, SessionCache};
use crate::types::{EmptyPayload, Request, Role};

/// What the client needs to render navigation and guard actions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub subject: String,
    pub email: Option<String>,
    pub organization_id: Uuid,
    pub role: Role,
    pub capabilities: Capabilities,
    pub pages: Vec<AppPage>,
}

impl From<&Session> for SessionInfo {
    fn from(session: &Session) -> Self {
        Self {
            subject: session.subject.clone(),
            email: session.email.clone(),
            organization_id: session.organization_id,
            role: session.role,
            capabilities: session.permissions.capabilities,
            pages: session.permissions.accessible_pages(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutResponse {
    /// False when the credential was not cached, e.g. already logged out
    pub logged_out: bool,
}

/// Handle auth.session messages
pub async fn handle_session(client: Client, mut subscriber: Subscriber, sessions: Arc<SessionCache>) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received auth.session message");

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

        let result = authorize(&sessions, &request)
            .await
            .map(|session| SessionInfo::from(session.as_ref()));

        reply_result(&client, reply, "auth.session", request.id, result).await?;
    }

    Ok(())
}

/// Handle auth.logout messages
///
/// Drops the cached session for the request's token so the next request
/// with it reloads the user from the database.
pub async fn handle_logout(
    client: Client,
    mut subscriber: Subscriber,
    sessions: Arc<SessionCache>,
    routes: Arc<RouteService>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received auth.logout message");

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

        let result = logout(&sessions, &routes, &request);
        reply_result(&client, reply, "auth.logout", request.id, result).await?;
    }

    Ok(())
}

fn logout<T>(sessions: &SessionCache, routes: &RouteService, request: &Request<T>) -> Result<LogoutResponse, RouteError> {
    let token = auth::extract_token(request)?;
    let removed = sessions.logout(token);
    routes.forget_viewer(token);
    Ok(LogoutResponse {
        logged_out: removed.is_some(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::generate_token;
    use crate::auth::tests::TEST_SECRET;
    use crate::db::store::memory::MemoryStore;
    use crate::services::export_sink::FileExportSink;
    use crate::services::geocoding::MockGeocoder;
    use crate::services::map_capture::DisabledMapCapture;
    use crate::services::route_service::RouteServiceDeps;
    use crate::services::routing::MockDirections;

    fn setup() -> (Arc<SessionCache>, RouteService, String) {
        let store = Arc::new(MemoryStore::default());
        store.add_user("auth0|alice", Uuid::from_u128(3), Role::Manager);
        let sessions = Arc::new(SessionCache::new(TEST_SECRET, store.clone()));
        let geocoder = Arc::new(MockGeocoder::new());
        let routes = RouteService::new(RouteServiceDeps {
            store,
            directions: Arc::new(MockDirections::new(geocoder.clone())),
            geocoder,
            map_capture: Arc::new(DisabledMapCapture),
            export_sink: Arc::new(FileExportSink::new(std::env::temp_dir())),
        });
        let token = generate_token("auth0|alice", None, 3600, TEST_SECRET).unwrap();
        (sessions, routes, token)
    }

    fn request(token: &str) -> Request<Option<EmptyPayload>> {
        Request::with_token(token.to_string(), None)
    }

    #[tokio::test]
    async fn test_session_info_lists_role_pages() {
        let (sessions, _, token) = setup();
        let session = authorize(&sessions, &request(&token)).await.unwrap();
        let info = SessionInfo::from(session.as_ref());

        assert_eq!(info.role, Role::Manager);
        assert!(info.capabilities.routes.view_all);
        assert!(info.pages.contains(&AppPage::Analytics));
        assert!(!info.pages.contains(&AppPage::Organization));

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["organizationId"], "00000000-0000-0000-0000-000000000003");
    }

    #[tokio::test]
    async fn test_logout_clears_cached_session() {
        let (sessions, routes, token) = setup();
        authorize(&sessions, &request(&token)).await.unwrap();
        assert_eq!(sessions.len(), 1);

        let response = logout(&sessions, &routes, &request(&token)).unwrap();
        assert!(response.logged_out);
        assert!(sessions.is_empty());

        let again = logout(&sessions, &routes, &request(&token)).unwrap();
        assert!(!again.logged_out);
    }

    #[test]
    fn test_logout_without_token_is_unauthorized() {
        let (sessions, routes, _) = setup();
        let request: Request<Option<EmptyPayload>> = Request {
            token: None,
            ..request("unused")
        };
        let err = logout(&sessions, &routes, &request).unwrap_err();
        assert!(matches!(err, RouteError::Unauthorized(_)));
    }
}
