//! Onboarding handlers
//!
//! These subjects accept a valid token whose subject has no user row yet,
//! so they verify the token directly instead of resolving a session.

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use tracing::{debug, warn};

use super::auth::SessionInfo;
use super::{parse_request, publish_json, reply_result};
use crate::auth;
use crate::error::RouteError;
use crate::services::onboarding::OnboardingService;
use crate::services::session_cache::SessionCache;
use crate::types::{EmptyPayload, OnboardRequest, OnboardingStatus, Request};

/// Handle auth.onboarding.status messages
pub async fn handle_status(
    client: Client,
    mut subscriber: Subscriber,
    sessions: Arc<SessionCache>,
    onboarding: Arc<OnboardingService>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received auth.onboarding.status message");

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

        let result = status(&sessions, &onboarding, &request).await;
        reply_result(&client, reply, "auth.onboarding.status", request.id, result).await?;
    }

    Ok(())
}

/// Handle auth.onboard messages. The reply is the new session.
pub async fn handle_onboard(
    client: Client,
    mut subscriber: Subscriber,
    sessions: Arc<SessionCache>,
    onboarding: Arc<OnboardingService>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received auth.onboard message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<OnboardRequest> = match parse_request(&msg.payload) {
            Ok(req) => req,
            Err(error) => {
                publish_json(&client, reply, &error).await?;
                continue;
            }
        };

        let result = onboard(&sessions, &onboarding, &request).await;
        reply_result(&client, reply, "auth.onboard", request.id, result).await?;
    }

    Ok(())
}

async fn status<T>(
    sessions: &SessionCache,
    onboarding: &OnboardingService,
    request: &Request<T>,
) -> Result<OnboardingStatus, RouteError> {
    let claims = sessions.verify(auth::extract_token(request)?)?;
    onboarding.status(&claims).await
}

async fn onboard(
    sessions: &SessionCache,
    onboarding: &OnboardingService,
    request: &Request<OnboardRequest>,
) -> Result<SessionInfo, RouteError> {
    let token = auth::extract_token(request)?;
    let claims = sessions.verify(token)?;
    onboarding.complete(&claims, &request.payload).await?;

    let session = sessions.resolve(token).await?;
    Ok(SessionInfo::from(session.as_ref()))
}
