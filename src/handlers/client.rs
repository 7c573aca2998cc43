//! Client message handlers

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use tracing::{debug, warn};

use super::{authorize, parse_request, publish_json, reply_result};
use crate::error::RouteError;
use crate::services::client_service::ClientService;
use crate::services::session_cache::SessionCache;
use crate::types::{ClientIdRequest, ClientInput, DeleteClientResponse, EmptyPayload, Request, UpdateClientRequest};

/// Handle client.list messages
pub async fn handle_list(
    client: Client,
    mut subscriber: Subscriber,
    sessions: Arc<SessionCache>,
    clients: Arc<ClientService>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received client.list message");

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
            clients.list_clients(&session).await
        }
        .await;

        reply_result(&client, reply, "client.list", request.id, result).await?;
    }

    Ok(())
}

/// Handle client.create messages
pub async fn handle_create(
    client: Client,
    mut subscriber: Subscriber,
    sessions: Arc<SessionCache>,
    clients: Arc<ClientService>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received client.create message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<ClientInput> = match parse_request(&msg.payload) {
            Ok(req) => req,
            Err(error) => {
                publish_json(&client, reply, &error).await?;
                continue;
            }
        };

        let result = async {
            let session = authorize(&sessions, &request).await?;
            clients.create_client(&session, &request.payload).await
        }
        .await;

        reply_result(&client, reply, "client.create", request.id, result).await?;
    }

    Ok(())
}

/// Handle client.update messages. The reply carries the stored row.
pub async fn handle_update(
    client: Client,
    mut subscriber: Subscriber,
    sessions: Arc<SessionCache>,
    clients: Arc<ClientService>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received client.update message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<UpdateClientRequest> = match parse_request(&msg.payload) {
            Ok(req) => req,
            Err(error) => {
                publish_json(&client, reply, &error).await?;
                continue;
            }
        };

        let result = async {
            let session = authorize(&sessions, &request).await?;
            let payload = &request.payload;
            clients.update_client(&session, payload.client_id, &payload.client).await
        }
        .await;

        reply_result(&client, reply, "client.update", request.id, result).await?;
    }

    Ok(())
}

/// Handle client.delete messages
pub async fn handle_delete(
    client: Client,
    mut subscriber: Subscriber,
    sessions: Arc<SessionCache>,
    clients: Arc<ClientService>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received client.delete message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<ClientIdRequest> = match parse_request(&msg.payload) {
            Ok(req) => req,
            Err(error) => {
                publish_json(&client, reply, &error).await?;
                continue;
            }
        };

        let client_id = request.payload.client_id;
        let result = async {
            let session = authorize(&sessions, &request).await?;
            clients.delete_client(&session, client_id).await?;
            Ok::<_, RouteError>(DeleteClientResponse { client_id, deleted: true })
        }
        .await;

        reply_result(&client, reply, "client.delete", request.id, result).await?;
    }

    Ok(())
}
