//! Ping handler for health checks

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::publish_json;
use crate::types::ErrorResponse;

#[derive(Debug, Default, Serialize, Deserialize)]
struct PingRequest {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PongResponse {
    message: String,
    service: String,
    version: String,
    timestamp: String,
}

fn pong(request: PingRequest) -> PongResponse {
    PongResponse {
        message: request
            .message
            .map(|m| format!("Pong: {}", m))
            .unwrap_or_else(|| "Pong".to_string()),
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    }
}

/// Handle ping messages. Needs no token.
pub async fn handle_ping(client: Client, mut subscriber: Subscriber) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received ping message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                error!("Ping message without reply subject");
                continue;
            }
        };

        // An empty body is a bare ping
        let request: PingRequest = if msg.payload.is_empty() {
            PingRequest::default()
        } else {
            match serde_json::from_slice(&msg.payload) {
                Ok(req) => req,
                Err(e) => {
                    error!("Failed to parse ping request: {}", e);
                    let error = ErrorResponse::new(
                        uuid::Uuid::nil(),
                        "INVALID_REQUEST",
                        format!("Failed to parse request: {}", e),
                    );
                    publish_json(&client, reply, &error).await?;
                    continue;
                }
            }
        };

        publish_json(&client, reply, &pong(request)).await?;
        debug!("Sent pong response");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pong_echoes_message() {
        let response = pong(PingRequest {
            message: Some("hello".to_string()),
        });
        assert_eq!(response.message, "Pong: hello");
        assert_eq!(response.service, "routopia-worker");
    }

    #[test]
    fn test_bare_pong() {
        assert_eq!(pong(PingRequest::default()).message, "Pong");
    }
}
