//! NATS message envelopes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::RouteError;

/// Generic request wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request<T> {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// Identity provider ID token
    #[serde(default)]
    pub token: Option<String>,
    pub payload: T,
}

impl<T> Request<T> {
    #[cfg(test)]
    pub fn with_token(token: String, payload: T) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            token: Some(token),
            payload,
        }
    }
}

/// Generic success response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessResponse<T> {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub payload: T,
}

impl<T> SuccessResponse<T> {
    pub fn new(request_id: Uuid, payload: T) -> Self {
        Self {
            id: request_id,
            timestamp: Utc::now(),
            payload,
        }
    }
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(request_id: Uuid, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: request_id,
            timestamp: Utc::now(),
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
            },
        }
    }

    pub fn from_route_error(request_id: Uuid, error: &RouteError) -> Self {
        Self::new(request_id, error.code(), error.to_string())
    }
}

/// Empty payload that accepts both `null` and `{}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmptyPayload {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_parses_camel_case_with_token() {
        let json = r#"{
            "id": "00000000-0000-0000-0000-000000000001",
            "timestamp": "2026-01-15T08:00:00Z",
            "token": "abc",
            "payload": {}
        }"#;
        let request: Request<EmptyPayload> = serde_json::from_str(json).unwrap();
        assert_eq!(request.token.as_deref(), Some("abc"));
    }

    #[test]
    fn test_request_token_is_optional() {
        let json = r#"{
            "id": "00000000-0000-0000-0000-000000000001",
            "timestamp": "2026-01-15T08:00:00Z",
            "payload": null
        }"#;
        let request: Request<Option<EmptyPayload>> = serde_json::from_str(json).unwrap();
        assert!(request.token.is_none());
    }

    #[test]
    fn test_error_response_carries_route_error_code() {
        let response = ErrorResponse::from_route_error(Uuid::nil(), &RouteError::NoLegs { stop_count: 3 });
        assert_eq!(response.error.code, "NO_LEGS");
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"code\":\"NO_LEGS\""));
    }
}
