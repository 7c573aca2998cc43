//! Authentication utilities: identity token validation and issuing

use anyhow::Result;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::RouteError;
use crate::types::Request;

/// Default lifetime of issued tokens: 8 hours (working day)
pub const DEFAULT_TOKEN_TTL_SECS: usize = 8 * 60 * 60;

/// JWT claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Identity provider subject, e.g. "auth0|64f..."
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Issued at (unix timestamp)
    pub iat: usize,
    /// Expiration (unix timestamp)
    pub exp: usize,
}

/// Issue a token for a subject. Used for local development and tests;
/// production tokens come from the identity provider.
pub fn generate_token(subject: &str, email: Option<&str>, ttl_secs: usize, secret: &str) -> Result<String> {
    let now = chrono::Utc::now().timestamp() as usize;

    let claims = Claims {
        sub: subject.to_string(),
        email: email.map(str::to_string),
        iat: now,
        exp: now + ttl_secs,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// Validate a JWT token and return claims
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, RouteError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| RouteError::Unauthorized(format!("Invalid token: {}", e)))?;

    Ok(token_data.claims)
}

/// Token carried by a NATS request. Every route operation requires one.
pub fn extract_token<T>(request: &Request<T>) -> Result<&str, RouteError> {
    match request.token.as_deref() {
        Some(token) if !token.trim().is_empty() => Ok(token),
        _ => Err(RouteError::Unauthorized(
            "No authentication provided, token is required".to_string(),
        )),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    pub(crate) const TEST_SECRET: &str = "test-secret-key-for-jwt-at-least-32-bytes-long";

    #[test]
    fn test_generate_and_validate_token() {
        let token = generate_token("auth0|alice", Some("alice@example.com"), 3600, TEST_SECRET).unwrap();

        let claims = validate_token(&token, TEST_SECRET).unwrap();
        assert_eq!(claims.sub, "auth0|alice");
        assert_eq!(claims.email.as_deref(), Some("alice@example.com"));
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_token_without_email() {
        let token = generate_token("auth0|bob", None, 60, TEST_SECRET).unwrap();
        let claims = validate_token(&token, TEST_SECRET).unwrap();
        assert!(claims.email.is_none());
    }

    #[test]
    fn test_validate_token_wrong_secret() {
        let token = generate_token("auth0|alice", None, 3600, TEST_SECRET).unwrap();

        let result = validate_token(&token, "wrong-secret");
        assert!(matches!(result, Err(RouteError::Unauthorized(_))));
    }

    #[test]
    fn test_validate_token_malformed() {
        let result = validate_token("not.a.valid.token", TEST_SECRET);
        assert!(matches!(result, Err(RouteError::Unauthorized(_))));
    }

    #[test]
    fn test_validate_expired_token() {
        let now = Utc::now().timestamp() as usize;
        let claims = Claims {
            sub: "auth0|alice".to_string(),
            email: None,
            iat: now - 7200,
            exp: now - 3600,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
        )
        .unwrap();

        assert!(validate_token(&token, TEST_SECRET).is_err());
    }

    // ---- extract_token tests ----

    fn make_request(token: Option<&str>) -> Request<serde_json::Value> {
        Request {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            token: token.map(str::to_string),
            payload: serde_json::Value::Null,
        }
    }

    #[test]
    fn test_extract_token_present() {
        let request = make_request(Some("abc.def.ghi"));
        assert_eq!(extract_token(&request).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn test_extract_token_missing_or_blank() {
        assert!(matches!(extract_token(&make_request(None)), Err(RouteError::Unauthorized(_))));
        assert!(matches!(extract_token(&make_request(Some("  "))), Err(RouteError::Unauthorized(_))));
    }
}
