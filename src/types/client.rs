//! Client types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::RouteError;

/// Channels a client is notified through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPreferences {
    pub email: bool,
    pub sms: bool,
    pub push: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            email: true,
            sms: false,
            push: true,
        }
    }
}

/// Persisted client row (`clients` table)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ClientRecord {
    pub id: Uuid,
    pub organization_id: Uuid,
    /// Identity provider subject of the creator
    pub created_by_user_id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub notification_preferences: Json<NotificationPreferences>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Editable client fields, as sent by create and update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInput {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
}

impl ClientInput {
    /// Trimmed copy, rejected when a field is blank or the email is malformed
    pub fn validated(&self) -> Result<ClientInput, RouteError> {
        let input = ClientInput {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: self.phone.trim().to_string(),
            address: self.address.trim().to_string(),
        };

        for (field, value) in [
            ("Name", &input.name),
            ("Email", &input.email),
            ("Phone", &input.phone),
            ("Address", &input.address),
        ] {
            if value.is_empty() {
                return Err(RouteError::InvalidInput(format!("{} is required", field)));
            }
        }

        if !looks_like_email(&input.email) {
            return Err(RouteError::InvalidInput("Email is invalid".to_string()));
        }

        Ok(input)
    }
}

/// `something@domain.tld` with no whitespace
fn looks_like_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain
                    .char_indices()
                    .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
        }
        None => false,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateClientRequest {
    pub client_id: Uuid,
    #[serde(flatten)]
    pub client: ClientInput,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientIdRequest {
    pub client_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteClientResponse {
    pub client_id: Uuid,
    pub deleted: bool,
}
