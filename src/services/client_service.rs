//! Client records of an organization, scoped by role like routes

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::db::{ClientStore, NewClient};
use crate::error::RouteError;
use crate::services::session_cache::Session;
use crate::types::{ClientInput, ClientRecord, NotificationPreferences};

/// A client row as listed, with what the viewer may do to it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientListItem {
    #[serde(flatten)]
    pub client: ClientRecord,
    pub can_edit: bool,
    pub can_delete: bool,
}

pub struct ClientService {
    store: Arc<dyn ClientStore>,
}

impl ClientService {
    pub fn new(store: Arc<dyn ClientStore>) -> Self {
        Self { store }
    }

    pub async fn list_clients(&self, session: &Session) -> Result<Vec<ClientListItem>, RouteError> {
        let scope = session.permissions.client_scope();
        let records = self.store.list_clients(&scope).await?;

        Ok(records
            .into_iter()
            .map(|client| ClientListItem {
                can_edit: session.permissions.can_edit_client(&client),
                can_delete: session.permissions.can_delete_client(&client),
                client,
            })
            .collect())
    }

    /// New clients start with email and push notifications on
    pub async fn create_client(&self, session: &Session, input: &ClientInput) -> Result<ClientRecord, RouteError> {
        if !session.permissions.capabilities.clients.create {
            return Err(RouteError::Forbidden("You cannot create clients".to_string()));
        }
        let client = input.validated()?;

        let record = self
            .store
            .insert_client(NewClient {
                organization_id: session.organization_id,
                created_by_user_id: session.subject.clone(),
                client,
                preferences: NotificationPreferences::default(),
            })
            .await?;

        info!("Client {} created by {}", record.id, session.subject);
        Ok(record)
    }

    pub async fn update_client(
        &self,
        session: &Session,
        client_id: Uuid,
        input: &ClientInput,
    ) -> Result<ClientRecord, RouteError> {
        let existing = self.load(client_id).await?;
        if !session.permissions.can_edit_client(&existing) {
            return Err(RouteError::Forbidden("You cannot edit this client".to_string()));
        }
        let client = input.validated()?;

        let updated = self
            .store
            .update_client(client_id, &client)
            .await?
            .ok_or(RouteError::NotFound)?;

        info!("Client {} updated by {}", client_id, session.subject);
        Ok(updated)
    }

    pub async fn delete_client(&self, session: &Session, client_id: Uuid) -> Result<(), RouteError> {
        let existing = self.load(client_id).await?;
        if !session.permissions.can_delete_client(&existing) {
            return Err(RouteError::Forbidden("You don't have permission to delete this client".to_string()));
        }

        if !self.store.delete_client(client_id).await? {
            return Err(RouteError::NotFound);
        }

        info!("Client {} deleted by {}", client_id, session.subject);
        Ok(())
    }

    async fn load(&self, client_id: Uuid) -> Result<ClientRecord, RouteError> {
        self.store.get_client(client_id).await?.ok_or(RouteError::NotFound)
    }
}
