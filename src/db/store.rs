//! Storage traits used by the services, with the PostgreSQL backend

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::queries;
use crate::error::RouteError;
use crate::services::permissions::DataScope;
use crate::types::{
    ClientInput, ClientRecord, NotificationPreferences, OrganizationRecord, Role, RouteRecord, UserRecord,
};

/// Fields of a route to be created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRoute {
    pub organization_id: Uuid,
    pub user_id: String,
    pub route_name: String,
    pub addresses: Vec<String>,
}

/// Persisted routes. Addresses are stored exactly as entered.
#[async_trait]
pub trait RouteStore: Send + Sync {
    async fn list(&self, scope: &DataScope) -> Result<Vec<RouteRecord>, RouteError>;

    async fn get(&self, route_id: Uuid) -> Result<Option<RouteRecord>, RouteError>;

    async fn insert(&self, route: NewRoute) -> Result<RouteRecord, RouteError>;

    async fn update(
        &self,
        route_id: Uuid,
        route_name: &str,
        addresses: &[String],
    ) -> Result<Option<RouteRecord>, RouteError>;

    /// Returns false when nothing was deleted
    async fn delete(&self, route_id: Uuid) -> Result<bool, RouteError>;
}

/// Fields of a client to be created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewClient {
    pub organization_id: Uuid,
    pub created_by_user_id: String,
    pub client: ClientInput,
    pub preferences: NotificationPreferences,
}

#[async_trait]
pub trait ClientStore: Send + Sync {
    async fn list_clients(&self, scope: &DataScope) -> Result<Vec<ClientRecord>, RouteError>;

    async fn get_client(&self, client_id: Uuid) -> Result<Option<ClientRecord>, RouteError>;

    async fn insert_client(&self, client: NewClient) -> Result<ClientRecord, RouteError>;

    async fn update_client(&self, client_id: Uuid, client: &ClientInput) -> Result<Option<ClientRecord>, RouteError>;

    /// Returns false when nothing was deleted
    async fn delete_client(&self, client_id: Uuid) -> Result<bool, RouteError>;
}

/// A user row to be created during onboarding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMember {
    pub subject: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: Role,
}

/// Organization membership lookup and onboarding
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_subject(&self, subject: &str) -> Result<Option<UserRecord>, RouteError>;

    /// Case-insensitive exact match
    async fn find_organization_by_name(&self, name: &str) -> Result<Option<OrganizationRecord>, RouteError>;

    /// Create an organization together with its first member. `Conflict`
    /// when the name is taken or the subject is already a member.
    async fn create_organization(&self, name: &str, admin: NewMember) -> Result<UserRecord, RouteError>;

    /// `Conflict` when the subject is already a member
    async fn add_member(&self, organization_id: Uuid, member: NewMember) -> Result<UserRecord, RouteError>;
}

/// Unique violations become `Conflict`, anything else `Storage`
fn onboarding_error(e: sqlx::Error) -> RouteError {
    let constraint = match e.as_database_error() {
        Some(db) if db.is_unique_violation() => db.constraint().map(str::to_string),
        _ => return e.into(),
    };
    match constraint.as_deref() {
        Some("idx_organizations_name") => {
            RouteError::Conflict("An organization with this name already exists".to_string())
        }
        _ => RouteError::Conflict("User is already onboarded".to_string()),
    }
}

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RouteStore for PgStore {
    async fn list(&self, scope: &DataScope) -> Result<Vec<RouteRecord>, RouteError> {
        Ok(queries::route::list_routes(&self.pool, scope).await?)
    }

    async fn get(&self, route_id: Uuid) -> Result<Option<RouteRecord>, RouteError> {
        Ok(queries::route::get_route(&self.pool, route_id).await?)
    }

    async fn insert(&self, route: NewRoute) -> Result<RouteRecord, RouteError> {
        Ok(queries::route::insert_route(
            &self.pool,
            route.organization_id,
            &route.user_id,
            &route.route_name,
            &route.addresses,
        )
        .await?)
    }

    async fn update(
        &self,
        route_id: Uuid,
        route_name: &str,
        addresses: &[String],
    ) -> Result<Option<RouteRecord>, RouteError> {
        Ok(queries::route::update_route(&self.pool, route_id, route_name, addresses).await?)
    }

    async fn delete(&self, route_id: Uuid) -> Result<bool, RouteError> {
        Ok(queries::route::delete_route(&self.pool, route_id).await?)
    }
}

#[async_trait]
impl ClientStore for PgStore {
    async fn list_clients(&self, scope: &DataScope) -> Result<Vec<ClientRecord>, RouteError> {
        Ok(queries::client::list_clients(&self.pool, scope).await?)
    }

    async fn get_client(&self, client_id: Uuid) -> Result<Option<ClientRecord>, RouteError> {
        Ok(queries::client::get_client(&self.pool, client_id).await?)
    }

    async fn insert_client(&self, client: NewClient) -> Result<ClientRecord, RouteError> {
        Ok(queries::client::insert_client(
            &self.pool,
            client.organization_id,
            &client.created_by_user_id,
            &client.client,
            client.preferences,
        )
        .await?)
    }

    async fn update_client(&self, client_id: Uuid, client: &ClientInput) -> Result<Option<ClientRecord>, RouteError> {
        Ok(queries::client::update_client(&self.pool, client_id, client).await?)
    }

    async fn delete_client(&self, client_id: Uuid) -> Result<bool, RouteError> {
        Ok(queries::client::delete_client(&self.pool, client_id).await?)
    }
}

#[async_trait]
impl UserDirectory for PgStore {
    async fn find_by_subject(&self, subject: &str) -> Result<Option<UserRecord>, RouteError> {
        Ok(queries::user::get_user_by_auth0_id(&self.pool, subject).await?)
    }

    async fn find_organization_by_name(&self, name: &str) -> Result<Option<OrganizationRecord>, RouteError> {
        Ok(queries::user::get_organization_by_name(&self.pool, name).await?)
    }

    async fn create_organization(&self, name: &str, admin: NewMember) -> Result<UserRecord, RouteError> {
        queries::user::insert_organization_with_admin(&self.pool, name, &admin)
            .await
            .map_err(onboarding_error)
    }

    async fn add_member(&self, organization_id: Uuid, member: NewMember) -> Result<UserRecord, RouteError> {
        queries::user::insert_member(&self.pool, organization_id, &member)
            .await
            .map_err(onboarding_error)
    }
}

/// In-memory store for service and handler tests
#[cfg(test)]
pub(crate) mod memory {
    use super::*;
    use chrono::Utc;
    use parking_lot::Mutex;

    #[derive(Default)]
    pub(crate) struct MemoryStore {
        pub routes: Mutex<Vec<RouteRecord>>,
        pub clients: Mutex<Vec<ClientRecord>>,
        pub users: Mutex<Vec<UserRecord>>,
        pub organizations: Mutex<Vec<OrganizationRecord>>,
    }

    impl MemoryStore {
        pub(crate) fn add_user(&self, subject: &str, organization_id: Uuid, role: Role) {
            self.users.lock().push(UserRecord {
                id: Uuid::new_v4(),
                auth0_id: subject.to_string(),
                organization_id,
                email: None,
                name: None,
                role,
                created_at: Utc::now(),
            });
        }

        fn push_member(&self, organization_id: Uuid, member: NewMember) -> Result<UserRecord, RouteError> {
            let mut users = self.users.lock();
            if users.iter().any(|u| u.auth0_id == member.subject) {
                return Err(RouteError::Conflict("User is already onboarded".to_string()));
            }
            let user = UserRecord {
                id: Uuid::new_v4(),
                auth0_id: member.subject,
                organization_id,
                email: member.email,
                name: member.name,
                role: member.role,
                created_at: Utc::now(),
            };
            users.push(user.clone());
            Ok(user)
        }
    }

    #[async_trait]
    impl RouteStore for MemoryStore {
        async fn list(&self, scope: &DataScope) -> Result<Vec<RouteRecord>, RouteError> {
            let mut routes: Vec<RouteRecord> = self
                .routes
                .lock()
                .iter()
                .filter(|r| r.organization_id == scope.organization_id)
                .filter(|r| scope.user_id.as_deref().map_or(true, |u| r.user_id == u))
                .cloned()
                .collect();
            routes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(routes)
        }

        async fn get(&self, route_id: Uuid) -> Result<Option<RouteRecord>, RouteError> {
            Ok(self.routes.lock().iter().find(|r| r.id == route_id).cloned())
        }

        async fn insert(&self, route: NewRoute) -> Result<RouteRecord, RouteError> {
            let now = Utc::now();
            let record = RouteRecord {
                id: Uuid::new_v4(),
                organization_id: route.organization_id,
                user_id: route.user_id,
                route_name: route.route_name,
                addresses: route.addresses,
                created_at: now,
                updated_at: now,
            };
            self.routes.lock().push(record.clone());
            Ok(record)
        }

        async fn update(
            &self,
            route_id: Uuid,
            route_name: &str,
            addresses: &[String],
        ) -> Result<Option<RouteRecord>, RouteError> {
            let mut routes = self.routes.lock();
            Ok(routes.iter_mut().find(|r| r.id == route_id).map(|r| {
                r.route_name = route_name.to_string();
                r.addresses = addresses.to_vec();
                r.updated_at = Utc::now();
                r.clone()
            }))
        }

        async fn delete(&self, route_id: Uuid) -> Result<bool, RouteError> {
            let mut routes = self.routes.lock();
            let before = routes.len();
            routes.retain(|r| r.id != route_id);
            Ok(routes.len() != before)
        }
    }

    #[async_trait]
    impl ClientStore for MemoryStore {
        async fn list_clients(&self, scope: &DataScope) -> Result<Vec<ClientRecord>, RouteError> {
            let mut clients: Vec<ClientRecord> = self
                .clients
                .lock()
                .iter()
                .filter(|c| c.organization_id == scope.organization_id)
                .filter(|c| scope.user_id.as_deref().map_or(true, |u| c.created_by_user_id == u))
                .cloned()
                .collect();
            clients.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(clients)
        }

        async fn get_client(&self, client_id: Uuid) -> Result<Option<ClientRecord>, RouteError> {
            Ok(self.clients.lock().iter().find(|c| c.id == client_id).cloned())
        }

        async fn insert_client(&self, client: NewClient) -> Result<ClientRecord, RouteError> {
            let now = Utc::now();
            let record = ClientRecord {
                id: Uuid::new_v4(),
                organization_id: client.organization_id,
                created_by_user_id: client.created_by_user_id,
                name: client.client.name,
                email: client.client.email,
                phone: client.client.phone,
                address: client.client.address,
                notification_preferences: sqlx::types::Json(client.preferences),
                created_at: now,
                updated_at: now,
            };
            self.clients.lock().push(record.clone());
            Ok(record)
        }

        async fn update_client(&self, client_id: Uuid, client: &ClientInput) -> Result<Option<ClientRecord>, RouteError> {
            let mut clients = self.clients.lock();
            Ok(clients.iter_mut().find(|c| c.id == client_id).map(|c| {
                c.name = client.name.clone();
                c.email = client.email.clone();
                c.phone = client.phone.clone();
                c.address = client.address.clone();
                c.updated_at = Utc::now();
                c.clone()
            }))
        }

        async fn delete_client(&self, client_id: Uuid) -> Result<bool, RouteError> {
            let mut clients = self.clients.lock();
            let before = clients.len();
            clients.retain(|c| c.id != client_id);
            Ok(clients.len() != before)
        }
    }

    #[async_trait]
    impl UserDirectory for MemoryStore {
        async fn find_by_subject(&self, subject: &str) -> Result<Option<UserRecord>, RouteError> {
            Ok(self.users.lock().iter().find(|u| u.auth0_id == subject).cloned())
        }

        async fn find_organization_by_name(&self, name: &str) -> Result<Option<OrganizationRecord>, RouteError> {
            let name = name.to_lowercase();
            Ok(self
                .organizations
                .lock()
                .iter()
                .find(|o| o.name.to_lowercase() == name)
                .cloned())
        }

        async fn create_organization(&self, name: &str, admin: NewMember) -> Result<UserRecord, RouteError> {
            if self.find_organization_by_name(name).await?.is_some() {
                return Err(RouteError::Conflict("An organization with this name already exists".to_string()));
            }
            let organization = OrganizationRecord {
                id: Uuid::new_v4(),
                name: name.to_string(),
                admin_user_id: Some(admin.subject.clone()),
                created_at: Utc::now(),
            };
            let user = self.push_member(organization.id, admin)?;
            self.organizations.lock().push(organization);
            Ok(user)
        }

        async fn add_member(&self, organization_id: Uuid, member: NewMember) -> Result<UserRecord, RouteError> {
            self.push_member(organization_id, member)
        }
    }
}
