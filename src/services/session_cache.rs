//! Per-credential session cache
//!
//! Resolving a token means validating it and loading the user's
//! organization and role. The result is kept per token until the token
//! expires, the user logs out, or the signing secret is rotated.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::auth::{validate_token, Claims};
use crate::db::UserDirectory;
use crate::error::RouteError;
use crate::services::permissions::Permissions;
use crate::types::Role;

/// An authenticated user within their organization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub subject: String,
    pub email: Option<String>,
    pub organization_id: Uuid,
    pub role: Role,
    pub permissions: Permissions,
}

struct CachedSession {
    session: Arc<Session>,
    expires_at: usize,
}

pub struct SessionCache {
    jwt_secret: RwLock<String>,
    /// Bumped on every rotation; resolutions that started under an older
    /// secret are not cached
    rotations: AtomicU64,
    directory: Arc<dyn UserDirectory>,
    entries: RwLock<HashMap<String, CachedSession>>,
}

fn now() -> usize {
    Utc::now().timestamp().max(0) as usize
}

impl SessionCache {
    pub fn new(jwt_secret: impl Into<String>, directory: Arc<dyn UserDirectory>) -> Self {
        Self {
            jwt_secret: RwLock::new(jwt_secret.into()),
            rotations: AtomicU64::new(0),
            directory,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Validate a token against the current secret without requiring a
    /// user row. Used before onboarding.
    pub fn verify(&self, token: &str) -> Result<Claims, RouteError> {
        validate_token(token, &self.jwt_secret.read())
    }

    /// Session for a token, from cache when still valid
    pub async fn resolve(&self, token: &str) -> Result<Arc<Session>, RouteError> {
        let now = now();
        let cached = self
            .entries
            .read()
            .get(token)
            .filter(|cached| cached.expires_at > now)
            .map(|cached| cached.session.clone());
        if let Some(session) = cached {
            return Ok(session);
        }

        let rotation = self.rotations.load(Ordering::SeqCst);
        let claims = self.verify(token)?;

        let user = self
            .directory
            .find_by_subject(&claims.sub)
            .await?
            .ok_or_else(|| RouteError::Forbidden("Organization not found".to_string()))?;

        let session = Arc::new(Session {
            permissions: Permissions::new(&claims.sub, user.organization_id, user.role),
            subject: claims.sub,
            email: claims.email.or(user.email),
            organization_id: user.organization_id,
            role: user.role,
        });

        debug!("Resolved session for {} as {}", session.subject, session.role);

        let mut entries = self.entries.write();
        if self.rotations.load(Ordering::SeqCst) != rotation {
            return Ok(session);
        }
        entries.retain(|_, cached| cached.expires_at > now);
        entries.insert(
            token.to_string(),
            CachedSession {
                session: session.clone(),
                expires_at: claims.exp,
            },
        );

        Ok(session)
    }

    /// Forget one credential. Returns the session it was cached for.
    pub fn logout(&self, token: &str) -> Option<Arc<Session>> {
        let removed = self.entries.write().remove(token).map(|cached| cached.session);
        if let Some(session) = &removed {
            info!("Session of {} cleared on logout", session.subject);
        }
        removed
    }

    /// Forget every credential. Returns how many were cached.
    pub fn clear(&self) -> usize {
        let mut entries = self.entries.write();
        let count = entries.len();
        entries.clear();
        count
    }

    /// Switch to a new signing secret. Every cached session is dropped, so
    /// tokens signed with the old secret stop working immediately.
    pub fn rotate_secret(&self, jwt_secret: impl Into<String>) -> usize {
        *self.jwt_secret.write() = jwt_secret.into();
        self.rotations.fetch_add(1, Ordering::SeqCst);
        let count = self.clear();
        info!("Signing secret rotated, cleared {} cached sessions", count);
        count
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
