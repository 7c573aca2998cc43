//! First-login onboarding
//!
//! A valid token whose subject has no user row cannot resolve a session.
//! Onboarding creates that row, either with a new organization (the caller
//! becomes its admin) or by joining an existing one by name (as a user).

use std::sync::Arc;

use tracing::info;

use crate::auth::Claims;
use crate::db::{NewMember, UserDirectory};
use crate::error::RouteError;
use crate::types::{OnboardRequest, OnboardingStatus, Role, UserRecord};

pub struct OnboardingService {
    directory: Arc<dyn UserDirectory>,
}

impl OnboardingService {
    pub fn new(directory: Arc<dyn UserDirectory>) -> Self {
        Self { directory }
    }

    pub async fn status(&self, claims: &Claims) -> Result<OnboardingStatus, RouteError> {
        let user = self.directory.find_by_subject(&claims.sub).await?;
        Ok(OnboardingStatus {
            needs_onboarding: user.is_none(),
            organization_id: user.as_ref().map(|u| u.organization_id),
            role: user.map(|u| u.role),
        })
    }

    pub async fn complete(&self, claims: &Claims, request: &OnboardRequest) -> Result<UserRecord, RouteError> {
        let organization_name = request.organization_name.trim();
        if organization_name.is_empty() {
            return Err(RouteError::InvalidInput("Organization name is required".to_string()));
        }

        if self.directory.find_by_subject(&claims.sub).await?.is_some() {
            return Err(RouteError::Conflict("User is already onboarded".to_string()));
        }

        let name = request
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .or_else(|| claims.email.clone());

        let member = |role| NewMember {
            subject: claims.sub.clone(),
            email: claims.email.clone(),
            name: name.clone(),
            role,
        };

        let user = if request.create_organization {
            self.directory
                .create_organization(organization_name, member(Role::Admin))
                .await?
        } else {
            let organization = self
                .directory
                .find_organization_by_name(organization_name)
                .await?
                .ok_or_else(|| {
                    RouteError::InvalidInput(format!(
                        "Organization \"{}\" not found. Please check the name or create a new organization.",
                        organization_name
                    ))
                })?;
            self.directory.add_member(organization.id, member(Role::User)).await?
        };

        info!(
            "Onboarded {} into organization {} as {}",
            user.auth0_id, user.organization_id, user.role
        );
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::store::memory::MemoryStore;

    fn claims(subject: &str) -> Claims {
        Claims {
            sub: subject.to_string(),
            email: Some(format!("{}@example.com", subject.trim_start_matches("auth0|"))),
            iat: 0,
            exp: usize::MAX,
        }
    }

    fn request(organization_name: &str, create_organization: bool) -> OnboardRequest {
        OnboardRequest {
            organization_name: organization_name.to_string(),
            create_organization,
            name: None,
        }
    }

    fn service() -> (OnboardingService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::default());
        (OnboardingService::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_new_identity_needs_onboarding() {
        let (service, _) = service();
        let status = service.status(&claims("auth0|alice")).await.unwrap();
        assert_eq!(
            status,
            OnboardingStatus {
                needs_onboarding: true,
                organization_id: None,
                role: None
            }
        );
    }

    #[tokio::test]
    async fn test_creating_an_organization_makes_the_caller_admin() {
        let (service, store) = service();
        let alice = claims("auth0|alice");

        let user = service.complete(&alice, &request("Acme Deliveries", true)).await.unwrap();
        assert_eq!(user.role, Role::Admin);
        assert_eq!(user.name.as_deref(), Some("alice@example.com"));

        let organizations = store.organizations.lock();
        assert_eq!(organizations.len(), 1);
        assert_eq!(organizations[0].id, user.organization_id);
        assert_eq!(organizations[0].admin_user_id.as_deref(), Some("auth0|alice"));
        drop(organizations);

        let status = service.status(&alice).await.unwrap();
        assert!(!status.needs_onboarding);
        assert_eq!(status.role, Some(Role::Admin));
    }

    #[tokio::test]
    async fn test_joining_by_name_is_case_insensitive_and_grants_user_role() {
        let (service, _) = service();
        let admin = service.complete(&claims("auth0|alice"), &request("Acme Deliveries", true)).await.unwrap();

        let bob = service.complete(&claims("auth0|bob"), &request("  acme deliveries ", false)).await.unwrap();
        assert_eq!(bob.organization_id, admin.organization_id);
        assert_eq!(bob.role, Role::User);
    }

    #[tokio::test]
    async fn test_joining_unknown_organization_fails() {
        let (service, store) = service();
        let err = service.complete(&claims("auth0|bob"), &request("Nowhere", false)).await.unwrap_err();
        assert!(matches!(err, RouteError::InvalidInput(ref m) if m.contains("\"Nowhere\" not found")));
        assert!(store.users.lock().is_empty());
    }

    #[tokio::test]
    async fn test_second_onboarding_is_a_conflict() {
        let (service, _) = service();
        let alice = claims("auth0|alice");
        service.complete(&alice, &request("Acme", true)).await.unwrap();

        let err = service.complete(&alice, &request("Other", true)).await.unwrap_err();
        assert_eq!(err, RouteError::Conflict("User is already onboarded".to_string()));
    }

    #[tokio::test]
    async fn test_taken_organization_name_is_a_conflict() {
        let (service, _) = service();
        service.complete(&claims("auth0|alice"), &request("Acme", true)).await.unwrap();

        let err = service.complete(&claims("auth0|bob"), &request("ACME", true)).await.unwrap_err();
        assert!(matches!(err, RouteError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_blank_organization_name_is_rejected() {
        let (service, _) = service();
        let err = service.complete(&claims("auth0|alice"), &request("  ", true)).await.unwrap_err();
        assert!(matches!(err, RouteError::InvalidInput(_)));
    }
}
