//! Role-based permissions
//!
//! The role set is closed, so capabilities are computed once per session
//! from the role and passed around explicitly.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{ClientRecord, RouteRecord, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteCapabilities {
    pub view_all: bool,
    pub view_own: bool,
    pub create: bool,
    pub edit: bool,
    pub edit_own: bool,
    pub delete: bool,
    pub delete_own: bool,
    pub assign: bool,
    pub bulk_operations: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientCapabilities {
    pub view_all: bool,
    pub view_own: bool,
    pub create: bool,
    pub edit: bool,
    pub edit_own: bool,
    pub delete: bool,
    pub delete_own: bool,
    pub bulk_operations: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverCapabilities {
    pub view: bool,
    pub create: bool,
    pub edit: bool,
    pub delete: bool,
    pub assign: bool,
    pub bulk_operations: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentCapabilities {
    pub view_all: bool,
    pub view_own: bool,
    pub create: bool,
    pub edit: bool,
    pub delete: bool,
    pub manage: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsCapabilities {
    pub view_org_wide: bool,
    pub view_own: bool,
    pub export_data: bool,
    pub view_reports: bool,
    pub create_reports: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationCapabilities {
    pub view: bool,
    pub edit: bool,
    pub manage_users: bool,
    pub view_users: bool,
    pub manage_billing: bool,
    pub view_audit_logs: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCapabilities {
    pub view: bool,
    pub invite: bool,
    pub edit: bool,
    pub delete: bool,
    pub change_roles: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationCapabilities {
    pub view_own: bool,
    pub view_all: bool,
    pub send: bool,
    pub manage: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiCapabilities {
    pub show_advanced_features: bool,
    pub show_bulk_actions: bool,
    pub show_admin_menu: bool,
    pub show_manager_features: bool,
    pub show_user_only_features: bool,
}

/// Everything a role may do, grouped by feature area
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub routes: RouteCapabilities,
    pub clients: ClientCapabilities,
    pub drivers: DriverCapabilities,
    pub assignments: AssignmentCapabilities,
    pub analytics: AnalyticsCapabilities,
    pub organization: OrganizationCapabilities,
    pub users: UserCapabilities,
    pub notifications: NotificationCapabilities,
    pub ui: UiCapabilities,
}

impl Capabilities {
    pub fn for_role(role: Role) -> Self {
        let admin = role == Role::Admin;
        let staff = matches!(role, Role::Admin | Role::Manager);
        let user = role == Role::User;

        Self {
            routes: RouteCapabilities {
                view_all: staff,
                view_own: true,
                create: true,
                edit: staff,
                edit_own: true,
                delete: staff,
                delete_own: user,
                assign: staff,
                bulk_operations: staff,
            },
            clients: ClientCapabilities {
                view_all: staff,
                view_own: true,
                create: true,
                edit: staff,
                edit_own: true,
                delete: staff,
                delete_own: user,
                bulk_operations: staff,
            },
            drivers: DriverCapabilities {
                view: staff,
                create: staff,
                edit: staff,
                delete: admin,
                assign: staff,
                bulk_operations: admin,
            },
            assignments: AssignmentCapabilities {
                view_all: staff,
                view_own: user,
                create: staff,
                edit: staff,
                delete: admin,
                manage: staff,
            },
            analytics: AnalyticsCapabilities {
                view_org_wide: staff,
                view_own: user,
                export_data: staff,
                view_reports: staff,
                create_reports: admin,
            },
            organization: OrganizationCapabilities {
                view: admin,
                edit: admin,
                manage_users: admin,
                view_users: staff,
                manage_billing: admin,
                view_audit_logs: admin,
            },
            users: UserCapabilities {
                view: admin,
                invite: admin,
                edit: admin,
                delete: admin,
                change_roles: admin,
            },
            notifications: NotificationCapabilities {
                view_own: true,
                view_all: staff,
                send: staff,
                manage: admin,
            },
            ui: UiCapabilities {
                show_advanced_features: staff,
                show_bulk_actions: staff,
                show_admin_menu: admin,
                show_manager_features: staff,
                show_user_only_features: user,
            },
        }
    }
}

/// Front-end pages gated by role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppPage {
    Routes,
    Clients,
    Drivers,
    Assignments,
    Analytics,
    Organization,
    Users,
}

impl AppPage {
    pub const ALL: [AppPage; 7] = [
        AppPage::Routes,
        AppPage::Clients,
        AppPage::Drivers,
        AppPage::Assignments,
        AppPage::Analytics,
        AppPage::Organization,
        AppPage::Users,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            AppPage::Routes => "routes",
            AppPage::Clients => "clients",
            AppPage::Drivers => "drivers",
            AppPage::Assignments => "assignments",
            AppPage::Analytics => "analytics",
            AppPage::Organization => "organization",
            AppPage::Users => "users",
        }
    }
}

impl fmt::Display for AppPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppPage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AppPage::ALL
            .into_iter()
            .find(|page| page.as_str() == s)
            .ok_or_else(|| format!("unknown page '{}'", s))
    }
}

/// Query filter for data a session may list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataScope {
    pub organization_id: Uuid,
    /// Restricts to rows created by this subject when set
    pub user_id: Option<String>,
}

/// Capabilities bound to one authenticated user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permissions {
    pub subject: String,
    pub organization_id: Uuid,
    pub role: Role,
    pub capabilities: Capabilities,
}

impl Permissions {
    pub fn new(subject: impl Into<String>, organization_id: Uuid, role: Role) -> Self {
        Self {
            subject: subject.into(),
            organization_id,
            role,
            capabilities: Capabilities::for_role(role),
        }
    }

    /// Row-level check: same organization, then either the org-wide
    /// capability or the own-rows one for rows this subject created
    fn allows(&self, organization_id: Uuid, owner: &str, any: bool, own: bool) -> bool {
        organization_id == self.organization_id && (any || (own && owner == self.subject))
    }

    fn scope(&self, view_all: bool) -> DataScope {
        DataScope {
            organization_id: self.organization_id,
            user_id: if view_all { None } else { Some(self.subject.clone()) },
        }
    }

    pub fn can_view_route(&self, route: &RouteRecord) -> bool {
        let routes = &self.capabilities.routes;
        self.allows(route.organization_id, &route.user_id, routes.view_all, routes.view_own)
    }

    pub fn can_edit_route(&self, route: &RouteRecord) -> bool {
        let routes = &self.capabilities.routes;
        self.allows(route.organization_id, &route.user_id, routes.edit, routes.edit_own)
    }

    pub fn can_delete_route(&self, route: &RouteRecord) -> bool {
        let routes = &self.capabilities.routes;
        self.allows(route.organization_id, &route.user_id, routes.delete, routes.delete_own)
    }

    pub fn can_view_client(&self, client: &ClientRecord) -> bool {
        let clients = &self.capabilities.clients;
        self.allows(client.organization_id, &client.created_by_user_id, clients.view_all, clients.view_own)
    }

    pub fn can_edit_client(&self, client: &ClientRecord) -> bool {
        let clients = &self.capabilities.clients;
        self.allows(client.organization_id, &client.created_by_user_id, clients.edit, clients.edit_own)
    }

    pub fn can_delete_client(&self, client: &ClientRecord) -> bool {
        let clients = &self.capabilities.clients;
        self.allows(client.organization_id, &client.created_by_user_id, clients.delete, clients.delete_own)
    }

    pub fn can_access_page(&self, page: AppPage) -> bool {
        let c = &self.capabilities;
        match page {
            AppPage::Routes | AppPage::Clients => true,
            AppPage::Drivers => c.drivers.view,
            AppPage::Assignments => c.assignments.view_all || c.assignments.view_own,
            AppPage::Analytics => c.analytics.view_org_wide || c.analytics.view_own,
            AppPage::Organization => c.organization.view,
            AppPage::Users => c.users.view,
        }
    }

    /// Pages this session may open, in menu order
    pub fn accessible_pages(&self) -> Vec<AppPage> {
        AppPage::ALL
            .into_iter()
            .filter(|page| self.can_access_page(*page))
            .collect()
    }

    pub fn route_scope(&self) -> DataScope {
        self.scope(self.capabilities.routes.view_all)
    }

    /// Clients filter on their creator, like routes on their owner
    pub fn client_scope(&self) -> DataScope {
        self.scope(self.capabilities.clients.view_all)
    }
}
