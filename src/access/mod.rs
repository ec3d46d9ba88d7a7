//! Who may do what, and which rows they may see.
//!
//! Authorization is two-layered: the permission matrix decides whether a role
//! may perform an action on a resource at all, and [`AccessScope`] narrows
//! every query to the rows that role and identity are entitled to.

pub mod scope;

use serde::Serialize;

pub use crate::database::models::Role;
pub use scope::AccessScope;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Users,
    Clients,
    Cases,
    Hearings,
    Invoices,
    Documents,
}

impl Resource {
    pub fn from_path(name: &str) -> Option<Self> {
        Some(match name {
            "users" => Resource::Users,
            "clients" => Resource::Clients,
            "cases" => Resource::Cases,
            "hearings" => Resource::Hearings,
            "invoices" => Resource::Invoices,
            "documents" => Resource::Documents,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Users => "users",
            Resource::Clients => "clients",
            Resource::Cases => "cases",
            Resource::Hearings => "hearings",
            Resource::Invoices => "invoices",
            Resource::Documents => "documents",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

/// The role/resource/action permission matrix
pub fn is_allowed(role: Role, resource: Resource, action: Action) -> bool {
    use Action::*;
    use Resource::*;

    match role {
        Role::Admin => true,
        Role::Lawyer | Role::Staff => match resource {
            Users => false,
            Clients | Cases | Invoices => matches!(action, Read | Create | Update),
            Hearings | Documents => true,
        },
        Role::Client => match resource {
            Users => false,
            _ => action == Read,
        },
    }
}

/// Resources and actions a role holds, for the `/api/auth/me` payload
pub fn permissions_for(role: Role) -> Vec<(Resource, Vec<Action>)> {
    const RESOURCES: [Resource; 6] = [
        Resource::Users,
        Resource::Clients,
        Resource::Cases,
        Resource::Hearings,
        Resource::Invoices,
        Resource::Documents,
    ];
    const ACTIONS: [Action; 4] = [Action::Read, Action::Create, Action::Update, Action::Delete];

    RESOURCES
        .iter()
        .map(|resource| {
            let actions = ACTIONS
                .iter()
                .copied()
                .filter(|action| is_allowed(role, *resource, *action))
                .collect::<Vec<_>>();
            (*resource, actions)
        })
        .filter(|(_, actions)| !actions.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_can_do_everything() {
        for resource in [Resource::Users, Resource::Cases, Resource::Invoices] {
            for action in [Action::Read, Action::Create, Action::Update, Action::Delete] {
                assert!(is_allowed(Role::Admin, resource, action));
            }
        }
    }

    #[test]
    fn only_admin_manages_users() {
        for role in [Role::Lawyer, Role::Staff, Role::Client] {
            assert!(!is_allowed(role, Resource::Users, Action::Read));
            assert!(!is_allowed(role, Resource::Users, Action::Create));
        }
    }

    #[test]
    fn firm_staff_cannot_delete_core_records() {
        for role in [Role::Lawyer, Role::Staff] {
            assert!(is_allowed(role, Resource::Cases, Action::Update));
            assert!(!is_allowed(role, Resource::Cases, Action::Delete));
            assert!(!is_allowed(role, Resource::Clients, Action::Delete));
            assert!(!is_allowed(role, Resource::Invoices, Action::Delete));
            assert!(is_allowed(role, Resource::Hearings, Action::Delete));
            assert!(is_allowed(role, Resource::Documents, Action::Delete));
        }
    }

    #[test]
    fn clients_are_read_only() {
        assert!(is_allowed(Role::Client, Resource::Cases, Action::Read));
        assert!(!is_allowed(Role::Client, Resource::Cases, Action::Create));
        assert!(!is_allowed(Role::Client, Resource::Documents, Action::Update));
    }

    #[test]
    fn permission_listing_skips_empty_resources() {
        let perms = permissions_for(Role::Client);
        assert!(perms.iter().all(|(r, _)| *r != Resource::Users));
        assert!(perms.iter().all(|(_, actions)| actions == &vec![Action::Read]));
        assert_eq!(permissions_for(Role::Admin).len(), 6);
    }

    #[test]
    fn resource_paths() {
        assert_eq!(Resource::from_path("hearings"), Some(Resource::Hearings));
        assert_eq!(Resource::from_path("tenants"), None);
        assert_eq!(Resource::Invoices.as_str(), "invoices");
    }
}
