use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
pub enum Role {
    Admin,
    Manager,
    AccountManager,
    ProjectManager,
    Engineer,
    Viewer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::AccountManager => "account_manager",
            Role::ProjectManager => "project_manager",
            Role::Engineer => "engineer",
            Role::Viewer => "viewer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "manager" => Ok(Role::Manager),
            "account_manager" => Ok(Role::AccountManager),
            "project_manager" => Ok(Role::ProjectManager),
            "engineer" => Ok(Role::Engineer),
            "viewer" => Ok(Role::Viewer),
            other => Err(format!("Unknown role '{}'", other)),
        }
    }
}

// Route guard groups
pub const ADMIN_ONLY: &[Role] = &[Role::Admin];
pub const CLIENT_WRITERS: &[Role] = &[Role::Admin, Role::Manager, Role::AccountManager];
pub const CONTRACT_WRITERS: &[Role] = CLIENT_WRITERS;
pub const SCOPE_WRITERS: &[Role] = &[Role::Admin, Role::Manager, Role::AccountManager, Role::ProjectManager];
pub const HARDWARE_WRITERS: &[Role] = &[Role::Admin, Role::Manager, Role::ProjectManager, Role::Engineer];
pub const FINANCE_READERS: &[Role] = &[Role::Admin, Role::Manager, Role::AccountManager];
pub const FINANCE_WRITERS: &[Role] = &[Role::Admin, Role::Manager];
pub const TEAM_WRITERS: &[Role] = &[Role::Admin, Role::Manager];

/// Read endpoints that mix in money totals drop them for everyone else
pub fn can_read_finances(role: Role) -> bool {
    FINANCE_READERS.contains(&role)
}

/// Rejects the request with 403 unless `role` is one of `allowed`
pub fn require_role(role: Role, allowed: &[Role]) -> Result<(), ApiError> {
    if allowed.contains(&role) {
        return Ok(());
    }

    tracing::warn!("Role '{}' rejected; requires one of {:?}", role, allowed);
    Err(ApiError::forbidden(format!(
        "Role '{}' is not permitted to perform this action",
        role
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_roles_case_insensitively() {
        assert_eq!("Account_Manager".parse::<Role>().unwrap(), Role::AccountManager);
        assert!("superuser".parse::<Role>().is_err());
    }

    #[test]
    fn serde_uses_snake_case() {
        assert_eq!(serde_json::to_value(Role::ProjectManager).unwrap(), "project_manager");
    }

    #[test]
    fn guards_allow_listed_roles_only() {
        assert!(require_role(Role::Engineer, HARDWARE_WRITERS).is_ok());
        assert!(require_role(Role::Engineer, FINANCE_WRITERS).is_err());
        assert!(require_role(Role::Viewer, CLIENT_WRITERS).is_err());
        assert!(require_role(Role::Admin, ADMIN_ONLY).is_ok());
    }

    #[test]
    fn finance_totals_follow_finance_readers() {
        for role in [Role::Admin, Role::Manager, Role::AccountManager] {
            assert!(can_read_finances(role));
        }
        for role in [Role::ProjectManager, Role::Engineer, Role::Viewer] {
            assert!(!can_read_finances(role));
            assert!(require_role(role, FINANCE_READERS).is_err());
        }
    }

    #[test]
    fn rejection_is_forbidden() {
        let err = require_role(Role::Viewer, ADMIN_ONLY).unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::FORBIDDEN);
    }
}
