//! Role ladder and the pure grant/revoke rules.
//!
//! Roles form a fixed promotion ladder: `User < Employee < Manager < Admin`.
//! `User` is granted automatically at registration and is never granted or
//! revoked through the manual role-management path.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use utoipa::ToSchema;

use super::error::AuthError;

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Employee,
    Manager,
    Admin,
}

impl Role {
    /// Stable lowercase name, used for claims and database storage.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Employee => "employee",
            Self::Manager => "manager",
            Self::Admin => "admin",
        }
    }

    /// Parse a stored role name.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Self::User),
            "employee" => Some(Self::Employee),
            "manager" => Some(Self::Manager),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set type used for role snapshots; ordered so claims serialize stably.
pub type RoleSet = BTreeSet<Role>;

/// Roles assigned at registration. Nothing beyond `User` is ever automatic.
#[must_use]
pub fn initial_roles() -> RoleSet {
    RoleSet::from([Role::User])
}

/// Validate a manual grant against the current role set and the ladder.
///
/// # Errors
///
/// `ProtectedRole` for `User`, `RoleAlreadyHeld` if present, and
/// `HierarchyViolation` when the ladder precondition is unmet:
/// `Employee` requires `User`; `Manager` requires `Employee` or `Manager`;
/// `Admin` requires `Manager` or `Admin`.
pub fn check_grant(current: &RoleSet, role: Role) -> Result<(), AuthError> {
    if role == Role::User {
        return Err(AuthError::ProtectedRole);
    }
    if current.contains(&role) {
        return Err(AuthError::RoleAlreadyHeld(role));
    }
    let permitted = match role {
        Role::User => false,
        Role::Employee => current.contains(&Role::User),
        Role::Manager => current.contains(&Role::Employee) || current.contains(&Role::Manager),
        Role::Admin => current.contains(&Role::Manager) || current.contains(&Role::Admin),
    };
    if permitted {
        Ok(())
    } else {
        Err(AuthError::HierarchyViolation(role))
    }
}

/// Validate a manual revoke.
///
/// A revoke of a role that was never held fails with `RoleNotHeld` rather
/// than silently succeeding, so audit trails stay honest.
///
/// # Errors
///
/// `ProtectedRole` for `User`, `RoleNotHeld` if the role is absent.
pub fn check_revoke(current: &RoleSet, role: Role) -> Result<(), AuthError> {
    if role == Role::User {
        return Err(AuthError::ProtectedRole);
    }
    if !current.contains(&role) {
        return Err(AuthError::RoleNotHeld(role));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(roles: &[Role]) -> RoleSet {
        roles.iter().copied().collect()
    }

    #[test]
    fn initial_roles_is_exactly_user() {
        assert_eq!(initial_roles(), set(&[Role::User]));
    }

    #[test]
    fn ladder_ordering() {
        assert!(Role::User < Role::Employee);
        assert!(Role::Employee < Role::Manager);
        assert!(Role::Manager < Role::Admin);
    }

    #[test]
    fn user_is_never_grantable_or_revocable() {
        assert!(matches!(
            check_grant(&set(&[]), Role::User),
            Err(AuthError::ProtectedRole)
        ));
        assert!(matches!(
            check_revoke(&set(&[Role::User]), Role::User),
            Err(AuthError::ProtectedRole)
        ));
    }

    #[test]
    fn manager_requires_employee() {
        assert!(matches!(
            check_grant(&set(&[Role::User]), Role::Manager),
            Err(AuthError::HierarchyViolation(Role::Manager))
        ));
        assert!(check_grant(&set(&[Role::User, Role::Employee]), Role::Manager).is_ok());
    }

    #[test]
    fn admin_requires_manager() {
        assert!(matches!(
            check_grant(&set(&[Role::User, Role::Employee]), Role::Admin),
            Err(AuthError::HierarchyViolation(Role::Admin))
        ));
        assert!(
            check_grant(&set(&[Role::User, Role::Employee, Role::Manager]), Role::Admin).is_ok()
        );
    }

    #[test]
    fn duplicate_grant_is_rejected() {
        assert!(matches!(
            check_grant(&set(&[Role::User, Role::Employee]), Role::Employee),
            Err(AuthError::RoleAlreadyHeld(Role::Employee))
        ));
    }

    #[test]
    fn revoke_of_missing_role_is_an_error() {
        assert!(matches!(
            check_revoke(&set(&[Role::User]), Role::Manager),
            Err(AuthError::RoleNotHeld(Role::Manager))
        ));
        assert!(check_revoke(&set(&[Role::User, Role::Manager]), Role::Manager).is_ok());
    }

    #[test]
    fn role_names_round_trip() {
        for role in [Role::User, Role::Employee, Role::Manager, Role::Admin] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("root"), None);
    }
}
