use std::{collections::BTreeSet, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;

use crate::error::AuthzError;

use super::Principal;

/// Role
///
/// The closed set of permission levels, declared in ascending order of privilege.
/// The derived `Ord` is the privilege order: every role passes the checks of the roles below it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    User,
    Admin,
}

/// The requested value is not a member of the role enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid role: {0:?}")]
pub struct InvalidRoleValue(pub String);

impl Role {
    pub const ALL: [Role; 2] = [Role::User, Role::Admin];

    pub const fn code(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    /// Every role at or above `min` in the privilege order.
    pub fn at_least(min: Role) -> impl Iterator<Item = Role> {
        Self::ALL.into_iter().filter(move |role| *role >= min)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Role {
    type Err = InvalidRoleValue;

    /// Exact, case-sensitive match against the enumeration codes.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|role| role.code() == s)
            .ok_or_else(|| InvalidRoleValue(s.to_string()))
    }
}

/// RoleGate
///
/// A single authorization checkpoint, constructed with the explicit set of roles it admits.
/// Gates run after authentication has bound a `Principal` and are composed by applying
/// one after another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleGate {
    allowed: BTreeSet<Role>,
}

impl RoleGate {
    pub fn new(allowed: impl IntoIterator<Item = Role>) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
        }
    }

    /// Admits `min` and every role above it.
    pub fn at_least(min: Role) -> Self {
        Self::new(Role::at_least(min))
    }

    /// Checkpoint for baseline features: users and administrators.
    pub fn baseline() -> Self {
        Self::at_least(Role::User)
    }

    /// Checkpoint for administrative features only.
    pub fn admin_only() -> Self {
        Self::new([Role::Admin])
    }

    pub fn allows(&self, role: Role) -> bool {
        self.allowed.contains(&role)
    }

    /// check
    ///
    /// `None` means no principal was bound, i.e. the gate was mounted without authentication
    /// in front of it.
    pub fn check(&self, principal: Option<&Principal>) -> Result<(), AuthzError> {
        let principal = principal.ok_or(AuthzError::NotAuthenticated)?;
        if self.allows(principal.role) {
            Ok(())
        } else {
            Err(AuthzError::NotAuthorized)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn principal(role: Role) -> Principal {
        Principal {
            id: Uuid::from_u128(7),
            role,
        }
    }

    #[test]
    fn test_role_from_str() {
        assert_eq!("user".parse::<Role>(), Ok(Role::User));
        assert_eq!("admin".parse::<Role>(), Ok(Role::Admin));
        for bad in ["superuser", "Admin", "ADMIN", "", " admin", "root"] {
            assert_eq!(
                bad.parse::<Role>(),
                Err(InvalidRoleValue(bad.to_string())),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn test_invalid_role_value_is_an_error() {
        let err: Box<dyn std::error::Error> = Box::new(InvalidRoleValue("root".to_string()));
        assert_eq!(err.to_string(), "invalid role: \"root\"");
    }

    #[test]
    fn test_role_order_and_display() {
        assert!(Role::Admin > Role::User);
        assert_eq!(Role::User.to_string(), "user");
        assert_eq!(Role::Admin.to_string(), "admin");
        assert_eq!(Role::at_least(Role::User).count(), Role::ALL.len());
        assert_eq!(Role::at_least(Role::Admin).collect::<Vec<_>>(), vec![Role::Admin]);
    }

    #[test]
    fn test_role_serde_uses_codes() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        assert_eq!(serde_json::from_str::<Role>("\"user\"").unwrap(), Role::User);
        assert!(serde_json::from_str::<Role>("\"superuser\"").is_err());
    }

    #[test]
    fn test_admin_only_gate() {
        let gate = RoleGate::admin_only();
        assert_eq!(
            gate.check(Some(&principal(Role::User))),
            Err(AuthzError::NotAuthorized)
        );
        assert_eq!(gate.check(Some(&principal(Role::Admin))), Ok(()));
    }

    #[test]
    fn test_baseline_gate_admits_elevated_role() {
        let gate = RoleGate::baseline();
        for role in Role::ALL {
            assert_eq!(gate.check(Some(&principal(role))), Ok(()));
        }
    }

    #[test]
    fn test_at_least_gate_follows_privilege_order() {
        for min in Role::ALL {
            let gate = RoleGate::at_least(min);
            for role in Role::ALL {
                assert_eq!(gate.allows(role), role >= min);
            }
        }
    }

    #[test]
    fn test_gate_without_principal() {
        assert_eq!(
            RoleGate::baseline().check(None),
            Err(AuthzError::NotAuthenticated)
        );
        assert_eq!(
            RoleGate::admin_only().check(None),
            Err(AuthzError::NotAuthenticated)
        );
    }

    #[test]
    fn test_empty_gate_rejects_everyone() {
        let gate = RoleGate::new(Vec::<Role>::new());
        assert_eq!(
            gate.check(Some(&principal(Role::Admin))),
            Err(AuthzError::NotAuthorized)
        );
    }
}
