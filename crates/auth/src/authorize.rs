use serde::Serialize;
use thiserror::Error;

use identra_core::UserId;

use crate::claims::{Claim, ClaimType, claim_value};
use crate::{Permission, PermissionFlags};

/// A signed-in user resolved from their current claim set.
///
/// Construction is decoupled from storage and transport: the HTTP layer
/// builds one from a session, tests build one from literal claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub user_id: UserId,
    pub email: String,
    pub role: String,
    pub name: String,
    pub permissions: PermissionFlags,
}

impl Principal {
    pub fn from_claims(user_id: UserId, claims: &[Claim]) -> Self {
        Self {
            user_id,
            email: claim_value(claims, ClaimType::Email),
            role: claim_value(claims, ClaimType::Role),
            name: claim_value(claims, ClaimType::Name),
            permissions: PermissionFlags::from_claims(claims),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(Permission),
}

/// Check that the principal holds the permission flag.
///
/// - No IO
/// - No panics
pub fn authorize(principal: &Principal, required: Permission) -> Result<(), AuthzError> {
    if principal.permissions.granted(required) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Policy;

    #[test]
    fn admin_may_manage_users() {
        let claims = Policy::Admin.claims_for("root@x.com", "Root");
        let principal = Principal::from_claims(UserId::new(), &claims);
        assert_eq!(principal.role, "Admin");
        assert!(authorize(&principal, Permission::ManageUser).is_ok());
    }

    #[test]
    fn manager_is_denied_delete_and_user_management() {
        let claims = Policy::Manager.claims_for("m@x.com", "Mia");
        let principal = Principal::from_claims(UserId::new(), &claims);
        assert!(authorize(&principal, Permission::Create).is_ok());
        assert_eq!(
            authorize(&principal, Permission::Delete),
            Err(AuthzError::Forbidden(Permission::Delete))
        );
        let err = authorize(&principal, Permission::ManageUser).unwrap_err();
        assert!(err.to_string().contains("manage_user"));
    }

    #[test]
    fn claimless_principal_is_denied_everything() {
        let principal = Principal::from_claims(UserId::new(), &[]);
        for p in Permission::ALL {
            assert!(authorize(&principal, p).is_err());
        }
    }
}
