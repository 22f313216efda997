//! Policy-to-claims mapping.
//!
//! A policy is a named bundle of permission flags applied when an account is
//! created. Policies are never persisted; the claim set is recomputed from the
//! name every time.

use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::claims::{Claim, user_claims};
use crate::PermissionFlags;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Policy {
    Admin,
    Manager,
    User,
}

/// Constant claim template of a policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyTemplate {
    pub role: &'static str,
    pub flags: PermissionFlags,
}

/// Indexed by `Policy as usize`.
static POLICY_TABLE: [(Policy, PolicyTemplate); 3] = [
    (
        Policy::Admin,
        PolicyTemplate {
            role: "Admin",
            flags: PermissionFlags::ALL,
        },
    ),
    (
        Policy::Manager,
        PolicyTemplate {
            role: "Manager",
            flags: PermissionFlags {
                create: true,
                update: true,
                delete: false,
                read: true,
                manage_user: false,
            },
        },
    ),
    (
        Policy::User,
        PolicyTemplate {
            role: "User",
            flags: PermissionFlags::NONE,
        },
    ),
];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("No Policy Specified")]
    NotSpecified,
}

impl Policy {
    pub const ALL: [Policy; 3] = [Policy::Admin, Policy::Manager, Policy::User];

    pub fn name(self) -> &'static str {
        self.template().role
    }

    pub fn template(self) -> &'static PolicyTemplate {
        &POLICY_TABLE[self as usize].1
    }

    /// Claim set for a user created under this policy.
    pub fn claims_for(self, email: &str, name: &str) -> Vec<Claim> {
        let template = self.template();
        user_claims(email, template.role, name, &template.flags)
    }
}

impl core::fmt::Display for Policy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Policy {
    type Err = PolicyError;

    /// Case-insensitive; there is no fallback policy.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Policy::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s))
            .ok_or(PolicyError::NotSpecified)
    }
}

/// Resolve a policy by name and produce the claim set for the given user.
pub fn claims_for_policy(policy: &str, email: &str, name: &str) -> Result<Vec<Claim>, PolicyError> {
    let policy: Policy = policy.parse()?;
    Ok(policy.claims_for(email, name))
}
