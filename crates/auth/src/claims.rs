use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::PermissionFlags;

/// Claim type attached to a user record.
///
/// A user carries at most one claim of each type; stores reject additions
/// that would duplicate a type already present.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimType {
    Email,
    Role,
    Name,
    Create,
    Update,
    Delete,
    Read,
    ManageUser,
}

impl ClaimType {
    /// Every claim type, in the order claim sets are composed.
    pub const ALL: [ClaimType; 8] = [
        ClaimType::Email,
        ClaimType::Role,
        ClaimType::Name,
        ClaimType::Create,
        ClaimType::Update,
        ClaimType::Delete,
        ClaimType::Read,
        ClaimType::ManageUser,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimType::Email => "email",
            ClaimType::Role => "role",
            ClaimType::Name => "name",
            ClaimType::Create => "create",
            ClaimType::Update => "update",
            ClaimType::Delete => "delete",
            ClaimType::Read => "read",
            ClaimType::ManageUser => "manage_user",
        }
    }

    /// Whether the claim carries a boolean permission flag.
    pub fn is_flag(&self) -> bool {
        !matches!(self, ClaimType::Email | ClaimType::Role | ClaimType::Name)
    }
}

impl core::fmt::Display for ClaimType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown claim type '{0}'")]
pub struct UnknownClaimType(pub String);

impl FromStr for ClaimType {
    type Err = UnknownClaimType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ClaimType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownClaimType(s.to_string()))
    }
}

/// A typed attribute attached to a user.
///
/// Claims have no identity of their own: two claims with the same type and
/// value are the same claim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Claim {
    #[serde(rename = "type")]
    pub claim_type: ClaimType,
    pub value: String,
}

impl Claim {
    pub fn new(claim_type: ClaimType, value: impl Into<String>) -> Self {
        Self {
            claim_type,
            value: value.into(),
        }
    }

    /// Boolean permission claim, stored as `"true"` / `"false"`.
    pub fn flag(claim_type: ClaimType, granted: bool) -> Self {
        Self::new(claim_type, if granted { "true" } else { "false" })
    }

    /// Interpret the value as a flag. Anything other than a case-insensitive
    /// `"true"` reads as not granted.
    pub fn as_flag(&self) -> bool {
        self.value.trim().eq_ignore_ascii_case("true")
    }
}

/// First claim of the given type, if any.
pub fn find_claim(claims: &[Claim], claim_type: ClaimType) -> Option<&Claim> {
    claims.iter().find(|c| c.claim_type == claim_type)
}

/// Value of the given claim type, or an empty string when absent.
pub fn claim_value(claims: &[Claim], claim_type: ClaimType) -> String {
    find_claim(claims, claim_type)
        .map(|c| c.value.clone())
        .unwrap_or_default()
}

/// Compose the complete claim set of a user:
/// email, role, name, then the five permission flags.
pub fn user_claims(email: &str, role: &str, name: &str, flags: &PermissionFlags) -> Vec<Claim> {
    let mut claims = Vec::with_capacity(ClaimType::ALL.len());
    claims.push(Claim::new(ClaimType::Email, email));
    claims.push(Claim::new(ClaimType::Role, role));
    claims.push(Claim::new(ClaimType::Name, name));
    claims.extend(flags.to_claims());
    claims
}
