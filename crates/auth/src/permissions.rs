use serde::{Deserialize, Serialize};

use crate::claims::{Claim, ClaimType, find_claim};

/// Permission encoded as a boolean flag claim.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Create,
    Update,
    Delete,
    Read,
    ManageUser,
}

impl Permission {
    pub const ALL: [Permission; 5] = [
        Permission::Create,
        Permission::Update,
        Permission::Delete,
        Permission::Read,
        Permission::ManageUser,
    ];

    /// Claim type that carries this permission.
    pub fn claim_type(self) -> ClaimType {
        match self {
            Permission::Create => ClaimType::Create,
            Permission::Update => ClaimType::Update,
            Permission::Delete => ClaimType::Delete,
            Permission::Read => ClaimType::Read,
            Permission::ManageUser => ClaimType::ManageUser,
        }
    }

    pub fn as_str(self) -> &'static str {
        self.claim_type().as_str()
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The five permission flags of a user. Absent flags deserialize as `false`.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionFlags {
    pub create: bool,
    pub update: bool,
    pub delete: bool,
    pub read: bool,
    pub manage_user: bool,
}

impl PermissionFlags {
    pub const NONE: PermissionFlags = PermissionFlags {
        create: false,
        update: false,
        delete: false,
        read: false,
        manage_user: false,
    };

    pub const ALL: PermissionFlags = PermissionFlags {
        create: true,
        update: true,
        delete: true,
        read: true,
        manage_user: true,
    };

    pub fn granted(&self, permission: Permission) -> bool {
        match permission {
            Permission::Create => self.create,
            Permission::Update => self.update,
            Permission::Delete => self.delete,
            Permission::Read => self.read,
            Permission::ManageUser => self.manage_user,
        }
    }

    pub fn to_claims(&self) -> Vec<Claim> {
        Permission::ALL
            .into_iter()
            .map(|p| Claim::flag(p.claim_type(), self.granted(p)))
            .collect()
    }

    /// Read the flags back out of a claim set. Missing flags read as `false`.
    pub fn from_claims(claims: &[Claim]) -> Self {
        let flag = |p: Permission| find_claim(claims, p.claim_type()).is_some_and(Claim::as_flag);
        Self {
            create: flag(Permission::Create),
            update: flag(Permission::Update),
            delete: flag(Permission::Delete),
            read: flag(Permission::Read),
            manage_user: flag(Permission::ManageUser),
        }
    }
}
