use serde::Deserialize;

use identra_auth::{ChangeUserClaimsRequest, PermissionFlags};
use identra_core::UserId;

/// Body of `PUT /account/users/:id/claims`; the id comes from the path.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateClaimsBody {
    pub role_name: String,
    pub name: String,
    #[serde(flatten)]
    pub permissions: PermissionFlags,
}

impl UpdateClaimsBody {
    pub fn into_request(self, user_id: UserId) -> ChangeUserClaimsRequest {
        ChangeUserClaimsRequest {
            user_id,
            role_name: self.role_name,
            name: self.name,
            permissions: self.permissions,
        }
    }
}
