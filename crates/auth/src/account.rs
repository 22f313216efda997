//! Account service: registration, login and claim management on top of an
//! [`IdentityStore`].
//!
//! Every mutating operation returns a [`ServiceResponse`]; store failures are
//! converted at the failing call and never escape as errors.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use identra_core::UserId;

use crate::claims::{ClaimType, claim_value, user_claims};
use crate::response::{ServiceResponse, messages};
use crate::store::{IdentityStore, Session, SessionToken, SignInStatus, StoreError};
use crate::user::NewUser;
use crate::{PermissionFlags, Policy, Principal};

// ─────────────────────────────────────────────────────────────────────────────
// Requests / projections
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub policy: String,
}

impl core::fmt::Debug for CreateUserRequest {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CreateUserRequest")
            .field("email", &self.email)
            .field("name", &self.name)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Deserialize)]
pub struct LoginUserRequest {
    pub email: String,
    pub password: String,
}

impl core::fmt::Debug for LoginUserRequest {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LoginUserRequest")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Full replacement claim set for an existing user. The email claim is
/// always taken from the stored record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeUserClaimsRequest {
    pub user_id: UserId,
    pub role_name: String,
    pub name: String,
    #[serde(flatten)]
    pub permissions: PermissionFlags,
}

/// One row of the user directory, projected from the user's claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserWithClaims {
    pub user_id: UserId,
    pub email: String,
    pub role_name: String,
    pub name: String,
    #[serde(flatten)]
    pub permissions: PermissionFlags,
}

/// Administrator seeded at startup.
#[derive(Clone, PartialEq, Eq)]
pub struct AdminSeed {
    pub email: String,
    pub password: String,
    pub name: String,
}

impl Default for AdminSeed {
    fn default() -> Self {
        Self {
            email: "admin@admin.com".to_string(),
            password: "Admin@123".to_string(),
            name: "Administrator".to_string(),
        }
    }
}

impl core::fmt::Debug for AdminSeed {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AdminSeed")
            .field("email", &self.email)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Service
// ─────────────────────────────────────────────────────────────────────────────

pub struct AccountService<S> {
    store: S,
}

impl<S> AccountService<S>
where
    S: IdentityStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Register a user and attach the claims of the requested policy.
    ///
    /// The policy is resolved before anything is written, so an unknown
    /// policy never leaves a claim-less account behind.
    #[instrument(skip(self, request), fields(email = %request.email, policy = %request.policy))]
    pub async fn create_user(&self, request: &CreateUserRequest) -> ServiceResponse {
        match self.store.find_by_email(&request.email).await {
            Ok(Some(_)) => return ServiceResponse::fail(messages::USER_ALREADY_EXISTS),
            Ok(None) => {}
            Err(e) => return e.into(),
        }

        let policy: Policy = match request.policy.parse() {
            Ok(p) => p,
            Err(e) => return ServiceResponse::fail(e.to_string()),
        };

        let new_user = NewUser::new(&request.email, &request.name, &request.password);
        let user = match self.store.create_user(new_user).await {
            Ok(u) => u,
            Err(e) => {
                debug!("store rejected new user: {e}");
                return e.into();
            }
        };

        let claims = policy.claims_for(&user.email, &request.name);
        if let Err(e) = self.store.add_claims(&user.id, &claims).await {
            warn!(user_id = %user.id, "user created but claims were not attached: {e}");
            return e.into();
        }

        info!(user_id = %user.id, %policy, "user created");
        ServiceResponse::ok_with(messages::USER_CREATED)
    }

    /// Verify credentials and issue a session.
    ///
    /// The error side is the failure envelope `login` would return.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn sign_in(&self, request: &LoginUserRequest) -> Result<Session, ServiceResponse> {
        let user = match self.store.find_by_email(&request.email).await {
            Ok(Some(u)) => u,
            Ok(None) => return Err(ServiceResponse::fail(messages::USER_NOT_FOUND)),
            Err(e) => return Err(e.into()),
        };

        match self.store.check_password(&user, &request.password).await {
            Ok(true) => {}
            Ok(false) => return Err(ServiceResponse::fail(messages::INCORRECT_CREDENTIALS)),
            Err(e) => return Err(e.into()),
        }

        match self.store.sign_in(&user).await {
            Ok(SignInStatus::Succeeded(session)) => {
                info!(user_id = %user.id, "signed in");
                Ok(session)
            }
            Ok(status) => {
                warn!(user_id = %user.id, ?status, "sign-in refused after password check");
                Err(ServiceResponse::fail(messages::UNKNOWN_SIGN_IN_ERROR))
            }
            Err(e) => {
                warn!(user_id = %user.id, "sign-in failed after password check: {e}");
                Err(ServiceResponse::fail(messages::UNKNOWN_SIGN_IN_ERROR))
            }
        }
    }

    /// `sign_in` reduced to its envelope: success carries no message.
    pub async fn login(&self, request: &LoginUserRequest) -> ServiceResponse {
        match self.sign_in(request).await {
            Ok(_) => ServiceResponse::ok(),
            Err(resp) => resp,
        }
    }

    #[instrument(skip(self))]
    pub async fn logout(&self, token: &SessionToken) -> ServiceResponse {
        match self.store.sign_out(token).await {
            Ok(()) => ServiceResponse::ok(),
            Err(e) => e.into(),
        }
    }

    /// Every user that carries at least one claim, one row each.
    #[instrument(skip(self))]
    pub async fn get_users_with_claims(&self) -> Result<Vec<UserWithClaims>, StoreError> {
        let users = self.store.list_users().await?;
        let mut rows = Vec::with_capacity(users.len());

        for user in users {
            let claims = self.store.get_claims(&user.id).await?;
            if claims.is_empty() {
                continue;
            }
            rows.push(UserWithClaims {
                user_id: user.id,
                email: claim_value(&claims, ClaimType::Email),
                role_name: claim_value(&claims, ClaimType::Role),
                name: claim_value(&claims, ClaimType::Name),
                permissions: PermissionFlags::from_claims(&claims),
            });
        }

        Ok(rows)
    }

    /// Replace a user's claims with a fully specified set.
    #[instrument(skip(self, request), fields(user_id = %request.user_id))]
    pub async fn update_user_claims(&self, request: &ChangeUserClaimsRequest) -> ServiceResponse {
        let user = match self.store.find_by_id(&request.user_id).await {
            Ok(Some(u)) => u,
            Ok(None) => return ServiceResponse::fail(messages::USER_NOT_FOUND),
            Err(e) => return e.into(),
        };

        let claims = user_claims(&user.email, &request.role_name, &request.name, &request.permissions);
        match self.store.replace_claims(&user.id, &claims).await {
            Ok(()) => {
                info!(role = %request.role_name, "user claims replaced");
                ServiceResponse::ok_with(messages::USER_UPDATED)
            }
            Err(e) => e.into(),
        }
    }

    /// Seed the administrator account. Repeat calls are no-ops through the
    /// existence check in `create_user`.
    #[instrument(skip(self, seed), fields(email = %seed.email))]
    pub async fn set_up(&self, seed: &AdminSeed) -> ServiceResponse {
        let response = self
            .create_user(&CreateUserRequest {
                email: seed.email.clone(),
                password: seed.password.clone(),
                name: seed.name.clone(),
                policy: Policy::Admin.name().to_string(),
            })
            .await;

        if response.success {
            info!("administrator seeded");
        } else if response.message() == Some(messages::USER_ALREADY_EXISTS) {
            debug!("administrator already present");
        } else {
            warn!(message = ?response.message, "administrator seeding failed");
        }
        response
    }

    /// Resolve the principal behind a session, if the session is live.
    #[instrument(skip(self))]
    pub async fn principal(&self, token: &SessionToken) -> Result<Option<Principal>, StoreError> {
        let Some(session) = self.store.find_session(token).await? else {
            return Ok(None);
        };
        let claims = self.store.get_claims(&session.user_id).await?;
        Ok(Some(Principal::from_claims(session.user_id, &claims)))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
