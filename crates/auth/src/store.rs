//! Identity store capability boundary.
//!
//! The account service never touches persistence, hashing or sessions
//! directly; it talks to an [`IdentityStore`]. Implementations live in
//! `identra-infra`.

use core::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use identra_core::UserId;

use crate::claims::Claim;
use crate::response::ServiceResponse;
use crate::user::{NewUser, User};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store refused the operation; one description per problem.
    #[error("{}", .0.join("\n"))]
    Rejected(Vec<String>),

    /// The backing system could not be reached or failed unexpectedly.
    #[error("identity store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn rejected(description: impl Into<String>) -> Self {
        Self::Rejected(vec![description.into()])
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn descriptions(&self) -> Vec<String> {
        match self {
            StoreError::Rejected(d) => d.clone(),
            StoreError::Unavailable(_) => vec![self.to_string()],
        }
    }
}

impl From<StoreError> for ServiceResponse {
    fn from(err: StoreError) -> Self {
        ServiceResponse::from_errors(err.descriptions())
    }
}

/// Opaque session handle issued on sign-in.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(Uuid);

impl SessionToken {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionToken {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for SessionToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0.simple(), f)
    }
}

impl FromStr for SessionToken {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s.trim())?))
    }
}

/// An issued sign-in session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: SessionToken,
    pub user_id: UserId,
    pub issued_at: DateTime<Utc>,
}

impl Session {
    pub fn issue(user_id: UserId) -> Self {
        Self {
            token: SessionToken::new(),
            user_id,
            issued_at: Utc::now(),
        }
    }
}

/// Outcome of the sign-in step that follows a successful password check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInStatus {
    Succeeded(Session),
    LockedOut,
    NotAllowed,
}

/// Narrow capability interface over the system of record for accounts,
/// credentials, sessions and claims.
///
/// Lookups by email are case-insensitive.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, StoreError>;

    /// Every stored user, materialized.
    async fn list_users(&self) -> Result<Vec<User>, StoreError>;

    /// Validate, hash and persist a new account.
    async fn create_user(&self, new_user: NewUser) -> Result<User, StoreError>;

    async fn check_password(&self, user: &User, password: &str) -> Result<bool, StoreError>;

    async fn sign_in(&self, user: &User) -> Result<SignInStatus, StoreError>;

    async fn sign_out(&self, token: &SessionToken) -> Result<(), StoreError>;

    async fn find_session(&self, token: &SessionToken) -> Result<Option<Session>, StoreError>;

    async fn get_claims(&self, id: &UserId) -> Result<Vec<Claim>, StoreError>;

    /// Rejects a claim whose type the user already carries.
    async fn add_claims(&self, id: &UserId, claims: &[Claim]) -> Result<(), StoreError>;

    async fn remove_claims(&self, id: &UserId, claims: &[Claim]) -> Result<(), StoreError>;

    /// Replace the user's whole claim set.
    ///
    /// The default is two-phase: removal then addition. If removal fails
    /// nothing is added; if addition fails the user is left without claims.
    /// Stores with transactional storage override this with an atomic swap.
    async fn replace_claims(&self, id: &UserId, claims: &[Claim]) -> Result<(), StoreError> {
        let existing = self.get_claims(id).await?;
        self.remove_claims(id, &existing).await?;
        self.add_claims(id, claims).await
    }
}

#[async_trait]
impl<S> IdentityStore for Arc<S>
where
    S: IdentityStore + ?Sized,
{
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        (**self).find_by_email(email).await
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, StoreError> {
        (**self).find_by_id(id).await
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        (**self).list_users().await
    }

    async fn create_user(&self, new_user: NewUser) -> Result<User, StoreError> {
        (**self).create_user(new_user).await
    }

    async fn check_password(&self, user: &User, password: &str) -> Result<bool, StoreError> {
        (**self).check_password(user, password).await
    }

    async fn sign_in(&self, user: &User) -> Result<SignInStatus, StoreError> {
        (**self).sign_in(user).await
    }

    async fn sign_out(&self, token: &SessionToken) -> Result<(), StoreError> {
        (**self).sign_out(token).await
    }

    async fn find_session(&self, token: &SessionToken) -> Result<Option<Session>, StoreError> {
        (**self).find_session(token).await
    }

    async fn get_claims(&self, id: &UserId) -> Result<Vec<Claim>, StoreError> {
        (**self).get_claims(id).await
    }

    async fn add_claims(&self, id: &UserId, claims: &[Claim]) -> Result<(), StoreError> {
        (**self).add_claims(id, claims).await
    }

    async fn remove_claims(&self, id: &UserId, claims: &[Claim]) -> Result<(), StoreError> {
        (**self).remove_claims(id, claims).await
    }

    async fn replace_claims(&self, id: &UserId, claims: &[Claim]) -> Result<(), StoreError> {
        (**self).replace_claims(id, claims).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_errors_join_descriptions() {
        let err = StoreError::Rejected(vec!["a".into(), "b".into()]);
        assert_eq!(err.to_string(), "a\nb");
        let resp: ServiceResponse = err.into();
        assert_eq!(resp.message(), Some("a\nb"));
    }

    #[test]
    fn session_token_parses_its_display_form() {
        let token = SessionToken::new();
        assert_eq!(token.to_string().parse::<SessionToken>().unwrap(), token);
    }
}
