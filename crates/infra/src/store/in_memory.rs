use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, instrument};

use identra_auth::{
    Claim, IdentityStore, NewUser, PasswordPolicy, Session, SessionToken, SignInStatus, StoreError,
    User, normalize_email,
};
use identra_core::UserId;

use super::{claim_errors, duplicate_email_error, registration_errors, sort_claims};
use crate::password::BcryptHasher;

#[derive(Debug, Default)]
struct State {
    /// Registration order.
    users: Vec<User>,
    claims: HashMap<UserId, Vec<Claim>>,
    sessions: HashMap<SessionToken, Session>,
}

impl State {
    fn user(&self, id: &UserId) -> Option<&User> {
        self.users.iter().find(|u| &u.id == id)
    }

    fn ensure_user(&self, id: &UserId) -> Result<(), StoreError> {
        match self.user(id) {
            Some(_) => Ok(()),
            None => Err(StoreError::rejected(format!("User '{id}' does not exist."))),
        }
    }
}

/// In-memory identity store for tests/dev.
///
/// Passwords are bcrypt-hashed exactly as in production; lower the cost
/// with [`InMemoryIdentityStore::with_hasher`] to keep tests fast.
#[derive(Debug, Default)]
pub struct InMemoryIdentityStore {
    state: RwLock<State>,
    hasher: BcryptHasher,
    password_policy: PasswordPolicy,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hasher(mut self, hasher: BcryptHasher) -> Self {
        self.hasher = hasher;
        self
    }

    pub fn with_password_policy(mut self, policy: PasswordPolicy) -> Self {
        self.password_policy = policy;
        self
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, StoreError> {
        self.state
            .read()
            .map_err(|_| StoreError::unavailable("lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, StoreError> {
        self.state
            .write()
            .map_err(|_| StoreError::unavailable("lock poisoned"))
    }
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let wanted = normalize_email(email);
        let state = self.read()?;
        Ok(state
            .users
            .iter()
            .find(|u| u.normalized_email() == wanted)
            .cloned())
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, StoreError> {
        Ok(self.read()?.user(id).cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.read()?.users.clone())
    }

    #[instrument(skip(self, new_user), fields(email = %new_user.email), err)]
    async fn create_user(&self, new_user: NewUser) -> Result<User, StoreError> {
        let mut errors = registration_errors(&new_user, &self.password_policy);
        if self.find_by_email(&new_user.email).await?.is_some() {
            errors.push(duplicate_email_error(&new_user.email));
        }
        if !errors.is_empty() {
            return Err(StoreError::Rejected(errors));
        }

        // Hash outside the lock.
        let password_hash = self
            .hasher
            .hash(new_user.password())
            .await
            .map_err(|e| StoreError::unavailable(e.to_string()))?;

        let user = User {
            id: UserId::new(),
            email: new_user.email.clone(),
            display_name: new_user.display_name.clone(),
            password_hash,
            created_at: Utc::now(),
        };

        let mut state = self.write()?;
        let normalized = user.normalized_email();
        if state.users.iter().any(|u| u.normalized_email() == normalized) {
            return Err(StoreError::Rejected(vec![duplicate_email_error(&user.email)]));
        }
        state.users.push(user.clone());
        debug!(user_id = %user.id, "user stored");
        Ok(user)
    }

    async fn check_password(&self, user: &User, password: &str) -> Result<bool, StoreError> {
        self.hasher
            .verify(password, &user.password_hash)
            .await
            .map_err(|e| StoreError::unavailable(e.to_string()))
    }

    async fn sign_in(&self, user: &User) -> Result<SignInStatus, StoreError> {
        let mut state = self.write()?;
        if state.user(&user.id).is_none() {
            return Ok(SignInStatus::NotAllowed);
        }
        let session = Session::issue(user.id);
        state.sessions.insert(session.token, session.clone());
        Ok(SignInStatus::Succeeded(session))
    }

    async fn sign_out(&self, token: &SessionToken) -> Result<(), StoreError> {
        self.write()?.sessions.remove(token);
        Ok(())
    }

    async fn find_session(&self, token: &SessionToken) -> Result<Option<Session>, StoreError> {
        Ok(self.read()?.sessions.get(token).cloned())
    }

    async fn get_claims(&self, id: &UserId) -> Result<Vec<Claim>, StoreError> {
        Ok(self.read()?.claims.get(id).cloned().unwrap_or_default())
    }

    async fn add_claims(&self, id: &UserId, claims: &[Claim]) -> Result<(), StoreError> {
        let mut state = self.write()?;
        state.ensure_user(id)?;

        let existing = state.claims.get(id).map(Vec::as_slice).unwrap_or_default();
        let errors = claim_errors(existing, claims);
        if !errors.is_empty() {
            return Err(StoreError::Rejected(errors));
        }

        let stored = state.claims.entry(*id).or_default();
        stored.extend(claims.iter().cloned());
        sort_claims(stored);
        Ok(())
    }

    async fn remove_claims(&self, id: &UserId, claims: &[Claim]) -> Result<(), StoreError> {
        let mut state = self.write()?;
        state.ensure_user(id)?;

        let now_empty = match state.claims.get_mut(id) {
            Some(stored) => {
                stored.retain(|c| !claims.contains(c));
                stored.is_empty()
            }
            None => false,
        };
        if now_empty {
            state.claims.remove(id);
        }
        Ok(())
    }

    /// Validate the new set first, then swap it in under one write lock.
    /// On rejection the previous claims stay untouched.
    async fn replace_claims(&self, id: &UserId, claims: &[Claim]) -> Result<(), StoreError> {
        let mut state = self.write()?;
        state.ensure_user(id)?;

        let errors = claim_errors(&[], claims);
        if !errors.is_empty() {
            return Err(StoreError::Rejected(errors));
        }

        let mut next = claims.to_vec();
        sort_claims(&mut next);
        if next.is_empty() {
            state.claims.remove(id);
        } else {
            state.claims.insert(*id, next);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use identra_auth::{
        AccountService, AdminSeed, ChangeUserClaimsRequest, ClaimType, CreateUserRequest,
        LoginUserRequest, PermissionFlags, Policy, ServiceResponse, messages,
    };
    use std::sync::Arc;

    fn store() -> InMemoryIdentityStore {
        InMemoryIdentityStore::new().with_hasher(BcryptHasher::new(4).unwrap())
    }

    fn create(email: &str, password: &str, name: &str, policy: &str) -> CreateUserRequest {
        CreateUserRequest {
            email: email.to_string(),
            password: password.to_string(),
            name: name.to_string(),
            policy: policy.to_string(),
        }
    }

    fn login(email: &str, password: &str) -> LoginUserRequest {
        LoginUserRequest {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn passwords_are_stored_hashed() {
        let store = store();
        let user = store
            .create_user(NewUser::new("a@x.com", "Alice", "Abc12345!"))
            .await
            .unwrap();
        assert_ne!(user.password_hash, "Abc12345!");
        assert!(store.check_password(&user, "Abc12345!").await.unwrap());
        assert!(!store.check_password(&user, "Abc12345?").await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected_case_insensitively() {
        let store = store();
        store
            .create_user(NewUser::new("a@x.com", "Alice", "Abc12345!"))
            .await
            .unwrap();
        let err = store
            .create_user(NewUser::new("A@X.COM", "Alice", "Abc12345!"))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::Rejected(vec!["Email 'A@X.COM' is already taken.".into()]));
    }

    #[tokio::test]
    async fn weak_password_rejections_reach_the_caller_joined() {
        let service = AccountService::new(store());
        let resp = service.create_user(&create("a@x.com", "abcdefgh", "Alice", "User")).await;

        assert!(!resp.success);
        let message = resp.message().unwrap();
        assert_eq!(message.lines().count(), 3);
        assert!(message.contains("non alphanumeric"));
        assert!(message.contains("digit"));
        assert!(message.contains("uppercase"));
        assert!(service.store().list_users().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn add_claims_keeps_one_claim_per_type() {
        let store = store();
        let user = store
            .create_user(NewUser::new("a@x.com", "Alice", "Abc12345!"))
            .await
            .unwrap();
        store
            .add_claims(&user.id, &Policy::User.claims_for("a@x.com", "Alice"))
            .await
            .unwrap();

        let err = store
            .add_claims(&user.id, &[Claim::new(ClaimType::Role, "Admin")])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Rejected(_)));
        assert_eq!(store.get_claims(&user.id).await.unwrap().len(), 8);
    }

    #[tokio::test]
    async fn claims_for_unknown_user_are_rejected() {
        let store = store();
        let err = store
            .add_claims(&UserId::new(), &[Claim::new(ClaimType::Role, "Admin")])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[tokio::test]
    async fn rejected_replacement_leaves_old_claims_in_place() {
        let service = AccountService::new(store());
        service.create_user(&create("a@x.com", "Abc12345!", "Alice", "Admin")).await;
        let user = service.store().find_by_email("a@x.com").await.unwrap().unwrap();

        let err = service
            .store()
            .replace_claims(
                &user.id,
                &[Claim::new(ClaimType::Role, "User"), Claim::new(ClaimType::Role, "Manager")],
            )
            .await
            .unwrap_err();

        assert_eq!(err, StoreError::rejected("User already has a 'role' claim."));
        let claims = service.store().get_claims(&user.id).await.unwrap();
        assert_eq!(claims, Policy::Admin.claims_for("a@x.com", "Alice"));
    }

    #[tokio::test]
    async fn empty_display_name_still_yields_a_claimed_account() {
        let service = AccountService::new(store());

        assert_eq!(
            service.create_user(&create("a@x.com", "Abc12345!", "", "Admin")).await,
            ServiceResponse::ok_with(messages::USER_CREATED)
        );

        let rows = service.get_users_with_claims().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "");
        assert_eq!(rows[0].role_name, "Admin");
        assert_eq!(rows[0].permissions, PermissionFlags::ALL);
        assert_eq!(service.store().list_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn claims_update_accepts_empty_role_and_name() {
        let service = AccountService::new(store());
        service.create_user(&create("a@x.com", "Abc12345!", "Alice", "Admin")).await;
        let user = service.store().find_by_email("a@x.com").await.unwrap().unwrap();

        let resp = service
            .update_user_claims(&ChangeUserClaimsRequest {
                user_id: user.id,
                role_name: String::new(),
                name: String::new(),
                permissions: PermissionFlags::NONE,
            })
            .await;
        assert_eq!(resp, ServiceResponse::ok_with(messages::USER_UPDATED));

        let rows = service.get_users_with_claims().await.unwrap();
        assert_eq!(rows[0].email, "a@x.com");
        assert_eq!(rows[0].role_name, "");
        assert_eq!(rows[0].name, "");
        assert_eq!(rows[0].permissions, PermissionFlags::NONE);
    }

    #[tokio::test]
    async fn account_lifecycle_against_in_memory_store() {
        let service = AccountService::new(Arc::new(store()));

        assert_eq!(
            service.create_user(&create("a@x.com", "Abc12345!", "Alice", "Admin")).await,
            ServiceResponse::ok_with(messages::USER_CREATED)
        );
        assert_eq!(
            service.create_user(&create("a@x.com", "Xyz98765?", "Other", "User")).await,
            ServiceResponse::fail(messages::USER_ALREADY_EXISTS)
        );

        assert_eq!(
            service.login(&login("a@x.com", "nope")).await,
            ServiceResponse::fail(messages::INCORRECT_CREDENTIALS)
        );
        assert_eq!(service.login(&login("a@x.com", "Abc12345!")).await, ServiceResponse::ok());

        let rows = service.get_users_with_claims().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].role_name, "Admin");
        assert!(rows[0].permissions.create && rows[0].permissions.delete);

        let resp = service
            .update_user_claims(&ChangeUserClaimsRequest {
                user_id: rows[0].user_id,
                role_name: "User".into(),
                name: "Alice".into(),
                permissions: PermissionFlags::NONE,
            })
            .await;
        assert_eq!(resp, ServiceResponse::ok_with(messages::USER_UPDATED));

        let rows = service.get_users_with_claims().await.unwrap();
        assert_eq!(rows[0].role_name, "User");
        assert!(!rows[0].permissions.create);
        assert_eq!(rows[0].email, "a@x.com");
    }

    #[tokio::test]
    async fn seeded_admin_can_sign_in() {
        let service = AccountService::new(store());
        let seed = AdminSeed::default();
        assert!(service.set_up(&seed).await.success);
        assert!(!service.set_up(&seed).await.success);

        let session = service
            .sign_in(&login(&seed.email, &seed.password))
            .await
            .unwrap();
        let principal = service.principal(&session.token).await.unwrap().unwrap();
        assert_eq!(principal.role, "Admin");
        assert!(principal.permissions.manage_user);
        assert_eq!(service.store().list_users().await.unwrap().len(), 1);
    }
}
