//! Postgres-backed identity store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Code | StoreError | Scenario |
//! |------------|-----------------|------------|----------|
//! | Database (unique violation) | `23505` | `Rejected` | Duplicate email or claim type (concurrent writer) |
//! | Database (foreign key violation) | `23503` | `Rejected` | User vanished mid-operation |
//! | Database (other) | Any other | `Unavailable` | Other database errors |
//! | PoolClosed / network / other | N/A | `Unavailable` | Connection failures |
//!
//! ## Atomic claim replacement
//!
//! `replace_claims` deletes and re-inserts inside one transaction with the
//! user row locked, so a failed insert rolls the deletion back.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use identra_auth::{
    Claim, ClaimType, IdentityStore, NewUser, PasswordPolicy, Session, SessionToken, SignInStatus,
    StoreError, User, normalize_email,
};
use identra_core::UserId;

use super::{claim_errors, duplicate_email_error, registration_errors, sort_claims};
use crate::password::BcryptHasher;

/// Schema applied by [`PostgresIdentityStore::migrate`]. Idempotent.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS identity_users (
    user_id          UUID PRIMARY KEY,
    email            TEXT NOT NULL,
    normalized_email TEXT NOT NULL UNIQUE,
    display_name     TEXT NOT NULL,
    password_hash    TEXT NOT NULL,
    created_at       TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS identity_user_claims (
    user_id     UUID NOT NULL REFERENCES identity_users (user_id) ON DELETE CASCADE,
    claim_type  TEXT NOT NULL,
    claim_value TEXT NOT NULL,
    PRIMARY KEY (user_id, claim_type)
);

CREATE TABLE IF NOT EXISTS identity_sessions (
    token     UUID PRIMARY KEY,
    user_id   UUID NOT NULL REFERENCES identity_users (user_id) ON DELETE CASCADE,
    issued_at TIMESTAMPTZ NOT NULL
);
"#;

/// Postgres-backed identity store.
///
/// Uses the SQLx connection pool, which is `Send + Sync`; the store can be
/// shared across request handlers behind an `Arc`.
#[derive(Debug, Clone)]
pub struct PostgresIdentityStore {
    pool: Arc<PgPool>,
    hasher: BcryptHasher,
    password_policy: PasswordPolicy,
}

impl PostgresIdentityStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
            hasher: BcryptHasher::default(),
            password_policy: PasswordPolicy::default(),
        }
    }

    pub fn with_hasher(mut self, hasher: BcryptHasher) -> Self {
        self.hasher = hasher;
        self
    }

    pub fn with_password_policy(mut self, policy: PasswordPolicy) -> Self {
        self.password_policy = policy;
        self
    }

    /// Create the identity tables if they are missing.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }

    async fn begin(&self) -> Result<Transaction<'static, Postgres>, StoreError> {
        self.pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))
    }
}

/// Lock the user row for the rest of the transaction.
async fn lock_user(tx: &mut Transaction<'static, Postgres>, id: &UserId) -> Result<(), StoreError> {
    let row = sqlx::query("SELECT 1 FROM identity_users WHERE user_id = $1 FOR UPDATE")
        .bind(id.as_uuid())
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("lock_user", e))?;

    match row {
        Some(_) => Ok(()),
        None => Err(StoreError::rejected(format!("User '{id}' does not exist."))),
    }
}

async fn insert_claims(
    tx: &mut Transaction<'static, Postgres>,
    id: &UserId,
    claims: &[Claim],
) -> Result<(), StoreError> {
    for claim in claims {
        sqlx::query(
            r#"
            INSERT INTO identity_user_claims (user_id, claim_type, claim_value)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(id.as_uuid())
        .bind(claim.claim_type.as_str())
        .bind(&claim.value)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::rejected(format!("User already has a '{}' claim.", claim.claim_type))
            } else {
                map_sqlx_error("insert_claim", e)
            }
        })?;
    }
    Ok(())
}

async fn load_claims<'e, E>(executor: E, id: &UserId) -> Result<Vec<Claim>, StoreError>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let rows = sqlx::query(
        r#"
        SELECT claim_type, claim_value
        FROM identity_user_claims
        WHERE user_id = $1
        "#,
    )
    .bind(id.as_uuid())
    .fetch_all(executor)
    .await
    .map_err(|e| map_sqlx_error("load_claims", e))?;

    let mut claims = rows
        .iter()
        .map(claim_from_row)
        .collect::<Result<Vec<_>, _>>()?;
    sort_claims(&mut claims);
    Ok(claims)
}

#[async_trait]
impl IdentityStore for PostgresIdentityStore {
    #[instrument(skip(self), err)]
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT user_id, email, display_name, password_hash, created_at
            FROM identity_users
            WHERE normalized_email = $1
            "#,
        )
        .bind(normalize_email(email))
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_by_email", e))?;

        row.as_ref().map(user_from_row).transpose()
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT user_id, email, display_name, password_hash, created_at
            FROM identity_users
            WHERE user_id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_by_id", e))?;

        row.as_ref().map(user_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, email, display_name, password_hash, created_at
            FROM identity_users
            ORDER BY created_at ASC, user_id ASC
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_users", e))?;

        rows.iter().map(user_from_row).collect()
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

        sqlx::query(
            r#"
            INSERT INTO identity_users (
                user_id,
                email,
                normalized_email,
                display_name,
                password_hash,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.email)
        .bind(user.normalized_email())
        .bind(&user.display_name)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Rejected(vec![duplicate_email_error(&user.email)])
            } else {
                map_sqlx_error("insert_user", e)
            }
        })?;

        Ok(user)
    }

    async fn check_password(&self, user: &User, password: &str) -> Result<bool, StoreError> {
        self.hasher
            .verify(password, &user.password_hash)
            .await
            .map_err(|e| StoreError::unavailable(e.to_string()))
    }

    #[instrument(skip(self, user), fields(user_id = %user.id), err)]
    async fn sign_in(&self, user: &User) -> Result<SignInStatus, StoreError> {
        let session = Session::issue(user.id);

        let result = sqlx::query(
            r#"
            INSERT INTO identity_sessions (token, user_id, issued_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(session.token.as_uuid())
        .bind(session.user_id.as_uuid())
        .bind(session.issued_at)
        .execute(&*self.pool)
        .await;

        match result {
            Ok(_) => Ok(SignInStatus::Succeeded(session)),
            Err(e) if is_foreign_key_violation(&e) => Ok(SignInStatus::NotAllowed),
            Err(e) => Err(map_sqlx_error("insert_session", e)),
        }
    }

    #[instrument(skip(self), err)]
    async fn sign_out(&self, token: &SessionToken) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM identity_sessions WHERE token = $1")
            .bind(token.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_session", e))?;
        Ok(())
    }

    async fn find_session(&self, token: &SessionToken) -> Result<Option<Session>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT token, user_id, issued_at
            FROM identity_sessions
            WHERE token = $1
            "#,
        )
        .bind(token.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_session", e))?;

        row.as_ref().map(session_from_row).transpose()
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn get_claims(&self, id: &UserId) -> Result<Vec<Claim>, StoreError> {
        load_claims(&*self.pool, id).await
    }

    #[instrument(skip(self, claims), fields(user_id = %id, count = claims.len()), err)]
    async fn add_claims(&self, id: &UserId, claims: &[Claim]) -> Result<(), StoreError> {
        let mut tx = self.begin().await?;
        lock_user(&mut tx, id).await?;

        let existing = load_claims(&mut *tx, id).await?;
        let errors = claim_errors(&existing, claims);
        if !errors.is_empty() {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(StoreError::Rejected(errors));
        }

        insert_claims(&mut tx, id, claims).await?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    #[instrument(skip(self, claims), fields(user_id = %id, count = claims.len()), err)]
    async fn remove_claims(&self, id: &UserId, claims: &[Claim]) -> Result<(), StoreError> {
        let mut tx = self.begin().await?;
        lock_user(&mut tx, id).await?;

        for claim in claims {
            sqlx::query(
                r#"
                DELETE FROM identity_user_claims
                WHERE user_id = $1 AND claim_type = $2 AND claim_value = $3
                "#,
            )
            .bind(id.as_uuid())
            .bind(claim.claim_type.as_str())
            .bind(&claim.value)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_claim", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    #[instrument(skip(self, claims), fields(user_id = %id, count = claims.len()), err)]
    async fn replace_claims(&self, id: &UserId, claims: &[Claim]) -> Result<(), StoreError> {
        let errors = claim_errors(&[], claims);
        if !errors.is_empty() {
            return Err(StoreError::Rejected(errors));
        }

        let mut tx = self.begin().await?;
        lock_user(&mut tx, id).await?;

        sqlx::query("DELETE FROM identity_user_claims WHERE user_id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_claims", e))?;

        // Dropping the transaction on error rolls the deletion back.
        insert_claims(&mut tx, id, claims).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }
}

// SQLx row mapping

fn user_from_row(row: &PgRow) -> Result<User, StoreError> {
    let map = |e| map_sqlx_error("decode_user", e);
    let user_id: uuid::Uuid = row.try_get("user_id").map_err(map)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(map)?;

    Ok(User {
        id: UserId::from_uuid(user_id),
        email: row.try_get("email").map_err(map)?,
        display_name: row.try_get("display_name").map_err(map)?,
        password_hash: row.try_get("password_hash").map_err(map)?,
        created_at,
    })
}

fn claim_from_row(row: &PgRow) -> Result<Claim, StoreError> {
    let map = |e| map_sqlx_error("decode_claim", e);
    let claim_type: String = row.try_get("claim_type").map_err(map)?;
    let value: String = row.try_get("claim_value").map_err(map)?;

    let claim_type: ClaimType = claim_type
        .parse()
        .map_err(|e| StoreError::unavailable(format!("corrupt claim row: {e}")))?;
    Ok(Claim::new(claim_type, value))
}

fn session_from_row(row: &PgRow) -> Result<Session, StoreError> {
    let map = |e| map_sqlx_error("decode_session", e);
    let token: uuid::Uuid = row.try_get("token").map_err(map)?;
    let user_id: uuid::Uuid = row.try_get("user_id").map_err(map)?;

    Ok(Session {
        token: SessionToken::from_uuid(token),
        user_id: UserId::from_uuid(user_id),
        issued_at: row.try_get("issued_at").map_err(map)?,
    })
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") | Some("23503") => StoreError::Rejected(vec![msg]),
                _ => StoreError::Unavailable(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Unavailable(format!("connection pool closed in {operation}"))
        }
        _ => StoreError::Unavailable(format!("sqlx error in {operation}: {err}")),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    sql_state(err).as_deref() == Some("23505")
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    sql_state(err).as_deref() == Some("23503")
}

fn sql_state(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().map(|c| c.into_owned()),
        _ => None,
    }
}
