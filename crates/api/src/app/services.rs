//! Identity store selection and the shared account service.
//!
//! `DATABASE_URL` unset → in-memory store (dev/test); set → PostgreSQL,
//! schema applied on startup.

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use identra_auth::{AccountService, IdentityStore, StoreError};
use identra_infra::{BcryptHasher, InMemoryIdentityStore, PostgresIdentityStore};

use crate::config::AppConfig;

/// Account service over a type-erased store, shared by all handlers.
pub type SharedAccounts = Arc<AccountService<Arc<dyn IdentityStore>>>;

#[derive(Debug, Error)]
pub enum ServicesError {
    #[error("failed to connect to PostgreSQL: {0}")]
    Connect(String),

    #[error("schema migration failed: {0}")]
    Migrate(#[from] StoreError),
}

pub fn in_memory_accounts(hasher: BcryptHasher) -> SharedAccounts {
    let store: Arc<dyn IdentityStore> = Arc::new(InMemoryIdentityStore::new().with_hasher(hasher));
    Arc::new(AccountService::new(store))
}

pub async fn build_accounts(config: &AppConfig) -> Result<SharedAccounts, ServicesError> {
    match config.database_url.as_deref() {
        None => {
            tracing::info!("using in-memory identity store");
            Ok(in_memory_accounts(config.hasher))
        }
        Some(url) => postgres_accounts(url, config.hasher).await,
    }
}

async fn postgres_accounts(url: &str, hasher: BcryptHasher) -> Result<SharedAccounts, ServicesError> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(url)
        .await
        .map_err(|e| ServicesError::Connect(e.to_string()))?;

    let store = PostgresIdentityStore::new(pool).with_hasher(hasher);
    store.migrate().await?;
    tracing::info!("using PostgreSQL identity store");

    let store: Arc<dyn IdentityStore> = Arc::new(store);
    Ok(Arc::new(AccountService::new(store)))
}
