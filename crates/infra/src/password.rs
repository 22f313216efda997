//! Password hashing (bcrypt).
//!
//! Hashing and verification are CPU-bound and run on the blocking thread
//! pool so they never stall the async runtime.

use thiserror::Error;

/// Cost used when none is configured.
pub const DEFAULT_BCRYPT_COST: u32 = bcrypt::DEFAULT_COST;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PasswordHashError {
    #[error("bcrypt cost must be within 4..=31, got {0}")]
    InvalidCost(u32),

    #[error("password hashing failed: {0}")]
    Hashing(String),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    pub fn new(cost: u32) -> Result<Self, PasswordHashError> {
        if !(4..=31).contains(&cost) {
            return Err(PasswordHashError::InvalidCost(cost));
        }
        Ok(Self { cost })
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    pub async fn hash(&self, password: &str) -> Result<String, PasswordHashError> {
        let password = password.to_string();
        let cost = self.cost;

        tokio::task::spawn_blocking(move || {
            bcrypt::hash(password, cost).map_err(|e| PasswordHashError::Hashing(e.to_string()))
        })
        .await
        .map_err(|e| PasswordHashError::Hashing(format!("task join error: {e}")))?
    }

    /// `Ok(false)` on mismatch; `Err` only when the stored hash is unusable.
    pub async fn verify(&self, password: &str, hash: &str) -> Result<bool, PasswordHashError> {
        let password = password.to_string();
        let hash = hash.to_string();

        tokio::task::spawn_blocking(move || {
            bcrypt::verify(password, &hash).map_err(|e| PasswordHashError::Hashing(e.to_string()))
        })
        .await
        .map_err(|e| PasswordHashError::Hashing(format!("task join error: {e}")))?
    }
}

impl Default for BcryptHasher {
    fn default() -> Self {
        Self {
            cost: DEFAULT_BCRYPT_COST,
        }
    }
}
