//! Infrastructure layer: identity store implementations and password hashing.

pub mod password;
pub mod store;

pub use password::{BcryptHasher, PasswordHashError};
pub use store::{InMemoryIdentityStore, PostgresIdentityStore};
