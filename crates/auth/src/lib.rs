//! `identra-auth`: claims-based identity model and account lifecycle.
//!
//! This crate is intentionally decoupled from HTTP and storage: persistence,
//! hashing and sessions sit behind [`IdentityStore`].

pub mod account;
pub mod authorize;
pub mod claims;
pub mod password;
pub mod permissions;
pub mod policy;
pub mod response;
pub mod store;
pub mod user;

pub use account::{
    AccountService, AdminSeed, ChangeUserClaimsRequest, CreateUserRequest, LoginUserRequest,
    UserWithClaims,
};
pub use authorize::{AuthzError, Principal, authorize};
pub use claims::{Claim, ClaimType};
pub use password::PasswordPolicy;
pub use permissions::{Permission, PermissionFlags};
pub use policy::{Policy, PolicyError, claims_for_policy};
pub use response::{ServiceResponse, messages};
pub use store::{IdentityStore, Session, SessionToken, SignInStatus, StoreError};
pub use user::{NewUser, User, normalize_email};
