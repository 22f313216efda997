//! User account record.

use chrono::{DateTime, Utc};
use serde::Serialize;
use zeroize::Zeroizing;

use identra_core::UserId;

/// Normalized form used for the unique-email check (case-insensitive).
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// A stored user account.
///
/// # Invariants
/// - `id` never changes after creation.
/// - `email` doubles as the username and is unique under [`normalize_email`].
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub display_name: String,
    /// Opaque hash produced by the store's password hasher.
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn normalized_email(&self) -> String {
        normalize_email(&self.email)
    }
}

impl core::fmt::Debug for User {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("display_name", &self.display_name)
            .field("password_hash", &"<redacted>")
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Registration input handed to a store. The plaintext password is wiped
/// from memory on drop.
#[derive(Clone)]
pub struct NewUser {
    pub email: String,
    pub display_name: String,
    password: Zeroizing<String>,
}

impl NewUser {
    pub fn new(email: impl Into<String>, display_name: impl Into<String>, password: &str) -> Self {
        Self {
            email: email.into().trim().to_string(),
            display_name: display_name.into(),
            password: Zeroizing::new(password.to_owned()),
        }
    }

    pub fn password(&self) -> &str {
        self.password.as_str()
    }
}

impl core::fmt::Debug for NewUser {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NewUser")
            .field("email", &self.email)
            .field("display_name", &self.display_name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_normalization_ignores_case_and_padding() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn debug_output_hides_secrets() {
        let new_user = NewUser::new("a@x.com", "Alice", "Abc12345!");
        assert!(!format!("{new_user:?}").contains("Abc12345!"));

        let user = User {
            id: UserId::new(),
            email: "a@x.com".to_string(),
            display_name: "Alice".to_string(),
            password_hash: "$2b$04$secret".to_string(),
            created_at: Utc::now(),
        };
        assert!(!format!("{user:?}").contains("secret"));
    }
}
