//! Password strength rules applied by identity stores on account creation.

use serde::{Deserialize, Serialize};

/// Password requirements.
///
/// Every violated rule yields its own description, so a caller sees all
/// problems with a password at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub require_digit: bool,
    pub require_lowercase: bool,
    pub require_uppercase: bool,
    pub require_non_alphanumeric: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 6,
            require_digit: true,
            require_lowercase: true,
            require_uppercase: true,
            require_non_alphanumeric: true,
        }
    }
}

impl PasswordPolicy {
    /// Descriptions of every rule the password violates (empty when it passes).
    pub fn validate(&self, password: &str) -> Vec<String> {
        let mut errors = Vec::new();

        if password.chars().count() < self.min_length {
            errors.push(format!(
                "Passwords must be at least {} characters.",
                self.min_length
            ));
        }
        if self.require_non_alphanumeric && password.chars().all(|c| c.is_ascii_alphanumeric()) {
            errors.push("Passwords must have at least one non alphanumeric character.".to_string());
        }
        if self.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            errors.push("Passwords must have at least one digit ('0'-'9').".to_string());
        }
        if self.require_lowercase && !password.chars().any(|c| c.is_ascii_lowercase()) {
            errors.push("Passwords must have at least one lowercase ('a'-'z').".to_string());
        }
        if self.require_uppercase && !password.chars().any(|c| c.is_ascii_uppercase()) {
            errors.push("Passwords must have at least one uppercase ('A'-'Z').".to_string());
        }

        errors
    }
}
