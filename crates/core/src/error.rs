//! Domain error model.

use thiserror::Error;

/// Domain-level error.
///
/// Deterministic failures of pure identity values. Store and transport
/// concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_id_names_the_cause() {
        let err = DomainError::invalid_id("UserId: bad length");
        assert_eq!(err.to_string(), "invalid identifier: UserId: bad length");
    }
}
