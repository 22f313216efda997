use serde::{Deserialize, Serialize};

/// User-facing messages carried by [`ServiceResponse`].
pub mod messages {
    pub const USER_ALREADY_EXISTS: &str = "User Already Exists";
    pub const USER_CREATED: &str = "User Created";
    pub const USER_NOT_FOUND: &str = "User Not Found";
    pub const INCORRECT_CREDENTIALS: &str = "Incorrect Credentials Provided";
    pub const UNKNOWN_SIGN_IN_ERROR: &str = "Unknown Error Occurred While Logging You In";
    pub const USER_UPDATED: &str = "User Updated";
}

/// Result envelope of every mutating account operation.
///
/// `message` is `None` on an unqualified success and a human-readable cause
/// otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceResponse {
    pub success: bool,
    pub message: Option<String>,
}

impl ServiceResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    pub fn ok_with(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }

    /// Failure carrying several descriptions joined by newlines.
    pub fn from_errors<I, T>(errors: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let joined = errors
            .into_iter()
            .map(|e| e.as_ref().to_string())
            .collect::<Vec<_>>()
            .join("\n");
        Self::fail(joined)
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}
