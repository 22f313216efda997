use identra_auth::{Principal, SessionToken};

/// Session context for a request (live session + the principal behind it).
///
/// Inserted by the session middleware; present on every protected route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    token: SessionToken,
    principal: Principal,
}

impl SessionContext {
    pub fn new(token: SessionToken, principal: Principal) -> Self {
        Self { token, principal }
    }

    pub fn token(&self) -> SessionToken {
        self.token
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }
}
