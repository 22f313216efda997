//! API-side authorization guard.
//!
//! Checks the caller's claims before a handler touches the account service.

use axum::http::StatusCode;
use axum::response::Response;

use identra_auth::{Permission, authorize};

use crate::app::errors;
use crate::context::SessionContext;

/// Require a permission flag on the current session, or produce a 403.
pub fn require(session: &SessionContext, permission: Permission) -> Result<(), Response> {
    authorize(session.principal(), permission).map_err(|e| {
        tracing::debug!(user_id = %session.principal().user_id, %permission, "request denied");
        errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string())
    })
}
