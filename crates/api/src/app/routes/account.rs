//! Account endpoints: login/logout, the caller's identity and user
//! administration (`manage_user`).

use axum::{
    Json,
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Redirect, Response},
};

use identra_auth::{CreateUserRequest, LoginUserRequest, Permission, ServiceResponse, messages};
use identra_core::UserId;

use crate::app::{dto::UpdateClaimsBody, errors, services::SharedAccounts};
use crate::authz;
use crate::context::SessionContext;
use crate::middleware::{expired_session_cookie, session_cookie, session_token};

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

/// POST /account/login - Verify credentials and set the session cookie
pub async fn login(
    Extension(accounts): Extension<SharedAccounts>,
    Json(body): Json<LoginUserRequest>,
) -> Response {
    match accounts.sign_in(&body).await {
        Ok(session) => (
            StatusCode::OK,
            [(header::SET_COOKIE, session_cookie(session.token))],
            Json(ServiceResponse::ok()),
        )
            .into_response(),
        Err(resp) => (StatusCode::UNAUTHORIZED, Json(resp)).into_response(),
    }
}

/// POST /account/logout - End the session (if any) and redirect to login
pub async fn logout(
    Extension(accounts): Extension<SharedAccounts>,
    headers: HeaderMap,
) -> Response {
    if let Some(token) = session_token(&headers) {
        let resp = accounts.logout(&token).await;
        if !resp.success {
            tracing::warn!(message = ?resp.message, "sign-out failed");
        }
    }

    (
        [(header::SET_COOKIE, expired_session_cookie())],
        Redirect::to("/account/login"),
    )
        .into_response()
}

/// GET /account/me - The caller's claims
pub async fn me(Extension(session): Extension<SessionContext>) -> Response {
    (StatusCode::OK, Json(session.principal().clone())).into_response()
}

// ─────────────────────────────────────────────────────────────────────────────
// User administration
// ─────────────────────────────────────────────────────────────────────────────

/// POST /account/users - Register a user under a named policy
pub async fn create_user(
    Extension(accounts): Extension<SharedAccounts>,
    Extension(session): Extension<SessionContext>,
    Json(body): Json<CreateUserRequest>,
) -> Response {
    if let Err(denied) = authz::require(&session, Permission::ManageUser) {
        return denied;
    }

    errors::envelope(StatusCode::CREATED, accounts.create_user(&body).await)
}

/// GET /account/users - Every claim-bearing user
pub async fn list_users(
    Extension(accounts): Extension<SharedAccounts>,
    Extension(session): Extension<SessionContext>,
) -> Response {
    if let Err(denied) = authz::require(&session, Permission::ManageUser) {
        return denied;
    }

    match accounts.get_users_with_claims().await {
        Ok(users) => (StatusCode::OK, Json(serde_json::json!({ "users": users }))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// PUT /account/users/:id/claims - Replace a user's role, name and flags
pub async fn update_user_claims(
    Extension(accounts): Extension<SharedAccounts>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
    Json(body): Json<UpdateClaimsBody>,
) -> Response {
    if let Err(denied) = authz::require(&session, Permission::ManageUser) {
        return denied;
    }

    // An id that does not parse cannot name a stored user.
    let Ok(user_id) = id.parse::<UserId>() else {
        return errors::envelope(StatusCode::OK, ServiceResponse::fail(messages::USER_NOT_FOUND));
    };

    let request = body.into_request(user_id);
    errors::envelope(StatusCode::OK, accounts.update_user_claims(&request).await)
}
