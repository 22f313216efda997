use axum::{
    Router,
    routing::{get, post, put},
};

pub mod account;
pub mod system;

/// Endpoints reachable without a session.
pub fn public_router() -> Router {
    Router::new()
        .route("/account/login", post(account::login))
        .route("/account/logout", post(account::logout))
}

/// Endpoints that require a live session.
pub fn protected_router() -> Router {
    Router::new()
        .route("/account/me", get(account::me))
        .route(
            "/account/users",
            get(account::list_users).post(account::create_user),
        )
        .route("/account/users/:id/claims", put(account::update_user_claims))
}
