//! HTTP application wiring (Axum router + service wiring).
//!
//! - `services.rs`: identity store selection and the shared account service
//! - `routes/`: HTTP routes + handlers
//! - `dto.rs`: request bodies that differ from the service requests
//! - `errors.rs`: consistent error and envelope responses

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

use services::SharedAccounts;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
///
/// Seeding the administrator is the caller's job; see
/// [`identra_auth::AccountService::set_up`].
pub fn build_app(accounts: SharedAccounts) -> Router {
    let session_state = middleware::SessionState {
        accounts: accounts.clone(),
    };

    // Protected routes: require a live session cookie.
    let protected = routes::protected_router()
        .layer(Extension(accounts.clone()))
        .layer(axum::middleware::from_fn_with_state(
            session_state,
            middleware::session_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::public_router().layer(Extension(accounts)))
        .merge(protected)
        .layer(ServiceBuilder::new().layer(axum::middleware::from_fn(middleware::trace_requests)))
}
