use std::time::Instant;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode, header},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;

use identra_auth::SessionToken;

use crate::app::services::SharedAccounts;
use crate::context::SessionContext;

/// Cookie carrying the session token.
pub const SESSION_COOKIE: &str = "identra_session";

#[derive(Clone)]
pub struct SessionState {
    pub accounts: SharedAccounts,
}

pub async fn session_middleware(
    State(state): State<SessionState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = session_token(req.headers()).ok_or(StatusCode::UNAUTHORIZED)?;

    let principal = state
        .accounts
        .principal(&token)
        .await
        .map_err(|e| {
            tracing::error!("session lookup failed: {e}");
            StatusCode::SERVICE_UNAVAILABLE
        })?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    req.extensions_mut()
        .insert(SessionContext::new(token, principal));

    Ok(next.run(req).await)
}

/// One span and one completion event per request.
pub async fn trace_requests(req: axum::http::Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();

    let span = tracing::info_span!("http_request", %method, %path);
    let response = next.run(req).instrument(span).await;

    tracing::info!(
        %method,
        %path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request handled"
    );
    response
}

/// The session token from the `Cookie` header(s), if present and well formed.
pub fn session_token(headers: &HeaderMap) -> Option<SessionToken> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| value.parse().ok())
}

/// `Set-Cookie` value that stores the token.
pub fn session_cookie(token: SessionToken) -> String {
    format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax")
}

/// `Set-Cookie` value that clears the session cookie.
pub fn expired_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn finds_the_session_among_other_cookies() {
        let token = SessionToken::new();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("theme=dark; {SESSION_COOKIE}={token}; lang=en")).unwrap(),
        );
        assert_eq!(session_token(&headers), Some(token));
    }

    #[test]
    fn missing_or_malformed_cookie_yields_nothing() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_token(&headers), None);

        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("identra_session=not-a-token"),
        );
        assert_eq!(session_token(&headers), None);
    }

    #[test]
    fn issued_cookie_round_trips_through_the_parser() {
        let token = SessionToken::new();
        let cookie = session_cookie(token);
        let mut headers = HeaderMap::new();
        let pair = cookie.split(';').next().unwrap();
        headers.insert(header::COOKIE, HeaderValue::from_str(pair).unwrap());
        assert_eq!(session_token(&headers), Some(token));
    }
}
