use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use identra_auth::{ServiceResponse, StoreError, messages};

pub fn store_error_to_response(err: StoreError) -> axum::response::Response {
    match err {
        StoreError::Rejected(descriptions) => json_error(
            StatusCode::BAD_REQUEST,
            "rejected",
            descriptions.join("\n"),
        ),
        StoreError::Unavailable(msg) => {
            tracing::error!("identity store unavailable: {msg}");
            json_error(StatusCode::SERVICE_UNAVAILABLE, "store_unavailable", msg)
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Status for a failed envelope, keyed on its message.
pub fn failure_status(resp: &ServiceResponse) -> StatusCode {
    match resp.message() {
        Some(messages::USER_ALREADY_EXISTS) => StatusCode::CONFLICT,
        Some(messages::USER_NOT_FOUND) => StatusCode::NOT_FOUND,
        _ => StatusCode::BAD_REQUEST,
    }
}

/// Render an envelope as JSON; `ok` is the status on success.
pub fn envelope(ok: StatusCode, resp: ServiceResponse) -> axum::response::Response {
    let status = if resp.success { ok } else { failure_status(&resp) };
    (status, axum::Json(resp)).into_response()
}
