use axum::{
    http::{header::WWW_AUTHENTICATE, HeaderMap, StatusCode},
    response::IntoResponse,
};
use tracing::debug;

/// GET /admin: basic-auth bait. No credentials are ever accepted; the
/// request (and any `Authorization` header sent) is only captured.
pub async fn admin_handler(headers: HeaderMap) -> impl IntoResponse {
    debug!(
        has_credentials = headers.contains_key(axum::http::header::AUTHORIZATION),
        "admin login attempt"
    );
    (
        StatusCode::UNAUTHORIZED,
        [(WWW_AUTHENTICATE, r#"Basic realm="Restricted""#)],
        "Unauthorized",
    )
}
