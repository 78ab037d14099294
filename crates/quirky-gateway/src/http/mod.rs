pub mod admin;
pub mod health;
pub mod home;

use axum::http::StatusCode;

/// Fallback for every unrouted method/path. Such requests are still captured.
pub async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not Found")
}
