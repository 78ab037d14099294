//! Request capture middleware, the producer side of the pipeline.
//!
//! The body is buffered up front so it can be both handed to the wrapped
//! handler and recorded. The event is enqueued after the handler returns,
//! whatever status it produced.

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{header::CONTENT_LENGTH, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use quirky_core::CapturedEvent;
use serde_json::json;
use http_body_util::LengthLimitError;
use std::error::Error as _;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::app::AppState;

/// The inbound body could not be read; nothing is captured.
#[derive(Debug, Error)]
pub enum CaptureReadError {
    #[error("request body exceeds {max} bytes")]
    TooLarge { max: usize },

    #[error("could not read request body: {0}")]
    Body(String),
}

impl CaptureReadError {
    fn status(&self) -> StatusCode {
        match self {
            CaptureReadError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            CaptureReadError::Body(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for CaptureReadError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub async fn capture_requests(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, CaptureReadError> {
    let capture = &state.config.capture;
    if capture.is_ignored(req.uri().path()) {
        return Ok(next.run(req).await);
    }

    let max = capture.max_body_bytes;
    let declared = req
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if let Some(size) = declared.filter(|size| *size > max as u64) {
        warn!(path = %req.uri().path(), size, max, "request body over capture limit");
        return Err(CaptureReadError::TooLarge { max });
    }

    // chunked bodies carry no length, so the limit may only trip while reading
    let (parts, body) = req.into_parts();
    let bytes = to_bytes(body, max).await.map_err(|e| {
        if is_length_limit(&e) {
            warn!(path = %parts.uri.path(), max, "streamed body over capture limit");
            CaptureReadError::TooLarge { max }
        } else {
            warn!(path = %parts.uri.path(), error = %e, "failed to read request body");
            CaptureReadError::Body(e.to_string())
        }
    })?;

    let method = parts.method.to_string();
    let path = parts.uri.path().to_string();
    let query = parts.uri.query().unwrap_or_default().to_string();

    let response = next
        .run(Request::from_parts(parts, Body::from(bytes.clone())))
        .await;

    let event = CapturedEvent::new(method, path, query, String::from_utf8_lossy(&bytes));
    debug!(
        method = %event.method,
        path = %event.path,
        status = response.status().as_u16(),
        body_bytes = bytes.len(),
        "request captured"
    );
    state.pipeline.capture(event);

    Ok(response)
}

fn is_length_limit(err: &axum::Error) -> bool {
    let mut source = err.source();
    while let Some(e) = source {
        if e.is::<LengthLimitError>() {
            return true;
        }
        source = e.source();
    }
    false
}
