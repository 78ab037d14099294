use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

/// GET /health: liveness check, returns pipeline metadata.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let pipeline = &state.pipeline;
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "viewers": pipeline.broadcaster().viewer_count().await,
        "queued": pipeline.queue().len(),
        "capacity": pipeline.queue().capacity(),
        "ts": chrono::Utc::now().timestamp_millis(),
    }))
}
