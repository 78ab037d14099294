use axum::{middleware, routing::get, Router};
use quirky_core::config::QuirkyConfig;
use quirky_pipeline::Pipeline;
use std::sync::Arc;

/// Central shared state, passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: QuirkyConfig,
    pub pipeline: Arc<Pipeline>,
}

impl AppState {
    pub fn new(config: QuirkyConfig) -> Self {
        let pipeline = Arc::new(Pipeline::new(&config.pipeline));
        Self { config, pipeline }
    }
}

/// Assemble the full Axum router. Every route, including the fallback, runs
/// behind the capture middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(crate::http::home::home_handler))
        .route("/stream", get(crate::ws::connection::stream_handler))
        .route("/health", get(crate::http::health::health_handler))
        .route("/admin", get(crate::http::admin::admin_handler))
        .route("/admin/{*rest}", get(crate::http::admin::admin_handler))
        .fallback(crate::http::not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            crate::capture::capture_requests,
        ))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body, Bytes};
    use axum::http::{header, Request, StatusCode};
    use quirky_pipeline::{Viewer, ViewerPushError};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    fn state() -> Arc<AppState> {
        let mut config = QuirkyConfig::default();
        config.pipeline.capacity = 16;
        config.capture.max_body_bytes = 64;
        Arc::new(AppState::new(config))
    }

    fn displayed(state: &AppState) -> Vec<String> {
        state
            .pipeline
            .queue()
            .snapshot()
            .iter()
            .map(|e| e.display())
            .collect()
    }

    async fn send(state: &Arc<AppState>, req: Request<Body>) -> (StatusCode, String) {
        let resp = build_router(state.clone()).oneshot(req).await.unwrap();
        let status = resp.status();
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8_lossy(&body).into_owned())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn unknown_path_is_404_and_captured() {
        let state = state();
        let (status, _) = send(&state, get("/x?a=1")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(displayed(&state), vec!["GET /x a=1 "]);
    }

    #[tokio::test]
    async fn ignored_paths_are_not_captured() {
        let state = state();
        send(&state, get("/favicon.ico")).await;
        send(&state, get("/robots.txt")).await;
        assert!(state.pipeline.queue().is_empty());
    }

    #[tokio::test]
    async fn post_body_is_captured_verbatim() {
        let state = state();
        let req = Request::post("/submit?x=1&y=2")
            .body(Body::from("<b>hi</b>"))
            .unwrap();
        send(&state, req).await;
        assert_eq!(displayed(&state), vec!["POST /submit x=1&y=2 <b>hi</b>"]);
    }

    #[tokio::test]
    async fn wrong_method_is_still_captured() {
        let state = state();
        let req = Request::delete("/").body(Body::empty()).unwrap();
        let (status, _) = send(&state, req).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(displayed(&state), vec!["DELETE /  "]);
    }

    #[tokio::test]
    async fn admin_always_rejects() {
        let state = state();
        let req = Request::get("/admin")
            .header(header::AUTHORIZATION, "Basic YWRtaW46YWRtaW4=")
            .body(Body::empty())
            .unwrap();
        let resp = build_router(state.clone()).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));

        let (status, _) = send(&state, get("/admin/users")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(state.pipeline.queue().len(), 2);
    }

    #[tokio::test]
    async fn oversized_body_is_rejected_and_not_captured() {
        let state = state();
        let req = Request::post("/upload")
            .header(header::CONTENT_LENGTH, "1000")
            .body(Body::from(vec![b'a'; 1000]))
            .unwrap();
        let (status, _) = send(&state, req).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert!(state.pipeline.queue().is_empty());
    }

    #[tokio::test]
    async fn chunked_body_over_limit_is_413_and_not_captured() {
        let state = state();
        let chunks = vec![Ok::<_, std::io::Error>(Bytes::from(vec![b'a'; 100]))];
        let req = Request::post("/upload")
            .body(Body::from_stream(futures_util::stream::iter(chunks)))
            .unwrap();
        assert!(req.headers().get(header::CONTENT_LENGTH).is_none());
        let (status, body) = send(&state, req).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert!(body.contains("exceeds 64 bytes"));
        assert!(state.pipeline.queue().is_empty());
    }

    #[tokio::test]
    async fn stream_endpoint_is_not_captured() {
        let state = state();
        // no upgrade headers, so the extractor rejects it; still not an event
        let (status, _) = send(&state, get("/stream")).await;
        assert!(status.is_client_error());
        assert!(state.pipeline.queue().is_empty());
    }

    #[tokio::test]
    async fn health_reports_queue() {
        let state = state();
        let (status, body) = send(&state, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["capacity"], 16);
        assert_eq!(json["viewers"], 0);
    }

    #[tokio::test]
    async fn home_page_points_at_stream() {
        let state = state();
        let (status, body) = send(&state, get("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("ws://localhost:8000/stream"));
    }

    #[derive(Clone, Default)]
    struct Inbox(Arc<Mutex<Vec<String>>>);

    struct TestViewer(Inbox);

    #[async_trait]
    impl Viewer for TestViewer {
        fn peer(&self) -> &str {
            "test"
        }
        async fn push(&mut self, line: &str) -> Result<(), ViewerPushError> {
            (self.0).0.lock().unwrap().push(line.to_string());
            Ok(())
        }
        async fn close(&mut self) {}
    }

    #[tokio::test]
    async fn request_is_streamed_to_viewer() {
        let state = state();
        let cancel = CancellationToken::new();
        let tasks = state.pipeline.start(cancel.clone());

        let inbox = Inbox::default();
        state
            .pipeline
            .broadcaster()
            .register(Box::new(TestViewer(inbox.clone())))
            .await;

        send(&state, get("/x?a=1")).await;

        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while inbox.0.lock().unwrap().is_empty() && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(*inbox.0.lock().unwrap(), vec!["GET /x a=1 ".to_string()]);

        cancel.cancel();
        quirky_pipeline::supervise(tasks, cancel).await.unwrap();
    }
}
