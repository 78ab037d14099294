use axum::{
    extract::{
        ws::{Message, WebSocket},
        ConnectInfo, Request, State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::StreamExt;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info};

use crate::app::AppState;
use crate::ws::viewer::WsViewer;

/// Axum handler: upgrades HTTP to WebSocket at GET /stream.
pub async fn stream_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    req: Request,
) -> impl IntoResponse {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    info!(%peer, "stream requested");
    ws.on_upgrade(move |socket| run_viewer(socket, state, peer))
}

/// Viewer lifetime: registered on connect, unregistered when the peer goes
/// away. Anything the viewer sends is ignored.
async fn run_viewer(socket: WebSocket, state: Arc<AppState>, peer: String) {
    let (sink, mut stream) = socket.split();

    let broadcaster = state.pipeline.broadcaster();
    let id = broadcaster
        .register(Box::new(WsViewer::new(sink, peer.clone())))
        .await;
    info!(viewer = %id, %peer, "viewer connected");

    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(viewer = %id, error = %e, "viewer read error");
                break;
            }
        }
    }

    broadcaster.unregister(id).await;
    info!(viewer = %id, %peer, "viewer disconnected");
}
