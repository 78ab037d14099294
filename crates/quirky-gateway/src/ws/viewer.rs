use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures_util::{stream::SplitSink, SinkExt};
use quirky_pipeline::{Viewer, ViewerPushError};

pub type WsSink = SplitSink<WebSocket, Message>;

/// Push half of a viewer WebSocket. The broadcaster bounds each write with
/// its push timeout.
pub struct WsViewer {
    sink: WsSink,
    peer: String,
}

impl WsViewer {
    pub fn new(sink: WsSink, peer: String) -> Self {
        Self { sink, peer }
    }
}

#[async_trait]
impl Viewer for WsViewer {
    fn peer(&self) -> &str {
        &self.peer
    }

    async fn push(&mut self, line: &str) -> Result<(), ViewerPushError> {
        self.sink
            .send(Message::Text(line.into()))
            .await
            .map_err(|e| ViewerPushError::Transport(e.to_string()))
    }

    async fn close(&mut self) {
        let _ = self.sink.close().await;
    }
}
