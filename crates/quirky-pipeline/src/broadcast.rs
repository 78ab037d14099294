use std::collections::HashMap;
use std::time::Duration;

use quirky_core::config::PUSH_TIMEOUT_MS;
use quirky_core::{sanitize, CapturedEvent};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ViewerPushError;
use crate::queue::EventQueue;
use crate::viewer::{Viewer, ViewerId};

/// Result of one fan-out pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    /// Viewers removed because their push failed (timeouts included).
    pub dropped: usize,
    /// Of `dropped`, viewers that did not accept the line within the push timeout.
    pub timed_out: usize,
    /// True when the event could not be sanitized and nothing was sent.
    pub skipped: bool,
}

/// Fan-out of dequeued events to every registered viewer.
///
/// The registry lock is held for a whole pass, so viewers registered or
/// unregistered concurrently land strictly before or after it. Every push
/// and close is bounded by `push_timeout`; a viewer that stalls is dropped
/// instead of holding up the others.
pub struct Broadcaster {
    viewers: Mutex<HashMap<ViewerId, Box<dyn Viewer>>>,
    push_timeout: Duration,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::with_push_timeout(Duration::from_millis(PUSH_TIMEOUT_MS))
    }

    pub fn with_push_timeout(push_timeout: Duration) -> Self {
        Self {
            viewers: Mutex::new(HashMap::new()),
            push_timeout,
        }
    }

    /// Add a viewer. It receives only events broadcast after this returns.
    pub async fn register(&self, viewer: Box<dyn Viewer>) -> ViewerId {
        let id = ViewerId::new();
        let peer = viewer.peer().to_string();
        let total = {
            let mut viewers = self.viewers.lock().await;
            viewers.insert(id, viewer);
            viewers.len()
        };
        debug!(viewer = %id, %peer, total, "viewer registered");
        id
    }

    /// Remove and close a viewer. Returns `false` if it was already gone.
    pub async fn unregister(&self, id: ViewerId) -> bool {
        let removed = self.viewers.lock().await.remove(&id);
        match removed {
            Some(mut viewer) => {
                self.close_viewer(viewer.as_mut()).await;
                debug!(viewer = %id, peer = %viewer.peer(), "viewer unregistered");
                true
            }
            None => false,
        }
    }

    pub async fn viewer_count(&self) -> usize {
        self.viewers.lock().await.len()
    }

    /// Sanitize `event` once and push it to every viewer. Viewers whose push
    /// fails or times out are closed and removed; the rest still get the line.
    pub async fn broadcast(&self, event: &CapturedEvent) -> Delivery {
        let line = match sanitize(&event.display()) {
            Ok(line) => line,
            Err(e) => {
                warn!(method = %event.method, path = %event.path, error = %e, "skipping unsafe event");
                return Delivery {
                    skipped: true,
                    ..Delivery::default()
                };
            }
        };

        let mut viewers = self.viewers.lock().await;
        let mut failed = Vec::new();
        let mut delivery = Delivery::default();

        for (id, viewer) in viewers.iter_mut() {
            match self.push_to(viewer.as_mut(), &line).await {
                Ok(()) => delivery.delivered += 1,
                Err(e) => {
                    warn!(viewer = %id, peer = %viewer.peer(), error = %e, "push failed, dropping viewer");
                    if matches!(e, ViewerPushError::Timeout { .. }) {
                        delivery.timed_out += 1;
                    }
                    failed.push(*id);
                }
            }
        }

        for id in &failed {
            if let Some(mut viewer) = viewers.remove(id) {
                self.close_viewer(viewer.as_mut()).await;
            }
        }

        delivery.dropped = failed.len();
        delivery
    }

    async fn push_to(&self, viewer: &mut dyn Viewer, line: &str) -> Result<(), ViewerPushError> {
        match tokio::time::timeout(self.push_timeout, viewer.push(line)).await {
            Ok(result) => result,
            Err(_) => Err(ViewerPushError::Timeout {
                ms: self.push_timeout.as_millis() as u64,
            }),
        }
    }

    async fn close_viewer(&self, viewer: &mut dyn Viewer) {
        if tokio::time::timeout(self.push_timeout, viewer.close())
            .await
            .is_err()
        {
            debug!(peer = %viewer.peer(), "viewer close timed out");
        }
    }

    /// Drain `queue` until `cancel` fires, broadcasting each event in order.
    /// All remaining viewers are closed on the way out.
    pub async fn run(&self, queue: &EventQueue, cancel: CancellationToken) {
        info!("broadcaster started");
        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                event = queue.dequeue() => event,
            };
            let delivery = self.broadcast(&event).await;
            debug!(
                path = %event.path,
                delivered = delivery.delivered,
                dropped = delivery.dropped,
                "event broadcast"
            );
        }
        self.close_all().await;
        info!("broadcaster stopped");
    }

    async fn close_all(&self) {
        let mut viewers = self.viewers.lock().await;
        for (_, mut viewer) in viewers.drain() {
            self.close_viewer(viewer.as_mut()).await;
        }
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}
