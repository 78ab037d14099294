//! `quirky-pipeline`: the captured request event pipeline.
//!
//! # Overview
//!
//! Producers [`enqueue`](EventQueue::enqueue) captured events into a bounded
//! [`EventQueue`]. A single [`Broadcaster`] task drains the queue and pushes
//! each sanitized event to every registered [`Viewer`]. A [`Sweeper`] bounds
//! memory and staleness with two periodic eviction rules.
//!
//! [`Pipeline`] owns the queue and the broadcaster and starts the background
//! tasks; share it as `Arc<Pipeline>`.

pub mod broadcast;
pub mod error;
pub mod queue;
pub mod sweeper;
pub mod viewer;

use std::sync::Arc;
use std::time::Duration;

use quirky_core::config::PipelineConfig;
use quirky_core::CapturedEvent;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub use broadcast::{Broadcaster, Delivery};
pub use error::{PipelineError, Result, ViewerPushError};
pub use queue::{EventQueue, StaleSweep};
pub use sweeper::Sweeper;
pub use viewer::{Viewer, ViewerId};

/// Process-wide context owning the event queue and the viewer registry.
pub struct Pipeline {
    queue: EventQueue,
    broadcaster: Broadcaster,
    sweeper: Sweeper,
}

impl Pipeline {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            queue: EventQueue::new(config.capacity),
            broadcaster: Broadcaster::with_push_timeout(Duration::from_millis(
                config.push_timeout_ms,
            )),
            sweeper: Sweeper::new(
                Duration::from_millis(config.overflow_poll_ms),
                Duration::from_millis(config.staleness_poll_ms),
            ),
        }
    }

    pub fn with_sweeper(capacity: usize, sweeper: Sweeper) -> Self {
        Self {
            queue: EventQueue::new(capacity),
            broadcaster: Broadcaster::new(),
            sweeper,
        }
    }

    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    /// Producer entry point.
    pub fn capture(&self, event: CapturedEvent) {
        self.queue.enqueue(event);
    }

    /// Spawn the broadcaster and both sweeper loops. They run until `cancel`
    /// fires; a task that ends with an error should be treated as fatal.
    pub fn start(self: &Arc<Self>, cancel: CancellationToken) -> JoinSet<Result<()>> {
        let mut tasks = JoinSet::new();

        let this = Arc::clone(self);
        let token = cancel.clone();
        tasks.spawn(async move {
            this.broadcaster.run(&this.queue, token).await;
            Ok(())
        });

        let this = Arc::clone(self);
        let token = cancel.clone();
        tasks.spawn(async move { this.sweeper.run_overflow(&this.queue, token).await });

        let this = Arc::clone(self);
        tasks.spawn(async move {
            this.sweeper.run_staleness(&this.queue, cancel).await;
            Ok(())
        });

        info!(
            capacity = self.queue.capacity(),
            overflow_ms = self.sweeper.overflow_every().as_millis() as u64,
            staleness_ms = self.sweeper.staleness_every().as_millis() as u64,
            "pipeline started"
        );
        tasks
    }
}

/// Wait for every pipeline task. The first failure cancels the rest (and
/// whatever else listens on `cancel`) and is returned once all have stopped.
pub async fn supervise(mut tasks: JoinSet<Result<()>>, cancel: CancellationToken) -> Result<()> {
    let mut outcome = Ok(());
    while let Some(joined) = tasks.join_next().await {
        let result = joined.unwrap_or_else(|e| Err(PipelineError::TaskFailed(e.to_string())));
        if let Err(e) = result {
            error!(error = %e, "pipeline task failed, shutting down");
            cancel.cancel();
            if outcome.is_ok() {
                outcome = Err(e);
            }
        }
    }
    outcome
}
