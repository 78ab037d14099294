//! Background eviction for the event queue.
//!
//! Two independent periodic loops:
//! - overflow: when the queue is exactly full, drop its oldest event so new
//!   captures always have room;
//! - staleness: when the length has not changed since the previous poll (and
//!   is neither zero nor at capacity), nobody is draining the queue, so drop
//!   everything rather than let it go stale.

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::Result;
use crate::queue::EventQueue;

#[derive(Debug, Clone, Copy)]
pub struct Sweeper {
    overflow_every: Duration,
    staleness_every: Duration,
}

impl Sweeper {
    pub fn new(overflow_every: Duration, staleness_every: Duration) -> Self {
        Self {
            overflow_every,
            staleness_every,
        }
    }

    pub fn overflow_every(&self) -> Duration {
        self.overflow_every
    }

    pub fn staleness_every(&self) -> Duration {
        self.staleness_every
    }

    /// Overflow loop. Also checks the queue invariants on every tick and
    /// returns the violation, which callers treat as fatal.
    pub async fn run_overflow(&self, queue: &EventQueue, cancel: CancellationToken) -> Result<()> {
        info!(every_ms = self.overflow_every.as_millis() as u64, "overflow sweeper started");
        let mut interval = tokio::time::interval(self.overflow_every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    if let Err(e) = queue.check_invariants() {
                        error!(error = %e, "overflow sweeper stopping");
                        return Err(e);
                    }
                    if queue.evict_if_full() {
                        debug!(capacity = queue.capacity(), "queue full, dropped oldest event");
                    }
                }
            }
        }

        info!("overflow sweeper stopped");
        Ok(())
    }

    /// Staleness loop.
    pub async fn run_staleness(&self, queue: &EventQueue, cancel: CancellationToken) {
        info!(every_ms = self.staleness_every.as_millis() as u64, "staleness sweeper started");
        let mut interval = tokio::time::interval(self.staleness_every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_len = 0;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    let sweep = queue.sweep_stale(last_len);
                    if sweep.drained > 0 {
                        debug!(drained = sweep.drained, "queue not drained since last poll, dropped all events");
                    }
                    last_len = sweep.observed;
                }
            }
        }

        info!("staleness sweeper stopped");
    }
}
