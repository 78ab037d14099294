//! Bounded FIFO of captured events.
//!
//! Producers never wait: a full queue drops its oldest entry to make room.
//! The single consumer parks on a [`Notify`] until something arrives. Every
//! mutation (enqueue, dequeue, overflow eviction, stale drain) happens under
//! one mutex, so length and contents always agree.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use quirky_core::CapturedEvent;
use tokio::sync::Notify;
use tracing::debug;

use crate::error::{PipelineError, Result};

/// Outcome of one staleness poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaleSweep {
    /// Events discarded by this poll.
    pub drained: usize,
    /// Queue length after the poll; the next poll compares against this.
    pub observed: usize,
}

pub struct EventQueue {
    events: Mutex<VecDeque<CapturedEvent>>,
    capacity: usize,
    available: Notify,
}

impl EventQueue {
    /// `capacity` is clamped to at least one slot.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
            available: Notify::new(),
        }
    }

    // A panic while holding the lock cannot leave the deque half-updated,
    // so a poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, VecDeque<CapturedEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append at the tail, evicting the head first when full.
    /// Returns `true` when an older event was dropped to make room.
    pub fn enqueue(&self, event: CapturedEvent) -> bool {
        let evicted = {
            let mut events = self.lock();
            let evicted = if events.len() >= self.capacity {
                events.pop_front().is_some()
            } else {
                false
            };
            events.push_back(event);
            evicted
        };
        if evicted {
            debug!(capacity = self.capacity, "queue full, dropped oldest event");
        }
        self.available.notify_one();
        evicted
    }

    /// Wait until an event is available, then remove and return the oldest.
    pub async fn dequeue(&self) -> CapturedEvent {
        loop {
            // Register interest before checking so a concurrent enqueue
            // between the check and the await still wakes us.
            let notified = self.available.notified();
            if let Some(event) = self.try_dequeue() {
                return event;
            }
            notified.await;
        }
    }

    /// Remove the oldest event without waiting.
    pub fn try_dequeue(&self) -> Option<CapturedEvent> {
        self.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Overflow rule: drop exactly one oldest event when the queue is full.
    pub fn evict_if_full(&self) -> bool {
        let mut events = self.lock();
        if events.len() == self.capacity {
            events.pop_front();
            true
        } else {
            false
        }
    }

    /// Staleness rule: when the length has not moved since `previous`, is
    /// non-zero, and is below capacity, discard everything.
    pub fn sweep_stale(&self, previous: usize) -> StaleSweep {
        let mut events = self.lock();
        let len = events.len();
        let drained = if len == previous && len > 0 && len != self.capacity {
            events.clear();
            len
        } else {
            0
        };
        StaleSweep {
            drained,
            observed: events.len(),
        }
    }

    pub fn check_invariants(&self) -> Result<()> {
        let len = self.len();
        if len > self.capacity {
            return Err(PipelineError::QueueInvariantViolation {
                len,
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    /// Copy of the current contents, oldest first.
    pub fn snapshot(&self) -> Vec<CapturedEvent> {
        self.lock().iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn ev(n: usize) -> CapturedEvent {
        CapturedEvent::new("GET", format!("/e{n}"), "", "")
    }

    fn paths(q: &EventQueue) -> Vec<String> {
        q.snapshot().into_iter().map(|e| e.path).collect()
    }

    #[test]
    fn length_never_exceeds_capacity() {
        let q = EventQueue::new(3);
        for n in 0..10 {
            q.enqueue(ev(n));
            assert!(q.len() <= q.capacity());
            q.check_invariants().unwrap();
        }
        assert_eq!(q.len(), 3);
    }

    #[test]
    fn full_queue_drops_oldest_keeps_newest() {
        let q = EventQueue::new(3);
        assert!(!q.enqueue(ev(1)));
        assert!(!q.enqueue(ev(2)));
        assert!(!q.enqueue(ev(3)));
        assert!(q.enqueue(ev(4)));
        assert_eq!(paths(&q), vec!["/e2", "/e3", "/e4"]);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let q = EventQueue::new(0);
        assert_eq!(q.capacity(), 1);
        q.enqueue(ev(1));
        q.enqueue(ev(2));
        assert_eq!(paths(&q), vec!["/e2"]);
    }

    #[test]
    fn evict_if_full_only_acts_at_capacity() {
        let q = EventQueue::new(2);
        q.enqueue(ev(1));
        assert!(!q.evict_if_full());
        assert_eq!(q.len(), 1);

        q.enqueue(ev(2));
        assert!(q.evict_if_full());
        assert_eq!(paths(&q), vec!["/e2"]);
    }

    #[test]
    fn stale_sweep_drains_unchanged_partial_queue() {
        let q = EventQueue::new(10);
        q.enqueue(ev(1));
        q.enqueue(ev(2));

        let first = q.sweep_stale(0);
        assert_eq!(first, StaleSweep { drained: 0, observed: 2 });

        let second = q.sweep_stale(first.observed);
        assert_eq!(second, StaleSweep { drained: 2, observed: 0 });
        assert!(q.is_empty());
    }

    #[test]
    fn stale_sweep_ignores_empty_and_full_queues() {
        let empty = EventQueue::new(4);
        assert_eq!(empty.sweep_stale(0).drained, 0);

        let full = EventQueue::new(2);
        full.enqueue(ev(1));
        full.enqueue(ev(2));
        assert_eq!(full.sweep_stale(2).drained, 0);
        assert_eq!(full.len(), 2);
    }

    #[test]
    fn stale_sweep_spares_a_moving_queue() {
        let q = EventQueue::new(10);
        q.enqueue(ev(1));
        let first = q.sweep_stale(0);
        q.enqueue(ev(2));
        let second = q.sweep_stale(first.observed);
        assert_eq!(second.drained, 0);
        assert_eq!(second.observed, 2);
    }

    #[test]
    fn survivors_come_out_in_enqueue_order() {
        let q = EventQueue::new(4);
        for n in 1..=6 {
            q.enqueue(ev(n));
        }
        q.evict_if_full();
        let out: Vec<_> = std::iter::from_fn(|| q.try_dequeue()).map(|e| e.path).collect();
        assert_eq!(out, vec!["/e4", "/e5", "/e6"]);
    }

    #[tokio::test]
    async fn dequeue_waits_for_enqueue() {
        let q = Arc::new(EventQueue::new(8));
        let consumer = {
            let q = Arc::clone(&q);
            tokio::spawn(async move { q.dequeue().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!consumer.is_finished());

        q.enqueue(ev(7));
        let got = tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .expect("consumer woke up")
            .expect("task joined");
        assert_eq!(got.path, "/e7");
    }

    #[tokio::test]
    async fn concurrent_producers_lose_nothing_below_capacity() {
        let q = Arc::new(EventQueue::new(1_000));
        let mut producers = Vec::new();
        for p in 0..8 {
            let q = Arc::clone(&q);
            producers.push(tokio::spawn(async move {
                for n in 0..50 {
                    q.enqueue(ev(p * 100 + n));
                }
            }));
        }
        for handle in producers {
            handle.await.unwrap();
        }
        assert_eq!(q.len(), 400);
        q.check_invariants().unwrap();
    }
}
