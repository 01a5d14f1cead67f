// SPDX-License-Identifier: Apache-2.0

//! Bounded buffer between sample ingestion and the batch loop.
//!
//! Backpressure policy: an enqueue blocks its caller until space frees or a
//! hard deadline fires, and on expiry the event is dropped. The pipeline
//! favors freshness over completeness when the backend cannot keep up.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::metric::MetricEvent;

/// How long an enqueue may wait for queue space before dropping the event.
pub const ENQUEUE_DEADLINE: Duration = Duration::from_secs(10);

/// Producer side of the bounded event queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct EventQueue {
    tx: mpsc::Sender<MetricEvent>,
}

impl EventQueue {
    /// Creates a queue of the given capacity, returning the producer handle
    /// and the consumer end for the batch loop.
    pub fn bounded(capacity: usize) -> (EventQueue, mpsc::Receiver<MetricEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (EventQueue { tx }, rx)
    }

    /// Enqueues one event, waiting up to [`ENQUEUE_DEADLINE`] for space.
    ///
    /// Returns `false` when the event was dropped, either because the
    /// deadline elapsed or the consumer is gone.
    pub async fn enqueue(&self, event: MetricEvent) -> bool {
        match timeout(ENQUEUE_DEADLINE, self.tx.send(event)).await {
            Ok(Ok(())) => true,
            // consumer side closed; only happens during shutdown
            Ok(Err(_)) => false,
            Err(_elapsed) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(name: &str) -> MetricEvent {
        MetricEvent {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn enqueue_dequeue_in_order() {
        let (queue, mut rx) = EventQueue::bounded(4);
        assert!(queue.enqueue(event("a")).await);
        assert!(queue.enqueue(event("b")).await);
        assert_eq!(rx.recv().await.unwrap().name, "a");
        assert_eq!(rx.recv().await.unwrap().name, "b");
    }

    #[tokio::test(start_paused = true)]
    async fn saturated_queue_drops_after_deadline() {
        let (queue, _rx) = EventQueue::bounded(1);
        assert!(queue.enqueue(event("kept")).await);
        // consumer stalled, queue full: deadline elapses and the event drops
        assert!(!queue.enqueue(event("dropped")).await);
    }

    #[tokio::test]
    async fn enqueue_fails_when_consumer_gone() {
        let (queue, rx) = EventQueue::bounded(1);
        drop(rx);
        assert!(!queue.enqueue(event("a")).await);
    }
}
