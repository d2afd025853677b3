//! In-process publish/subscribe bus (§4.7).
//!
//! Each subscriber owns a bounded `tokio::mpsc` channel (default capacity
//! from `claude_slack_core::Config::event_queue_depth`). A full queue never
//! blocks the publisher: the bus drops the event and records a gap, which
//! is delivered as a `Delivery::Gap` marker the next time the subscriber's
//! queue has room. A monotonic per-subscriber sequence number lets a
//! consumer detect exactly where gaps occurred.
//!
//! Grounded on the teacher's bounded-queue/no-block-the-producer idiom
//! (`mcp-agent-mail-core::backpressure`'s "never await while holding
//! the lock" discipline) and `ConaryLabs-Mira`'s channel-fed SSE stream
//! (`mira-server::web::chat::stream`).

use crate::event::Event;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

/// What a subscriber receives from `Subscription::recv`: either a real
/// event with its assigned sequence number, or a gap marker noting how
/// many events were dropped before `resumed_at`.
#[derive(Debug, Clone)]
pub enum Delivery {
    Event { seq: u64, event: Event },
    Gap { lost: u64, resumed_at: u64 },
}

struct SubscriberState {
    sender: mpsc::Sender<Delivery>,
    next_seq: u64,
    /// Events dropped since the last successfully queued delivery. Folded
    /// into a single `Gap` marker on the next successful send.
    pending_gap: u64,
}

/// A handle returned to a caller that subscribed to the bus. Dropping it
/// unsubscribes (the bus notices on the next publish and prunes it).
pub struct Subscription {
    pub id: String,
    receiver: mpsc::Receiver<Delivery>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<Delivery> {
        self.receiver.recv().await
    }
}

/// The bus itself. Cheaply cloneable; all clones share the same
/// subscriber table.
#[derive(Clone)]
pub struct EventBus {
    subscribers: Arc<RwLock<HashMap<String, SubscriberState>>>,
    queue_depth: usize,
}

impl EventBus {
    #[must_use]
    pub fn new(queue_depth: usize) -> Self {
        Self { subscribers: Arc::new(RwLock::new(HashMap::new())), queue_depth: queue_depth.max(1) }
    }

    #[must_use]
    pub fn from_config(config: &claude_slack_core::Config) -> Self {
        Self::new(config.event_queue_depth)
    }

    /// Register a new subscriber and return its receiving half. `id` should
    /// be unique per logical session; a second `subscribe` with the same id
    /// replaces the first (the old receiver is dropped, ending its stream).
    pub async fn subscribe(&self, id: impl Into<String>) -> Subscription {
        let id = id.into();
        let (tx, rx) = mpsc::channel(self.queue_depth);
        let state = SubscriberState { sender: tx, next_seq: 0, pending_gap: 0 };
        self.subscribers.write().await.insert(id.clone(), state);
        Subscription { id, receiver: rx }
    }

    pub async fn unsubscribe(&self, id: &str) {
        self.subscribers.write().await.remove(id);
    }

    #[must_use]
    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// Deliver `event` to exactly the subscriber ids in `to`. Unknown ids
    /// (already unsubscribed) are silently skipped — the publisher doesn't
    /// need to know about subscriber churn.
    pub async fn publish(&self, to: &[String], event: Event) {
        let mut subscribers = self.subscribers.write().await;
        for id in to {
            let Some(state) = subscribers.get_mut(id) else { continue };
            if state.pending_gap > 0 {
                let gap = Delivery::Gap { lost: state.pending_gap, resumed_at: state.next_seq };
                if state.sender.try_send(gap).is_ok() {
                    state.pending_gap = 0;
                } else {
                    // Still backed up; fold this event into the same gap
                    // and move on without touching next_seq.
                    state.pending_gap += 1;
                    continue;
                }
            }

            let seq = state.next_seq;
            let delivery = Delivery::Event { seq, event: event.clone() };
            match state.sender.try_send(delivery) {
                Ok(()) => state.next_seq += 1,
                Err(_) => {
                    state.pending_gap += 1;
                    tracing::debug!(subscriber = %id, "event dropped, queue full");
                }
            }
        }
    }

    /// Publish to every current subscriber (used for agent-lifecycle
    /// events where the façade doesn't pre-compute a recipient list; real
    /// discovery-permission filtering is the consumer's job per §4.7).
    pub async fn publish_all(&self, event: Event) {
        let ids: Vec<String> = self.subscribers.read().await.keys().cloned().collect();
        self.publish(&ids, event).await;
    }

    /// The next sequence number that would be assigned to `id`, used by a
    /// reconnecting subscriber to validate it isn't missing a snapshot.
    pub async fn next_seq_for(&self, id: &str) -> Option<u64> {
        self.subscribers.read().await.get(id).map(|s| s.next_seq)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use serde_json::json;

    fn ev(n: i64) -> Event {
        Event::new(EventKind::MessageCreated, 0.0, json!({ "n": n }))
    }

    #[tokio::test]
    async fn delivers_in_order_with_monotonic_seq() {
        let bus = EventBus::new(8);
        let mut sub = bus.subscribe("a").await;
        for n in 0..3 {
            bus.publish(&["a".to_string()], ev(n)).await;
        }
        for expected_seq in 0..3 {
            match sub.recv().await.unwrap() {
                Delivery::Event { seq, .. } => assert_eq!(seq, expected_seq),
                Delivery::Gap { .. } => panic!("unexpected gap"),
            }
        }
    }

    #[tokio::test]
    async fn full_queue_drops_and_records_gap_never_blocking_publisher() {
        let bus = EventBus::new(1);
        let mut sub = bus.subscribe("a").await;
        // First fills the one-slot queue; the rest are dropped with a gap.
        for n in 0..5 {
            bus.publish(&["a".to_string()], ev(n)).await;
        }
        let first = sub.recv().await.unwrap();
        assert!(matches!(first, Delivery::Event { seq: 0, .. }));

        // Draining frees a slot; the next publish should fold the pending
        // gap in before resuming events.
        bus.publish(&["a".to_string()], ev(99)).await;
        match sub.recv().await.unwrap() {
            Delivery::Gap { lost, .. } => assert!(lost >= 1),
            other => panic!("expected gap marker, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_subscriber_id_is_skipped_silently() {
        let bus = EventBus::new(8);
        bus.publish(&["ghost".to_string()], ev(0)).await;
    }

    #[tokio::test]
    async fn unsubscribe_ends_the_stream() {
        let bus = EventBus::new(8);
        let mut sub = bus.subscribe("a").await;
        bus.unsubscribe("a").await;
        bus.publish(&["a".to_string()], ev(0)).await;
        assert!(sub.recv().await.is_none());
    }
}
