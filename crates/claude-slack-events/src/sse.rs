//! SSE frame/envelope conversion (§4.7, §6): turns a `Subscription`'s
//! `Delivery` stream into `axum` `Sse` events.
//!
//! Grounded on `ConaryLabs-Mira`'s `mira-server::web::chat::stream` —
//! channel-fed `async_stream::stream!` wrapped in
//! `Sse::new(..).keep_alive(..)`.

use crate::bus::{Delivery, Subscription};
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use futures::stream::Stream;
use serde::Serialize;
use std::convert::Infallible;
use std::time::Duration;

/// Wire shape of one SSE frame's JSON payload.
#[derive(Debug, Serialize)]
#[serde(tag = "frame_type", rename_all = "snake_case")]
enum Frame<'a> {
    Event { seq: u64, kind: &'a str, timestamp: f64, payload: &'a serde_json::Value },
    Gap { lost: u64, resumed_at: u64 },
}

/// Wrap a subscription as an SSE byte stream suitable for an `axum`
/// handler's response body. The subscriber id is not carried in the
/// stream itself — it's implicit in which `Subscription` was handed in.
/// Cancelling the SSE connection (client disconnect) simply drops the
/// stream and, with it, the `Subscription`, unsubscribing from the bus —
/// other subscribers are unaffected (§5).
pub fn into_sse_stream(
    mut subscription: Subscription,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let stream = async_stream::stream! {
        while let Some(delivery) = subscription.recv().await {
            let frame = match &delivery {
                Delivery::Event { seq, event } => Frame::Event {
                    seq: *seq,
                    kind: event.kind.as_str(),
                    timestamp: event.timestamp,
                    payload: &event.payload,
                },
                Delivery::Gap { lost, resumed_at } => {
                    Frame::Gap { lost: *lost, resumed_at: *resumed_at }
                }
            };
            let data = serde_json::to_string(&frame).unwrap_or_default();
            yield Ok(SseEvent::default().event(event_name(&delivery)).data(data));
        }
    };
    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

fn event_name(delivery: &Delivery) -> &'static str {
    match delivery {
        Delivery::Event { .. } => "message",
        Delivery::Gap { .. } => "gap",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventBus;
    use crate::event::{Event, EventKind};
    use serde_json::json;

    /// `into_sse_stream` is exercised end-to-end by the HTTP layer that
    /// consumes it; here we only check it builds from a live subscription
    /// without panicking, since `axum::Sse`'s inner stream type is opaque.
    #[tokio::test]
    async fn builds_an_sse_response_from_a_subscription() {
        let bus = EventBus::new(8);
        let sub = bus.subscribe("a").await;
        bus.publish(&["a".to_string()], Event::new(EventKind::MessageCreated, 1.0, json!({}))).await;
        bus.unsubscribe("a").await;
        let _sse = into_sse_stream(sub);
    }
}
