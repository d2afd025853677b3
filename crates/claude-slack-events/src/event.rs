//! Event envelope and topic/kind vocabulary (§4.7: "topic identifiers keyed
//! by event kind").

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// The fixed vocabulary of event kinds the bus fans out. New kinds are
/// additive; consumers should tolerate unknown kinds gracefully (handled by
/// `#[serde(other)]` below rather than a parse error).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    MessageCreated,
    ChannelCreated,
    ChannelArchived,
    ChannelMemberJoined,
    ChannelMemberLeft,
    AgentRegistered,
    DmCreated,
    #[serde(other)]
    Unknown,
}

impl EventKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MessageCreated => "message.created",
            Self::ChannelCreated => "channel.created",
            Self::ChannelArchived => "channel.archived",
            Self::ChannelMemberJoined => "channel.member.joined",
            Self::ChannelMemberLeft => "channel.member.left",
            Self::AgentRegistered => "agent.registered",
            Self::DmCreated => "dm.created",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Routing scope: which subscribers an event is fanned out to (§4.7 routing
/// rules). Computed by the publisher, not the bus — the bus only knows
/// "deliver to these subscriber ids".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub subscriber_ids: Vec<String>,
}

impl Route {
    #[must_use]
    pub fn to(subscriber_ids: Vec<String>) -> Self {
        Self { subscriber_ids }
    }
}

/// A single event carried on the bus. `seq` is assigned per-subscriber at
/// delivery time (see `bus::Subscription`), not here — the same logical
/// event fans out to many subscribers, each with its own sequence space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    /// Wall-clock commit time in seconds since the epoch, set by the
    /// publisher after its transaction commits (§5: "event publication
    /// occurs after transaction commit").
    pub timestamp: f64,
    pub payload: Json,
}

impl Event {
    /// `timestamp` is the publisher's transaction-commit time, not wall
    /// clock at bus-enqueue time — the bus never stamps events itself.
    #[must_use]
    pub fn new(kind: EventKind, timestamp: f64, payload: Json) -> Self {
        Self { kind, timestamp, payload }
    }
}
