//! In-process event bus, SSE framing, and backpressure classification
//! (§4.7, §5, §6). Consumed by the `claude-slack` façade, which taps every
//! mutating operation to publish here after its transaction commits.

#![forbid(unsafe_code)]

pub mod bus;
pub mod error;
pub mod event;
pub mod health;
pub mod sse;

pub use bus::{Delivery, EventBus, Subscription};
pub use error::{EventError, EventResult};
pub use event::{Event, EventKind, Route};
pub use health::{HealthLevel, HealthSignals};
