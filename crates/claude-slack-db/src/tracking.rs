//! Slow-query tracking. Opt-in instrumentation wrapping a query future and
//! logging (via `tracing`) when it crosses a configurable threshold,
//! matching the teacher's `mcp-agent-mail-db::tracking` convention of
//! keeping this out of the hot path unless a threshold is set.

use std::future::Future;
use std::time::{Duration, Instant};

/// Default slow-query threshold: queries under this are never logged.
pub const DEFAULT_SLOW_QUERY_THRESHOLD: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy)]
pub struct QueryTracker {
    threshold: Duration,
    enabled: bool,
}

impl Default for QueryTracker {
    fn default() -> Self {
        Self { threshold: DEFAULT_SLOW_QUERY_THRESHOLD, enabled: false }
    }
}

impl QueryTracker {
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn enabled(threshold: Duration) -> Self {
        Self { threshold, enabled: true }
    }

    /// Run `fut`, logging at `warn` if it exceeds the configured threshold.
    /// `label` should identify the query (module path or a short name), not
    /// the full SQL text, to avoid leaking bound parameters into logs.
    pub async fn track<T, Fut>(&self, label: &str, fut: Fut) -> T
    where
        Fut: Future<Output = T>,
    {
        if !self.enabled {
            return fut.await;
        }
        let start = Instant::now();
        let result = fut.await;
        let elapsed = start.elapsed();
        if elapsed >= self.threshold {
            tracing::warn!(query = label, elapsed_ms = elapsed.as_millis() as u64, "slow query");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_tracker_is_a_passthrough() {
        let tracker = QueryTracker::disabled();
        let value = tracker.track("noop", async { 42 }).await;
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn enabled_tracker_returns_inner_value() {
        let tracker = QueryTracker::enabled(Duration::from_millis(0));
        let value = tracker.track("noop", async { "ok" }).await;
        assert_eq!(value, "ok");
    }
}
