//! Health/backpressure classification (§4.7, §5 "shared resources").
//!
//! A three-level `Green`/`Yellow`/`Red` classification derived from pool
//! acquire latency and event-queue depth, used by the façade to decide
//! whether to defer non-critical work (e.g. drift resync) under load.
//! Grounded on the teacher's `mcp-agent-mail-core::backpressure` module:
//! same level semantics and threshold-module layout, signals narrowed to
//! what this broker actually tracks (no write-behind queue or commit
//! queue here).

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthLevel {
    /// All subsystems nominal.
    Green,
    /// Elevated load; non-critical maintenance (drift resync) may be
    /// deferred.
    Yellow,
    /// Overloaded; reject non-essential work until signals recover.
    Red,
}

impl HealthLevel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Green => "green",
            Self::Yellow => "yellow",
            Self::Red => "red",
        }
    }
}

impl std::fmt::Display for HealthLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub mod yellow {
    pub const POOL_ACQUIRE_P95_US: u64 = 50_000;
    pub const QUEUE_DEPTH_PCT: u64 = 50;
}

pub mod red {
    pub const POOL_ACQUIRE_P95_US: u64 = 200_000;
    pub const QUEUE_DEPTH_PCT: u64 = 85;
}

const _: () = {
    assert!(yellow::POOL_ACQUIRE_P95_US < red::POOL_ACQUIRE_P95_US);
    assert!(yellow::QUEUE_DEPTH_PCT < red::QUEUE_DEPTH_PCT);
};

/// Raw signal values used to classify the composite level. `queue_depth_pct`
/// is the fullest subscriber queue's occupancy as a percentage of capacity,
/// sampled by the caller (the bus itself never blocks to compute this).
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct HealthSignals {
    pub pool_acquire_p95_us: u64,
    pub queue_depth_pct: u64,
}

impl HealthSignals {
    #[must_use]
    pub const fn classify(&self) -> HealthLevel {
        if self.pool_acquire_p95_us > red::POOL_ACQUIRE_P95_US
            || self.queue_depth_pct >= red::QUEUE_DEPTH_PCT
        {
            return HealthLevel::Red;
        }
        if self.pool_acquire_p95_us > yellow::POOL_ACQUIRE_P95_US
            || self.queue_depth_pct >= yellow::QUEUE_DEPTH_PCT
        {
            return HealthLevel::Yellow;
        }
        HealthLevel::Green
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nominal_signals_are_green() {
        let s = HealthSignals { pool_acquire_p95_us: 1_000, queue_depth_pct: 10 };
        assert_eq!(s.classify(), HealthLevel::Green);
    }

    #[test]
    fn elevated_latency_is_yellow() {
        let s = HealthSignals { pool_acquire_p95_us: 60_000, queue_depth_pct: 10 };
        assert_eq!(s.classify(), HealthLevel::Yellow);
    }

    #[test]
    fn saturated_queue_is_red() {
        let s = HealthSignals { pool_acquire_p95_us: 1_000, queue_depth_pct: 90 };
        assert_eq!(s.classify(), HealthLevel::Red);
    }

    #[test]
    fn red_wins_over_yellow_when_both_breached() {
        let s = HealthSignals { pool_acquire_p95_us: 300_000, queue_depth_pct: 60 };
        assert_eq!(s.classify(), HealthLevel::Red);
    }
}
