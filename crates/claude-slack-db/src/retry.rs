//! Exponential backoff + circuit breaker for transient lock contention
//! (§4.1, §7). Grounded on the teacher's `mcp-agent-mail-db::retry`.
//!
//! | Attempt | Delay (base) |
//! |---------|-------------|
//! | 0       | 50ms        |
//! | 1       | 100ms       |
//! | 2       | 200ms       |
//! | 3       | 400ms       |
//! | 4       | 800ms       |
//!
//! After 5 consecutive failures the circuit opens for 30s, failing fast.

use crate::error::DbError;
use rand::Rng;
use std::future::Future;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

const MAX_ATTEMPTS: u32 = 5;
const BASE_DELAY_MS: u64 = 50;
const FAILURE_THRESHOLD: u32 = 5;
const RESET_AFTER: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Thread-safe circuit breaker guarding the write path against a thundering
/// herd of retries once the database is genuinely stuck.
pub struct CircuitBreaker {
    failures: AtomicU32,
    open_until_ms: AtomicU64,
    epoch: Instant,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self { failures: AtomicU32::new(0), open_until_ms: AtomicU64::new(0), epoch: Instant::now() }
    }
}

impl CircuitBreaker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    #[must_use]
    pub fn state(&self) -> CircuitState {
        let open_until = self.open_until_ms.load(Ordering::Relaxed);
        if open_until == 0 {
            CircuitState::Closed
        } else if self.now_ms() >= open_until {
            CircuitState::HalfOpen
        } else {
            CircuitState::Open
        }
    }

    pub fn record_success(&self) {
        self.failures.store(0, Ordering::Relaxed);
        self.open_until_ms.store(0, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        let failures = self.failures.fetch_add(1, Ordering::Relaxed) + 1;
        if failures >= FAILURE_THRESHOLD {
            self.open_until_ms.store(self.now_ms() + RESET_AFTER.as_millis() as u64, Ordering::Relaxed);
        }
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    let base = BASE_DELAY_MS.saturating_mul(1u64 << attempt.min(10));
    let jitter_frac = rand::rng().random_range(0.75..1.25);
    Duration::from_millis((base as f64 * jitter_frac) as u64)
}

/// Run `op` with bounded exponential backoff, retrying only `DbError`
/// variants that represent transient lock contention (§7: "`Unavailable`
/// is retried with bounded exponential backoff inside the façade").
pub async fn retry_on_lock<T, F, Fut>(breaker: &CircuitBreaker, mut op: F) -> Result<T, DbError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DbError>>,
{
    if breaker.state() == CircuitState::Open {
        return Err(DbError::Locked);
    }

    let mut last_err = DbError::Locked;
    for attempt in 0..MAX_ATTEMPTS {
        match op().await {
            Ok(v) => {
                breaker.record_success();
                return Ok(v);
            }
            Err(e @ DbError::Sqlx(ref sqlx_err)) if crate::error::is_lock_error(sqlx_err) => {
                breaker.record_failure();
                last_err = e;
                if attempt + 1 < MAX_ATTEMPTS {
                    tracing::warn!(attempt, "database locked, retrying");
                    tokio::time::sleep(backoff_delay(attempt)).await;
                }
            }
            Err(e @ DbError::Locked) => {
                breaker.record_failure();
                last_err = e;
                if attempt + 1 < MAX_ATTEMPTS {
                    tokio::time::sleep(backoff_delay(attempt)).await;
                }
            }
            Err(other) => return Err(other),
        }
    }
    Err(last_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32 as Counter;
    use std::sync::Arc;

    #[tokio::test]
    async fn retries_then_succeeds() {
        let breaker = CircuitBreaker::new();
        let attempts = Arc::new(Counter::new(0));
        let a = attempts.clone();
        let result: Result<i32, DbError> = retry_on_lock(&breaker, || {
            let a = a.clone();
            async move {
                let n = a.fetch_add(1, Ordering::SeqCst);
                if n < 2 { Err(DbError::Locked) } else { Ok(42) }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn circuit_opens_after_threshold() {
        let breaker = CircuitBreaker::new();
        for _ in 0..FAILURE_THRESHOLD {
            breaker.record_failure();
        }
        assert_eq!(breaker.state(), CircuitState::Open);
    }
}
