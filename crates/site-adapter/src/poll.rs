//! Bounded polling with fixed backoff, independent of the timer primitive.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Source of delays and wall-clock timestamps.
#[async_trait]
pub trait Clock: Send + Sync {
    async fn sleep(&self, duration: Duration);
    fn now_millis(&self) -> i64;
}

/// Clock backed by the tokio timer; honours `tokio::time::pause` in tests.
#[derive(Clone, Debug, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }

    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct PollPolicy {
    /// Delay before the first probe.
    pub first_delay_ms: u64,
    /// Delay between consecutive probes.
    pub interval_ms: u64,
    pub max_attempts: u32,
}

impl PollPolicy {
    pub const fn new(first_delay_ms: u64, interval_ms: u64, max_attempts: u32) -> Self {
        Self {
            first_delay_ms,
            interval_ms,
            max_attempts,
        }
    }

    pub fn first_delay(&self) -> Duration {
        Duration::from_millis(self.first_delay_ms)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Time spent sleeping when every attempt fails.
    pub fn worst_case(&self) -> Duration {
        let gaps = self.max_attempts.saturating_sub(1) as u64;
        Duration::from_millis(self.first_delay_ms + gaps * self.interval_ms)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PollOutcome<T> {
    Ready { value: T, attempts: u32 },
    Exhausted { attempts: u32 },
}

impl<T> PollOutcome<T> {
    pub fn into_value(self) -> Option<T> {
        match self {
            PollOutcome::Ready { value, .. } => Some(value),
            PollOutcome::Exhausted { .. } => None,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            PollOutcome::Ready { attempts, .. } | PollOutcome::Exhausted { attempts } => *attempts,
        }
    }
}

/// Run `probe` until it yields a value or `policy.max_attempts` is reached.
///
/// The probe receives the 1-based attempt number.
pub async fn poll_until<T, F, Fut>(clock: &dyn Clock, policy: &PollPolicy, mut probe: F) -> PollOutcome<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let mut attempts = 0;
    while attempts < policy.max_attempts {
        let delay = if attempts == 0 {
            policy.first_delay()
        } else {
            policy.interval()
        };
        clock.sleep(delay).await;
        attempts += 1;
        if let Some(value) = probe(attempts).await {
            return PollOutcome::Ready { value, attempts };
        }
    }
    PollOutcome::Exhausted { attempts }
}
