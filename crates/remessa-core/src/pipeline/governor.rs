//! Provider pacing: a minimum gap between consecutive batch dispatches, plus
//! the backoff to apply when the provider signals it is rate limited.
//!
//! The governor never sleeps itself. It only computes durations from an
//! injected `Instant`, which keeps it trivially testable and leaves the actual
//! waiting to the dispatcher's async context.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug)]
pub struct RateGovernor {
    min_interval: Duration,
    retry_after_fallback: Duration,
    last_dispatch: Option<Instant>,
}

impl RateGovernor {
    pub fn new(min_interval: Duration, retry_after_fallback: Duration) -> Self {
        Self {
            min_interval,
            retry_after_fallback,
            last_dispatch: None,
        }
    }

    /// How long to wait before the next dispatch is allowed. Zero when no
    /// dispatch has happened yet or the gap has already elapsed. Pacing
    /// carries across cycles via `last_dispatch`.
    pub fn pace(&self, now: Instant) -> Duration {
        match self.last_dispatch {
            None => Duration::ZERO,
            Some(last) => {
                let elapsed = now.saturating_duration_since(last);
                self.min_interval.saturating_sub(elapsed)
            }
        }
    }

    pub fn record_dispatch(&mut self, now: Instant) {
        self.last_dispatch = Some(now);
    }

    /// Backoff after a 429: honor the provider's retry-after when it sent
    /// one, otherwise the configured fallback.
    pub fn backoff(&self, retry_after: Option<Duration>) -> Duration {
        retry_after.unwrap_or(self.retry_after_fallback)
    }
}
