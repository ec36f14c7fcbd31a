//! Pipeline monotonic clock.
//!
//! All arrival timestamps and the alignment clock share this time base:
//! nanoseconds since pipeline start, anchored to a `tokio::time::Instant` so
//! deadlines convert back without drift.

use contracts::Nanos;
use std::time::Duration;
use tokio::time::Instant;

/// Process-local monotonic clock anchored at pipeline start.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    epoch: Instant,
}

impl MonotonicClock {
    /// Anchor a new clock at the current instant.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }

    /// Nanoseconds elapsed since the anchor.
    pub fn now(&self) -> Nanos {
        self.epoch.elapsed().as_nanos() as Nanos
    }

    /// Convert a clock timestamp back into an awaitable instant.
    pub fn instant_at(&self, ts: Nanos) -> Instant {
        self.epoch + Duration::from_nanos(ts.max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_clock_advances_with_time() {
        let clock = MonotonicClock::start();
        let t0 = clock.now();

        tokio::time::advance(Duration::from_millis(50)).await;
        let t1 = clock.now();
        assert!(t1 >= t0 + 50_000_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_instant_round_trip() {
        let clock = MonotonicClock::start();
        let target = clock.now() + 10_000_000;
        let instant = clock.instant_at(target);

        tokio::time::sleep_until(instant).await;
        assert!(clock.now() >= target);
    }
}
