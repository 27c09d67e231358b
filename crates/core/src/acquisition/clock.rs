//! Wall clock abstraction.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// Source of the current wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Wall time that starts at a fixed point and advances with the tokio clock.
///
/// Under a paused tokio runtime this keeps market-hours checks in step with
/// `tokio::time::sleep`, so long waits can be simulated instantly.
#[derive(Clone, Debug)]
pub struct AnchoredClock {
    origin: DateTime<Utc>,
    started: Instant,
}

impl AnchoredClock {
    pub fn new(origin: DateTime<Utc>) -> Self {
        Self {
            origin,
            started: Instant::now(),
        }
    }

    pub fn shared(origin: DateTime<Utc>) -> Arc<dyn Clock> {
        Arc::new(Self::new(origin))
    }
}

impl Clock for AnchoredClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.started.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.origin + elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_anchored_clock_follows_tokio_time() {
        let origin = Utc.with_ymd_and_hms(2025, 1, 6, 3, 0, 0).unwrap();
        let clock = AnchoredClock::new(origin);
        assert_eq!(clock.now(), origin);

        tokio::time::sleep(Duration::from_secs(90)).await;
        assert_eq!(clock.now(), origin + chrono::Duration::seconds(90));
    }
}
