//! Minimum spacing between delivered responses.
//!
//! Throttling delays a response; it never drops one.

use std::time::{Duration, Instant};

/// Default minimum interval between two deliveries.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(3000);

/// Schedules deliveries no closer together than `min_interval`.
#[derive(Debug, Clone)]
pub struct ResponseThrottle {
    min_interval: Duration,
    last_delivery: Option<Instant>,
}

impl ResponseThrottle {
    #[must_use]
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_delivery: None,
        }
    }

    #[must_use]
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// How long a delivery requested at `now` has to wait.
    #[must_use]
    pub fn delay(&self, now: Instant) -> Duration {
        self.last_delivery
            .map(|last| (last + self.min_interval).saturating_duration_since(now))
            .unwrap_or_default()
    }

    /// Reserve the next delivery slot for a request made at `now`.
    ///
    /// Returns the instant the delivery may happen. The slot is recorded, so
    /// the following call is spaced from it even if it has not happened yet.
    pub fn schedule(&mut self, now: Instant) -> Instant {
        let at = now + self.delay(now);
        self.last_delivery = Some(at);
        at
    }

    /// Record a delivery that finished at `at`.
    ///
    /// A delivery that ran late pushes the next slot back with it.
    pub fn mark_delivered(&mut self, at: Instant) {
        if self.last_delivery.map_or(true, |last| at > last) {
            self.last_delivery = Some(at);
        }
    }

    /// Last reserved or completed delivery.
    #[must_use]
    pub fn last_delivery(&self) -> Option<Instant> {
        self.last_delivery
    }
}

impl Default for ResponseThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_INTERVAL)
    }
}
