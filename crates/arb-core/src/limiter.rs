use std::time::Duration;

use tokio::time::Instant;

/// Fixed-spacing slot reservation shared by the throttling decorator and the
/// broadcast admission loop.
#[derive(Debug)]
pub(crate) struct IntervalLimiter {
    interval: Duration,
    next: Instant,
}

impl IntervalLimiter {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Instant::now(),
        }
    }

    /// Spacing for `per_sec` slots a second, rounded up so that
    /// `n` reservations never span less than `n / per_sec` seconds.
    pub(crate) fn per_second(per_sec: u32) -> Self {
        let per_sec = u64::from(per_sec.max(1));
        Self::new(Duration::from_nanos(1_000_000_000u64.div_ceil(per_sec)))
    }

    /// No reservation is pending.
    pub(crate) fn is_idle(&self) -> bool {
        Instant::now() >= self.next
    }

    /// Reserve the next slot and return the wait duration required before executing.
    pub(crate) fn reserve(&mut self) -> Duration {
        let now = Instant::now();
        let start = if now >= self.next { now } else { self.next };
        self.next = start + self.interval;
        start.saturating_duration_since(now)
    }
}
