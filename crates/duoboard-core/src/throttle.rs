//! Wall-clock rate limiting for chatty message classes.

#[cfg(not(target_arch = "wasm32"))]
use std::time::{Duration, Instant};
#[cfg(target_arch = "wasm32")]
use web_time::{Duration, Instant};

/// Leading-edge limiter: the first event passes, later ones are refused until
/// `interval` has elapsed since the last one that passed.
#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    last: Option<Instant>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self { interval, last: None }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Would an event at `now` pass? Does not consume the slot.
    pub fn is_ready(&self, now: Instant) -> bool {
        match self.last {
            Some(last) => now.saturating_duration_since(last) >= self.interval,
            None => true,
        }
    }

    /// Consume the slot if an event at `now` may pass.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        if !self.is_ready(now) {
            return false;
        }
        self.last = Some(now);
        true
    }

    /// Forget the last event so the next one passes immediately.
    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leading_edge() {
        let mut throttle = Throttle::new(Duration::from_millis(500));
        let t0 = Instant::now();
        assert!(throttle.try_acquire(t0));
        assert!(!throttle.try_acquire(t0 + Duration::from_millis(100)));
        assert!(!throttle.try_acquire(t0 + Duration::from_millis(499)));
        assert!(throttle.try_acquire(t0 + Duration::from_millis(500)));
    }

    #[test]
    fn test_zero_interval_always_passes() {
        let mut throttle = Throttle::new(Duration::ZERO);
        let t0 = Instant::now();
        assert!(throttle.try_acquire(t0));
        assert!(throttle.try_acquire(t0));
    }

    #[test]
    fn test_reset() {
        let mut throttle = Throttle::new(Duration::from_secs(5));
        let t0 = Instant::now();
        assert!(throttle.try_acquire(t0));
        throttle.reset();
        assert!(throttle.is_ready(t0));
    }
}
