// Escalating idle backoff
use std::time::Duration;

/// Sleep schedule for empty cycles: `base` until `threshold` consecutive empty
/// cycles, `extended` from then on. Any busy cycle resets the streak.
#[derive(Debug, Clone)]
pub struct IdleBackoff {
    base: Duration,
    extended: Duration,
    threshold: u32,
    consecutive_idle: u32,
}

impl IdleBackoff {
    pub fn new(base: Duration, extended: Duration, threshold: u32) -> Self {
        Self {
            base,
            extended,
            threshold,
            consecutive_idle: 0,
        }
    }

    pub fn consecutive_idle(&self) -> u32 {
        self.consecutive_idle
    }

    /// Register an empty cycle and return how long to sleep
    pub fn record_idle(&mut self) -> Duration {
        self.consecutive_idle = self.consecutive_idle.saturating_add(1);
        if self.consecutive_idle >= self.threshold {
            self.extended
        } else {
            self.base
        }
    }

    pub fn record_busy(&mut self) {
        self.consecutive_idle = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escalates_after_threshold() {
        let mut backoff = IdleBackoff::new(Duration::from_secs(30), Duration::from_secs(120), 3);

        assert_eq!(backoff.record_idle(), Duration::from_secs(30));
        assert_eq!(backoff.record_idle(), Duration::from_secs(30));
        assert_eq!(backoff.record_idle(), Duration::from_secs(120));
        assert_eq!(backoff.record_idle(), Duration::from_secs(120));
    }

    #[test]
    fn test_busy_cycle_resets_streak() {
        let mut backoff = IdleBackoff::new(Duration::from_secs(30), Duration::from_secs(120), 2);
        backoff.record_idle();
        backoff.record_idle();
        backoff.record_busy();

        assert_eq!(backoff.consecutive_idle(), 0);
        assert_eq!(backoff.record_idle(), Duration::from_secs(30));
    }
}
