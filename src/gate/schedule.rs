// src/gate/schedule.rs

use std::time::Duration;

/// Delay between connectivity re-probes.
///
/// The attempt counter is unbounded. With `multiplier == 1.0` (or
/// `max_interval == interval`) every delay equals `interval`; otherwise the
/// delay grows geometrically and is capped at `max_interval`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrySchedule {
    interval: Duration,
    max_interval: Duration,
    multiplier: f64,
    attempts: u64,
}

impl RetrySchedule {
    pub fn fixed(interval: Duration) -> Self {
        Self::with_backoff(interval, interval, 1.0)
    }

    pub fn with_backoff(interval: Duration, max_interval: Duration, multiplier: f64) -> Self {
        Self {
            interval,
            max_interval: max_interval.max(interval),
            multiplier: multiplier.max(1.0),
            attempts: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn max_interval(&self) -> Duration {
        self.max_interval
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    /// Number of delays handed out since the last reset.
    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    /// Record one more failed attempt and return how long to wait.
    pub fn next_delay(&mut self) -> Duration {
        let exponent = self.attempts.min(i32::MAX as u64) as i32;
        self.attempts = self.attempts.saturating_add(1);

        let scaled = self.interval.as_secs_f64() * self.multiplier.powi(exponent);
        if !scaled.is_finite() || scaled >= self.max_interval.as_secs_f64() {
            return self.max_interval;
        }
        Duration::from_secs_f64(scaled)
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}

impl Default for RetrySchedule {
    fn default() -> Self {
        Self::fixed(Duration::from_secs(10))
    }
}
