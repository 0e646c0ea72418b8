//! Retry policy with exponential backoff for store transactions.
//!
//! Transient failures (busy, locked, connection loss) retry the whole
//! intent transaction; nothing in memory mutates before commit, so
//! re-running the matching step is safe.

use std::time::Duration;

use rand::Rng;

/// Retry configuration for store transactions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (first try included).
    pub max_attempts: u32,
    /// First backoff step.
    pub base_delay: Duration,
    /// Backoff ceiling.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_millis(1500),
        }
    }
}

impl RetryPolicy {
    /// Create a policy from raw knob values.
    #[must_use]
    pub const fn new(max_attempts: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::from_millis(base_delay_ms),
            max_delay: Duration::from_millis(max_delay_ms),
        }
    }

    /// Start a fresh backoff schedule.
    #[must_use]
    pub const fn schedule(&self) -> BackoffSchedule {
        BackoffSchedule {
            policy: *self,
            attempts_made: 0,
        }
    }
}

/// Per-intent backoff state.
///
/// Doubles the delay each retry, clamps at the ceiling, and applies
/// ±20 % jitter so colliding writers do not retry in lockstep.
#[derive(Debug)]
pub struct BackoffSchedule {
    policy: RetryPolicy,
    attempts_made: u32,
}

impl BackoffSchedule {
    /// Jitter factor applied to each delay.
    const JITTER: f64 = 0.2;

    /// Record an attempt; returns the delay before the next one, or
    /// `None` when the attempt budget is exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        self.attempts_made += 1;
        if self.attempts_made >= self.policy.max_attempts {
            return None;
        }

        let exp = self.attempts_made.saturating_sub(1).min(16);
        let raw_ms = self.policy.base_delay.as_millis() as u64 * (1_u64 << exp);
        let capped_ms = raw_ms.min(self.policy.max_delay.as_millis() as u64);

        let jitter = rand::rng().random_range(-Self::JITTER..=Self::JITTER);
        let jittered = (capped_ms as f64 * (1.0 + jitter)).max(0.0) as u64;
        Some(Duration::from_millis(jittered))
    }

    /// Attempts made so far.
    #[must_use]
    pub const fn attempts_made(&self) -> u32 {
        self.attempts_made
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_exhausts_after_max_attempts() {
        let policy = RetryPolicy::new(3, 10, 1000);
        let mut schedule = policy.schedule();

        assert!(schedule.next_delay().is_some());
        assert!(schedule.next_delay().is_some());
        assert!(schedule.next_delay().is_none());
        assert_eq!(schedule.attempts_made(), 3);
    }

    #[test]
    fn delays_grow_and_respect_ceiling() {
        let policy = RetryPolicy::new(10, 100, 400);
        let mut schedule = policy.schedule();

        let d1 = schedule.next_delay().unwrap().as_millis() as f64;
        let d2 = schedule.next_delay().unwrap().as_millis() as f64;
        let d3 = schedule.next_delay().unwrap().as_millis() as f64;
        let d4 = schedule.next_delay().unwrap().as_millis() as f64;

        // Nominal 100, 200, 400, 400 with +-20% jitter.
        assert!((80.0..=120.0).contains(&d1), "d1 = {d1}");
        assert!((160.0..=240.0).contains(&d2), "d2 = {d2}");
        assert!((320.0..=480.0).contains(&d3), "d3 = {d3}");
        assert!((320.0..=480.0).contains(&d4), "d4 = {d4}");
    }

    #[test]
    fn single_attempt_policy_never_sleeps() {
        let policy = RetryPolicy::new(1, 50, 1500);
        let mut schedule = policy.schedule();
        assert!(schedule.next_delay().is_none());
    }

    #[test]
    fn default_policy_matches_knob_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.base_delay, Duration::from_millis(50));
        assert_eq!(policy.max_delay, Duration::from_millis(1500));
    }
}
