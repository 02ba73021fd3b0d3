//! Global sprint clock.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// The current sprint number and when it started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SprintClock {
    pub cycle: u32,
    pub started_at: DateTime<Utc>,
}

impl SprintClock {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self { cycle: 1, started_at }
    }

    /// Whole sprints elapsed since `started_at`.
    pub fn elapsed_cycles(&self, now: DateTime<Utc>, duration: Duration) -> u32 {
        if duration <= Duration::zero() || now <= self.started_at {
            return 0;
        }
        let elapsed = (now - self.started_at).num_seconds();
        let per_cycle = duration.num_seconds().max(1);
        u32::try_from(elapsed / per_cycle).unwrap_or(u32::MAX)
    }

    /// Move forward by every fully elapsed sprint. Returns how many were skipped.
    ///
    /// Calling this again with the same `now` is a no-op.
    pub fn advance(&mut self, now: DateTime<Utc>, duration: Duration) -> u32 {
        let elapsed = self.elapsed_cycles(now, duration);
        if elapsed > 0 {
            self.cycle = self.cycle.saturating_add(elapsed);
            self.started_at += duration * elapsed as i32;
        }
        elapsed
    }

    pub fn days_remaining(&self, now: DateTime<Utc>, duration: Duration) -> i64 {
        let elapsed_days = (now - self.started_at).num_days();
        (duration.num_days() - elapsed_days).max(0)
    }

    pub fn label(&self) -> String {
        format!("Sprint {}", self.cycle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-05T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_no_advance_within_sprint() {
        let mut clock = SprintClock::new(start());
        let advanced = clock.advance(start() + Duration::days(13), Duration::days(14));
        assert_eq!(advanced, 0);
        assert_eq!(clock.cycle, 1);
    }

    #[test]
    fn test_advance_skips_multiple_elapsed_sprints() {
        let mut clock = SprintClock::new(start());
        let now = start() + Duration::days(30);
        assert_eq!(clock.advance(now, Duration::days(14)), 2);
        assert_eq!(clock.cycle, 3);
        assert_eq!(clock.started_at, start() + Duration::days(28));
    }

    #[test]
    fn test_advance_is_idempotent_for_same_instant() {
        let mut clock = SprintClock::new(start());
        let now = start() + Duration::days(15);
        clock.advance(now, Duration::days(14));
        let snapshot = clock;
        assert_eq!(clock.advance(now, Duration::days(14)), 0);
        assert_eq!(clock, snapshot);
    }

    #[test]
    fn test_days_remaining() {
        let clock = SprintClock::new(start());
        assert_eq!(clock.days_remaining(start() + Duration::days(4), Duration::days(14)), 10);
        assert_eq!(clock.days_remaining(start() + Duration::days(20), Duration::days(14)), 0);
    }
}
