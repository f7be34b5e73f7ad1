//! Clock abstraction
//!
//! The engine never reads wall-clock time directly; every rollover decision
//! goes through this trait so period boundaries stay testable.

use std::sync::{Mutex, PoisonError};

use time::{Duration, OffsetDateTime};

pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

/// Wall-clock time in UTC
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Settable clock for development and tests
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<OffsetDateTime>,
}

impl ManualClock {
    pub fn new(now: OffsetDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: OffsetDateTime) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_manual_clock_set_and_advance() {
        let clock = ManualClock::new(datetime!(2026-01-15 8:00 UTC));
        assert_eq!(clock.now(), datetime!(2026-01-15 8:00 UTC));

        clock.advance(Duration::hours(30));
        assert_eq!(clock.now(), datetime!(2026-01-16 14:00 UTC));

        clock.set(datetime!(2026-02-01 0:00 UTC));
        assert_eq!(clock.now(), datetime!(2026-02-01 0:00 UTC));
    }
}
