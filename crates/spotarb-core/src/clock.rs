//! Injectable time and jitter sources (component C12). Every periodic loop and every
//! timestamp recorded on an `Opportunity` or `Transaction` goes through a `Clock`
//! rather than calling `chrono::Utc::now()` directly, so tests can drive time
//! deterministically instead of relying on wall-clock sleeps.

use chrono::{DateTime, Utc};
use std::time::Duration;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub trait RandomSource: Send + Sync {
    /// Returns a duration in `[0, bound]`, used to jitter periodic loop intervals.
    fn jitter(&self, bound: Duration) -> Duration;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandomSource;

impl RandomSource for ThreadRandomSource {
    fn jitter(&self, bound: Duration) -> Duration {
        if bound.is_zero() {
            return Duration::ZERO;
        }
        let millis = bound.as_millis().max(1) as u64;
        Duration::from_millis(rand::random::<u64>() % millis)
    }
}

/// A clock that always returns the same instant until manually advanced, for
/// deterministic tests that would otherwise depend on wall-clock timing.
#[derive(Debug)]
pub struct FixedClock {
    inner: parking_lot::RwLock<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            inner: parking_lot::RwLock::new(at),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut guard = self.inner.write();
        *guard += by;
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.inner.write() = at;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.inner.read()
    }
}

/// A jitter source that always returns a fixed duration, for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedRandomSource(pub Duration);

impl RandomSource for FixedRandomSource {
    fn jitter(&self, bound: Duration) -> Duration {
        self.0.min(bound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn fixed_clock_holds_steady_until_advanced() {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let clock = FixedClock::new(start);
        assert_eq!(clock.now(), start);
        clock.advance(chrono::Duration::seconds(30));
        assert_eq!(clock.now(), start + chrono::Duration::seconds(30));
    }

    #[test]
    fn fixed_random_source_never_exceeds_bound() {
        let source = FixedRandomSource(Duration::from_secs(10));
        assert_eq!(source.jitter(Duration::from_secs(1)), Duration::from_secs(1));
        assert_eq!(source.jitter(Duration::from_secs(20)), Duration::from_secs(10));
    }
}
