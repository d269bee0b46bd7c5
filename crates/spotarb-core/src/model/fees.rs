use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Maker/taker rates for one venue, expressed as fractions in `[0, 1)` (0.001 == 0.1%).
/// Cached per venue with a TTL by the venue adapter layer; `fetched_at` lets callers
/// decide whether a cached schedule is still usable without the adapter needing to
/// re-derive that policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub maker: Decimal,
    pub taker: Decimal,
    pub fetched_at: DateTime<Utc>,
}

impl FeeSchedule {
    pub fn new(maker: Decimal, taker: Decimal, fetched_at: DateTime<Utc>) -> Self {
        Self {
            maker,
            taker,
            fetched_at,
        }
    }

    pub fn rate(&self, use_taker: bool) -> Decimal {
        if use_taker {
            self.taker
        } else {
            self.maker
        }
    }

    pub fn is_stale(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        now - self.fetched_at > ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn rate_selects_taker_or_maker() {
        let at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let schedule = FeeSchedule::new(dec!(0.001), dec!(0.002), at);
        assert_eq!(schedule.rate(true), dec!(0.002));
        assert_eq!(schedule.rate(false), dec!(0.001));
    }
}
