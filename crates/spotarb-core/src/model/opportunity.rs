use crate::ids::{Symbol, VenueId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A detected cross-venue price dislocation, independently identified by `id` at
/// detection time so the executor can dedupe replays of the same signal.
/// `buy_fee`/`sell_fee`/`gross_pct`/`net_pct` are all expressed as percent of
/// notional (e.g. `2.83` means 2.83%), matching `gross_pct`/`net_pct`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub id: Uuid,
    pub symbol: Symbol,
    pub base: String,
    pub quote: String,
    pub buy_venue: VenueId,
    pub sell_venue: VenueId,
    pub buy_price: Decimal,
    pub sell_price: Decimal,
    pub volume: Decimal,
    pub buy_fee: Decimal,
    pub sell_fee: Decimal,
    pub gross_pct: Decimal,
    pub net_pct: Decimal,
    pub timestamp: DateTime<Utc>,
    pub is_sandbox: bool,
}

impl Opportunity {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbol: Symbol,
        base: impl Into<String>,
        quote: impl Into<String>,
        buy_venue: VenueId,
        sell_venue: VenueId,
        buy_price: Decimal,
        sell_price: Decimal,
        volume: Decimal,
        buy_fee: Decimal,
        sell_fee: Decimal,
        gross_pct: Decimal,
        net_pct: Decimal,
        timestamp: DateTime<Utc>,
        is_sandbox: bool,
    ) -> Self {
        debug_assert!(buy_venue != sell_venue, "buy and sell venue must differ");
        debug_assert!(volume > Decimal::ZERO, "volume must be positive");
        Self {
            id: Uuid::new_v4(),
            symbol,
            base: base.into(),
            quote: quote.into(),
            buy_venue,
            sell_venue,
            buy_price,
            sell_price,
            volume,
            buy_fee,
            sell_fee,
            gross_pct,
            net_pct,
            timestamp,
            is_sandbox,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.buy_venue != self.sell_venue && self.volume > Decimal::ZERO
    }
}
