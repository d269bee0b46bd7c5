use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Holdings of one asset on one venue. `free` is available to trade, `locked` is
/// tied up in open orders; both are always `>= 0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub asset: String,
    pub free: Decimal,
    pub locked: Decimal,
}

impl Balance {
    pub fn new(asset: impl Into<String>, free: Decimal, locked: Decimal) -> Self {
        debug_assert!(free >= Decimal::ZERO, "free balance cannot be negative");
        debug_assert!(locked >= Decimal::ZERO, "locked balance cannot be negative");
        Self {
            asset: asset.into(),
            free,
            locked,
        }
    }

    pub fn total(&self) -> Decimal {
        self.free + self.locked
    }
}
