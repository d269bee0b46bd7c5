use crate::ids::VenueId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A proposed inter-venue transfer of `asset` to reduce inventory skew.
/// `is_viable` is derived from `cost_pct` at construction time, not recomputed later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebalanceProposal {
    pub asset: String,
    pub source_venue: VenueId,
    pub target_venue: VenueId,
    pub amount: Decimal,
    pub estimated_fee: Decimal,
    pub cost_pct: Decimal,
    pub trend_label: String,
    pub is_viable: bool,
}

impl RebalanceProposal {
    pub fn new(
        asset: impl Into<String>,
        source_venue: VenueId,
        target_venue: VenueId,
        amount: Decimal,
        estimated_fee: Decimal,
        trend_label: impl Into<String>,
        viability_ceiling: Decimal,
    ) -> Self {
        let cost_pct = if amount > Decimal::ZERO {
            estimated_fee / amount * Decimal::ONE_HUNDRED
        } else {
            Decimal::MAX
        };
        let is_viable = cost_pct <= viability_ceiling;
        Self {
            asset: asset.into(),
            source_venue,
            target_venue,
            amount,
            estimated_fee,
            cost_pct,
            trend_label: trend_label.into(),
            is_viable,
        }
    }
}
