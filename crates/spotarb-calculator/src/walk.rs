use rust_decimal::{Decimal, RoundingStrategy};
use spotarb_core::PriceLevel;

/// Rounds a division result half-even to 12 fractional digits, the convention used
/// for every VWAP and percentage figure this crate produces.
pub fn round12(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(12, RoundingStrategy::MidpointNearestEven)
}

/// Simultaneously consumes `asks` (ascending) and `bids` (descending) until the
/// next prices cross, optionally stopping early once `cap` units have been
/// accumulated. Returns `(buy_vwap, sell_vwap, volume)`, or `None` if no volume
/// could be matched at all.
pub fn walk_books(
    asks: &[PriceLevel],
    bids: &[PriceLevel],
    cap: Option<Decimal>,
) -> Option<(Decimal, Decimal, Decimal)> {
    if let Some(cap) = cap {
        if cap <= Decimal::ZERO {
            return None;
        }
    }

    let mut ask_idx = 0usize;
    let mut bid_idx = 0usize;
    let mut ask_remaining = asks.first().map(|l| l.quantity).unwrap_or(Decimal::ZERO);
    let mut bid_remaining = bids.first().map(|l| l.quantity).unwrap_or(Decimal::ZERO);

    let mut volume = Decimal::ZERO;
    let mut buy_weighted = Decimal::ZERO;
    let mut sell_weighted = Decimal::ZERO;

    while ask_idx < asks.len() && bid_idx < bids.len() {
        let ask = asks[ask_idx];
        let bid = bids[bid_idx];
        if ask.price > bid.price {
            break;
        }

        let mut increment = ask_remaining.min(bid_remaining);
        if let Some(cap) = cap {
            let remaining_cap = cap - volume;
            if remaining_cap <= Decimal::ZERO {
                break;
            }
            increment = increment.min(remaining_cap);
        }
        if increment <= Decimal::ZERO {
            break;
        }

        buy_weighted += ask.price * increment;
        sell_weighted += bid.price * increment;
        volume += increment;
        ask_remaining -= increment;
        bid_remaining -= increment;

        if ask_remaining <= Decimal::ZERO {
            ask_idx += 1;
            ask_remaining = asks.get(ask_idx).map(|l| l.quantity).unwrap_or(Decimal::ZERO);
        }
        if bid_remaining <= Decimal::ZERO {
            bid_idx += 1;
            bid_remaining = bids.get(bid_idx).map(|l| l.quantity).unwrap_or(Decimal::ZERO);
        }
        if let Some(cap) = cap {
            if volume >= cap {
                break;
            }
        }
    }

    if volume <= Decimal::ZERO {
        return None;
    }

    Some((
        round12(buy_weighted / volume),
        round12(sell_weighted / volume),
        volume,
    ))
}
