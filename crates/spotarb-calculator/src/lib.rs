//! The pure cross-venue opportunity calculator (component C4). No I/O: every input
//! is supplied by the caller, every output is a value, and calling it twice with the
//! same arguments always returns the same `Opportunity` (or `None`).

mod walk;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use spotarb_core::{Balance, FeeSchedule, OrderBook, Opportunity, Symbol, VenueId};
use std::collections::HashMap;
use walk::{round12, walk_books};

/// The sanity floor below which no opportunity is ever accepted, even for
/// passive-rebalance purposes. Mirrors `AppSettings::ABSOLUTE_FLOOR_PCT`; kept as an
/// independent constant here so this crate has no dependency on settings types.
pub const ABSOLUTE_FLOOR_PCT: Decimal = dec!(0.01);

/// Volumes at or below this are treated as dust and discarded rather than producing
/// a near-zero-size opportunity.
pub const DUST_FLOOR: Decimal = dec!(0.00000001);

/// Per-venue balances available to the calculator, keyed by asset symbol.
pub type VenueBalances = HashMap<String, Balance>;

pub struct CalculatorInput<'a> {
    pub symbol: &'a Symbol,
    pub base: &'a str,
    pub quote: &'a str,
    pub books: &'a HashMap<VenueId, OrderBook>,
    pub fees: &'a HashMap<VenueId, FeeSchedule>,
    pub use_taker_fees: bool,
    /// The threshold this computation will be accepted against, already resolved by
    /// the caller (global default or per-pair override — see
    /// `AppSettings::effective_threshold`). Retained for caller bookkeeping only:
    /// `compute` never reads it, and enforces only [`ABSOLUTE_FLOOR_PCT`] on its own.
    /// The caller re-checks the returned `Opportunity.net_pct` against this value
    /// itself (component C5's dual-stream emission needs the unfiltered candidate
    /// for the passive-rebalance stream, which only applies the absolute floor).
    pub threshold_pct: Decimal,
    pub balances: Option<&'a HashMap<VenueId, VenueBalances>>,
    pub safe_balance_multiplier: Decimal,
    pub is_sandbox: bool,
    pub timestamp: DateTime<Utc>,
}

struct Candidate {
    buy_venue: VenueId,
    sell_venue: VenueId,
    buy_vwap: Decimal,
    sell_vwap: Decimal,
    volume: Decimal,
    buy_fee_pct: Decimal,
    sell_fee_pct: Decimal,
    gross_pct: Decimal,
    net_pct: Decimal,
}

/// Computes the single best cross-venue opportunity for `input.symbol`, or `None`
/// if no venue pair clears [`ABSOLUTE_FLOOR_PCT`]. The caller is responsible for
/// re-checking `opportunity.net_pct` against whatever stream-specific threshold
/// applies (the global/pair threshold for trade signals, `ABSOLUTE_FLOOR_PCT` alone
/// for passive-rebalance candidates) — see component C5's dual-stream emission.
pub fn compute(input: &CalculatorInput<'_>) -> Option<Opportunity> {
    let mut best: Option<Candidate> = None;

    let venues: Vec<&VenueId> = input.books.keys().collect();
    for buy_venue in &venues {
        for sell_venue in &venues {
            if buy_venue == sell_venue {
                continue;
            }
            if let Some(candidate) = evaluate_pair(input, buy_venue, sell_venue) {
                if candidate.net_pct < ABSOLUTE_FLOOR_PCT {
                    continue;
                }
                best = Some(match best {
                    None => candidate,
                    Some(current) => pick_better(current, candidate),
                });
            }
        }
    }

    best.map(|candidate| {
        Opportunity::new(
            input.symbol.clone(),
            input.base,
            input.quote,
            candidate.buy_venue,
            candidate.sell_venue,
            candidate.buy_vwap,
            candidate.sell_vwap,
            candidate.volume,
            candidate.buy_fee_pct,
            candidate.sell_fee_pct,
            candidate.gross_pct,
            candidate.net_pct,
            input.timestamp,
            input.is_sandbox,
        )
    })
}

fn pick_better(current: Candidate, challenger: Candidate) -> Candidate {
    if challenger.net_pct != current.net_pct {
        if challenger.net_pct > current.net_pct {
            return challenger;
        }
        return current;
    }
    if challenger.volume != current.volume {
        if challenger.volume > current.volume {
            return challenger;
        }
        return current;
    }
    let lex_current = (&current.buy_venue, &current.sell_venue);
    let lex_challenger = (&challenger.buy_venue, &challenger.sell_venue);
    if lex_challenger < lex_current {
        challenger
    } else {
        current
    }
}

fn evaluate_pair(
    input: &CalculatorInput<'_>,
    buy_venue: &VenueId,
    sell_venue: &VenueId,
) -> Option<Candidate> {
    let buy_book = input.books.get(buy_venue)?;
    let sell_book = input.books.get(sell_venue)?;
    if buy_book.asks().is_empty() || sell_book.bids().is_empty() {
        return None;
    }

    let (precap_buy_vwap, _precap_sell_vwap, precap_volume) =
        walk_books(buy_book.asks(), sell_book.bids(), None)?;

    let volume = match input.balances {
        None => precap_volume,
        Some(balances) => {
            let buy_cap = balances
                .get(buy_venue)
                .and_then(|v| v.get(input.quote))
                .map(|balance| balance.free * input.safe_balance_multiplier / precap_buy_vwap)
                .unwrap_or(Decimal::ZERO);
            let sell_cap = balances
                .get(sell_venue)
                .and_then(|v| v.get(input.base))
                .map(|balance| balance.free * input.safe_balance_multiplier)
                .unwrap_or(Decimal::ZERO);
            buy_cap.min(sell_cap).min(precap_volume)
        }
    };

    if volume <= Decimal::ZERO || volume < DUST_FLOOR {
        return None;
    }

    let (buy_vwap, sell_vwap, final_volume) = if input.balances.is_some() {
        walk_books(buy_book.asks(), sell_book.bids(), Some(volume))?
    } else {
        (precap_buy_vwap, _precap_sell_vwap, precap_volume)
    };

    let gross_pct = round12((sell_vwap - buy_vwap) / buy_vwap * Decimal::ONE_HUNDRED);

    let buy_fee_rate = input
        .fees
        .get(buy_venue)
        .map(|schedule| schedule.rate(input.use_taker_fees))
        .unwrap_or(Decimal::ZERO);
    let sell_fee_rate = input
        .fees
        .get(sell_venue)
        .map(|schedule| schedule.rate(input.use_taker_fees))
        .unwrap_or(Decimal::ZERO);
    let buy_fee_pct = buy_fee_rate * Decimal::ONE_HUNDRED;
    let sell_fee_pct = sell_fee_rate * Decimal::ONE_HUNDRED;

    let net_pct = gross_pct - buy_fee_pct - sell_fee_pct;

    Some(Candidate {
        buy_venue: buy_venue.clone(),
        sell_venue: sell_venue.clone(),
        buy_vwap,
        sell_vwap,
        volume: final_volume,
        buy_fee_pct,
        sell_fee_pct,
        gross_pct,
        net_pct,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use spotarb_core::PriceLevel;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    fn book(bids: Vec<(Decimal, Decimal)>, asks: Vec<(Decimal, Decimal)>) -> OrderBook {
        OrderBook::try_new(
            bids.into_iter().map(|(p, q)| PriceLevel::new(p, q)).collect(),
            asks.into_iter().map(|(p, q)| PriceLevel::new(p, q)).collect(),
            at(),
        )
        .unwrap()
    }

    fn fees(rate: Decimal) -> FeeSchedule {
        FeeSchedule::new(rate, rate, at())
    }

    #[test]
    fn scenario_1_basic_cross_venue_profit() {
        let mut books = HashMap::new();
        books.insert(
            VenueId::new("A"),
            book(vec![(dec!(49000), dec!(1))], vec![(dec!(49500), dec!(1))]),
        );
        books.insert(
            VenueId::new("B"),
            book(vec![(dec!(51000), dec!(1))], vec![(dec!(51500), dec!(1))]),
        );
        let mut schedule = HashMap::new();
        schedule.insert(VenueId::new("A"), fees(dec!(0.001)));
        schedule.insert(VenueId::new("B"), fees(dec!(0.001)));

        let input = CalculatorInput {
            symbol: &Symbol::new("BTCUSD"),
            base: "BTC",
            quote: "USD",
            books: &books,
            fees: &schedule,
            use_taker_fees: true,
            threshold_pct: dec!(0.1),
            balances: None,
            safe_balance_multiplier: dec!(0.3),
            is_sandbox: true,
            timestamp: at(),
        };

        let opportunity = compute(&input).unwrap();
        assert_eq!(opportunity.buy_venue, VenueId::new("A"));
        assert_eq!(opportunity.sell_venue, VenueId::new("B"));
        assert_eq!(opportunity.buy_price, dec!(49500));
        assert_eq!(opportunity.sell_price, dec!(51000));
        assert_eq!(opportunity.volume, dec!(1));
        assert!((opportunity.gross_pct - dec!(3.030303030303)).abs() < dec!(0.00001));
        assert!((opportunity.net_pct - dec!(2.830303030303)).abs() < dec!(0.00001));
    }

    #[test]
    fn scenario_2_book_walking_vwap() {
        let mut books = HashMap::new();
        books.insert(
            VenueId::new("A"),
            book(vec![], vec![(dec!(50000), dec!(0.5)), (dec!(51000), dec!(0.5))]),
        );
        books.insert(VenueId::new("B"), book(vec![(dec!(52000), dec!(1.0))], vec![]));
        let schedule = HashMap::new();

        let input = CalculatorInput {
            symbol: &Symbol::new("BTCUSD"),
            base: "BTC",
            quote: "USD",
            books: &books,
            fees: &schedule,
            use_taker_fees: true,
            threshold_pct: dec!(0.0),
            balances: None,
            safe_balance_multiplier: dec!(1.0),
            is_sandbox: true,
            timestamp: at(),
        };

        let opportunity = compute(&input).unwrap();
        assert_eq!(opportunity.buy_price, dec!(50500));
        assert_eq!(opportunity.sell_price, dec!(52000));
        assert_eq!(opportunity.volume, dec!(1.0));
    }

    #[test]
    fn scenario_3_liquidity_cap() {
        let mut books = HashMap::new();
        books.insert(VenueId::new("A"), book(vec![], vec![(dec!(50000), dec!(0.1))]));
        books.insert(VenueId::new("B"), book(vec![(dec!(52000), dec!(1.0))], vec![]));
        let schedule = HashMap::new();

        let input = CalculatorInput {
            symbol: &Symbol::new("BTCUSD"),
            base: "BTC",
            quote: "USD",
            books: &books,
            fees: &schedule,
            use_taker_fees: true,
            threshold_pct: dec!(0.0),
            balances: None,
            safe_balance_multiplier: dec!(1.0),
            is_sandbox: true,
            timestamp: at(),
        };

        let opportunity = compute(&input).unwrap();
        assert_eq!(opportunity.volume, dec!(0.1));
    }

    #[test]
    fn scenario_4_balance_cap() {
        let mut books = HashMap::new();
        books.insert(VenueId::new("A"), book(vec![], vec![(dec!(50000), dec!(10))]));
        books.insert(VenueId::new("B"), book(vec![(dec!(52000), dec!(10))], vec![]));
        let schedule = HashMap::new();

        let mut balances = HashMap::new();
        let mut venue_a_balances: VenueBalances = HashMap::new();
        venue_a_balances.insert("USD".to_string(), Balance::new("USD", dec!(10000), dec!(0)));
        balances.insert(VenueId::new("A"), venue_a_balances);
        let mut venue_b_balances: VenueBalances = HashMap::new();
        venue_b_balances.insert("BTC".to_string(), Balance::new("BTC", dec!(100), dec!(0)));
        balances.insert(VenueId::new("B"), venue_b_balances);

        let input = CalculatorInput {
            symbol: &Symbol::new("BTCUSD"),
            base: "BTC",
            quote: "USD",
            books: &books,
            fees: &schedule,
            use_taker_fees: true,
            threshold_pct: dec!(0.0),
            balances: Some(&balances),
            safe_balance_multiplier: dec!(0.1),
            is_sandbox: true,
            timestamp: at(),
        };

        let opportunity = compute(&input).unwrap();
        assert_eq!(opportunity.volume, dec!(0.02));
    }

    #[test]
    fn scenario_5_pair_threshold_overrides_global_excludes_below_floor_candidates() {
        // Global min 0.1%, pair min 0.5%, computed net 0.4% -> no signal for the
        // trade-signal stream. The calculator itself only enforces the absolute
        // floor (0.01%); the caller applies the resolved 0.5% threshold.
        let mut books = HashMap::new();
        books.insert(VenueId::new("A"), book(vec![], vec![(dec!(100), dec!(1))]));
        books.insert(VenueId::new("B"), book(vec![(dec!(100.4), dec!(1))], vec![]));
        let schedule = HashMap::new();

        let input = CalculatorInput {
            symbol: &Symbol::new("BTCUSD"),
            base: "BTC",
            quote: "USD",
            books: &books,
            fees: &schedule,
            use_taker_fees: true,
            threshold_pct: dec!(0.5),
            balances: None,
            safe_balance_multiplier: dec!(1.0),
            is_sandbox: true,
            timestamp: at(),
        };

        let opportunity = compute(&input).unwrap();
        assert!((opportunity.net_pct - dec!(0.4)).abs() < dec!(0.0001));
        assert!(opportunity.net_pct < input.threshold_pct);
    }

    #[test]
    fn single_venue_yields_no_opportunity() {
        let mut books = HashMap::new();
        books.insert(VenueId::new("A"), book(vec![(dec!(100), dec!(1))], vec![(dec!(101), dec!(1))]));
        let schedule = HashMap::new();
        let input = CalculatorInput {
            symbol: &Symbol::new("BTCUSD"),
            base: "BTC",
            quote: "USD",
            books: &books,
            fees: &schedule,
            use_taker_fees: true,
            threshold_pct: dec!(0.0),
            balances: None,
            safe_balance_multiplier: dec!(1.0),
            is_sandbox: true,
            timestamp: at(),
        };
        assert!(compute(&input).is_none());
    }

    #[test]
    fn zero_safe_balance_multiplier_yields_no_executable_opportunity() {
        let mut books = HashMap::new();
        books.insert(VenueId::new("A"), book(vec![], vec![(dec!(100), dec!(1))]));
        books.insert(VenueId::new("B"), book(vec![(dec!(110), dec!(1))], vec![]));
        let schedule = HashMap::new();

        let mut balances = HashMap::new();
        let mut venue_a: VenueBalances = HashMap::new();
        venue_a.insert("USD".to_string(), Balance::new("USD", dec!(10000), dec!(0)));
        balances.insert(VenueId::new("A"), venue_a);
        let mut venue_b: VenueBalances = HashMap::new();
        venue_b.insert("BTC".to_string(), Balance::new("BTC", dec!(10), dec!(0)));
        balances.insert(VenueId::new("B"), venue_b);

        let input = CalculatorInput {
            symbol: &Symbol::new("BTCUSD"),
            base: "BTC",
            quote: "USD",
            books: &books,
            fees: &schedule,
            use_taker_fees: true,
            threshold_pct: dec!(0.0),
            balances: Some(&balances),
            safe_balance_multiplier: dec!(0),
            is_sandbox: true,
            timestamp: at(),
        };

        assert!(compute(&input).is_none());
    }

    #[test]
    fn deterministic_across_repeated_calls() {
        let mut books = HashMap::new();
        books.insert(VenueId::new("A"), book(vec![(dec!(49000), dec!(1))], vec![(dec!(49500), dec!(1))]));
        books.insert(VenueId::new("B"), book(vec![(dec!(51000), dec!(1))], vec![(dec!(51500), dec!(1))]));
        let mut schedule = HashMap::new();
        schedule.insert(VenueId::new("A"), fees(dec!(0.001)));
        schedule.insert(VenueId::new("B"), fees(dec!(0.001)));

        let input = CalculatorInput {
            symbol: &Symbol::new("BTCUSD"),
            base: "BTC",
            quote: "USD",
            books: &books,
            fees: &schedule,
            use_taker_fees: true,
            threshold_pct: dec!(0.1),
            balances: None,
            safe_balance_multiplier: dec!(0.3),
            is_sandbox: true,
            timestamp: at(),
        };

        let first = compute(&input).unwrap();
        let second = compute(&input).unwrap();
        assert_eq!(first.buy_price, second.buy_price);
        assert_eq!(first.sell_price, second.sell_price);
        assert_eq!(first.net_pct, second.net_pct);
    }
}
