//! Recomputes cross-venue opportunities on every book update and emits them onto
//! the trade-signal and passive-rebalance-signal streams (component C5). Thin async
//! driver over a synchronous, directly-testable evaluator: [`DetectionService::evaluate_symbol`]
//! touches no I/O and needs no running task to exercise.

use chrono::{DateTime, Utc};
use spotarb_book::BookRegistry;
use spotarb_calculator::{CalculatorInput, VenueBalances};
use spotarb_channels::ChannelHub;
use spotarb_core::{AppSettings, Opportunity, Symbol, VenueId};
use spotarb_venue::VenueAdapter;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

/// Base/quote asset names for a symbol. The calculator and the `Opportunity`
/// record need these as plain strings; nothing in the book/venue layer parses a
/// symbol string into its components, so this is supplied once at construction.
pub type SymbolUniverse = HashMap<Symbol, (String, String)>;

pub struct DetectionService {
    books: Arc<BookRegistry>,
    venues: HashMap<VenueId, Arc<dyn VenueAdapter>>,
    universe: SymbolUniverse,
    settings: watch::Receiver<AppSettings>,
    channels: Arc<ChannelHub>,
}

impl DetectionService {
    pub fn new(
        books: Arc<BookRegistry>,
        venues: HashMap<VenueId, Arc<dyn VenueAdapter>>,
        universe: SymbolUniverse,
        settings: watch::Receiver<AppSettings>,
        channels: Arc<ChannelHub>,
    ) -> Self {
        Self {
            books,
            venues,
            universe,
            settings,
            channels,
        }
    }

    /// Recomputes the best cross-venue opportunity for `symbol` from currently
    /// cached books, fees and balances. Returns `None` if fewer than two venues
    /// have a non-stale book for `symbol`, or no pair clears the absolute floor —
    /// both cases are silent, not errors.
    pub fn evaluate_symbol(&self, symbol: &Symbol, now: DateTime<Utc>) -> Option<Opportunity> {
        let (base, quote) = self.universe.get(symbol)?;
        let books = self.books.get_all_venues(symbol, now);
        if books.len() < 2 {
            return None;
        }

        let mut fees = HashMap::new();
        let mut balances: HashMap<VenueId, VenueBalances> = HashMap::new();
        for venue_id in books.keys() {
            if let Some(adapter) = self.venues.get(venue_id) {
                fees.insert(venue_id.clone(), adapter.cached_fees());
                let venue_balances: VenueBalances = adapter
                    .cached_balances()
                    .into_iter()
                    .map(|balance| (balance.asset.clone(), balance))
                    .collect();
                balances.insert(venue_id.clone(), venue_balances);
            }
        }

        let snapshot = self.settings.borrow().clone();
        let input = CalculatorInput {
            symbol,
            base,
            quote,
            books: &books,
            fees: &fees,
            use_taker_fees: snapshot.use_taker_fees,
            threshold_pct: snapshot.effective_threshold(symbol.as_str()),
            balances: Some(&balances),
            safe_balance_multiplier: snapshot.safe_balance_multiplier,
            is_sandbox: snapshot.sandbox_mode,
            timestamp: now,
        };
        spotarb_calculator::compute(&input)
    }

    /// Evaluates `symbol` and, if a candidate survives, emits it on the streams it
    /// qualifies for: the trade-signal stream if it clears the effective
    /// threshold, and always the passive-rebalance stream (the calculator already
    /// enforces the absolute floor internally, so any candidate returned here is
    /// already eligible for passive-rebalance consideration).
    pub fn handle_update(&self, symbol: &Symbol, now: DateTime<Utc>) {
        let Some(opportunity) = self.evaluate_symbol(symbol, now) else {
            return;
        };
        let threshold = self.settings.borrow().effective_threshold(symbol.as_str());
        if opportunity.net_pct >= threshold {
            self.channels
                .trade_signals
                .publish(symbol.clone(), opportunity.clone());
        }
        self.channels
            .passive_rebalance_signals
            .publish(symbol.clone(), opportunity);
    }

    /// Drives the service from a `BookRegistry` market-update subscription until the
    /// channel closes or `shutdown` fires. A lagged receiver (the registry dropped
    /// updates because this loop fell behind) is not fatal: the next update it does
    /// see still reflects the venue's current book, so detection simply resumes from
    /// there.
    pub async fn run(self: Arc<Self>, mut updates: broadcast::Receiver<Symbol>, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                received = updates.recv() => match received {
                    Ok(symbol) => self.handle_update(&symbol, Utc::now()),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "detection loop lagged behind market updates");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use spotarb_core::{FeeSchedule, OrderBook, PriceLevel};
    use spotarb_venue::FakeVenueAdapter;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    fn universe() -> SymbolUniverse {
        let mut universe = HashMap::new();
        universe.insert(Symbol::new("BTCUSD"), ("BTC".to_string(), "USD".to_string()));
        universe
    }

    fn setup() -> (Arc<BookRegistry>, HashMap<VenueId, Arc<dyn VenueAdapter>>, Arc<ChannelHub>) {
        let books = Arc::new(BookRegistry::with_default_staleness());
        let venue_a = Arc::new(FakeVenueAdapter::new("A", FeeSchedule::new(dec!(0.001), dec!(0.001), at())));
        let venue_b = Arc::new(FakeVenueAdapter::new("B", FeeSchedule::new(dec!(0.001), dec!(0.001), at())));

        books.update(
            VenueId::new("A"),
            Symbol::new("BTCUSD"),
            OrderBook::try_new(vec![PriceLevel::new(dec!(49000), dec!(1))], vec![PriceLevel::new(dec!(49500), dec!(1))], at()).unwrap(),
        );
        books.update(
            VenueId::new("B"),
            Symbol::new("BTCUSD"),
            OrderBook::try_new(vec![PriceLevel::new(dec!(51000), dec!(1))], vec![PriceLevel::new(dec!(51500), dec!(1))], at()).unwrap(),
        );

        let mut venues: HashMap<VenueId, Arc<dyn VenueAdapter>> = HashMap::new();
        venues.insert(VenueId::new("A"), venue_a);
        venues.insert(VenueId::new("B"), venue_b);

        let channels = Arc::new(ChannelHub::new(spotarb_channels::StrategyUpdate {
            symbol: Symbol::new("BTCUSD"),
            threshold_pct: dec!(0.1),
            reason: "startup".into(),
        }));

        (books, venues, channels)
    }

    #[test]
    fn evaluates_a_profitable_pair_from_cached_state() {
        let (books, venues, channels) = setup();
        let (_settings_tx, settings_rx) = watch::channel(AppSettings::default());
        let service = DetectionService::new(books, venues, universe(), settings_rx, channels);

        let opportunity = service.evaluate_symbol(&Symbol::new("BTCUSD"), at()).unwrap();
        assert_eq!(opportunity.buy_venue, VenueId::new("A"));
        assert_eq!(opportunity.sell_venue, VenueId::new("B"));
    }

    #[test]
    fn single_venue_yields_no_opportunity() {
        let books = Arc::new(BookRegistry::with_default_staleness());
        books.update(
            VenueId::new("A"),
            Symbol::new("BTCUSD"),
            OrderBook::try_new(vec![PriceLevel::new(dec!(100), dec!(1))], vec![PriceLevel::new(dec!(101), dec!(1))], at()).unwrap(),
        );
        let venue_a = Arc::new(FakeVenueAdapter::new("A", FeeSchedule::new(dec!(0), dec!(0), at())));
        let mut venues: HashMap<VenueId, Arc<dyn VenueAdapter>> = HashMap::new();
        venues.insert(VenueId::new("A"), venue_a);
        let channels = Arc::new(ChannelHub::new(spotarb_channels::StrategyUpdate {
            symbol: Symbol::new("BTCUSD"),
            threshold_pct: dec!(0.1),
            reason: "startup".into(),
        }));
        let (_tx, settings_rx) = watch::channel(AppSettings::default());
        let service = DetectionService::new(books, venues, universe(), settings_rx, channels);
        assert!(service.evaluate_symbol(&Symbol::new("BTCUSD"), at()).is_none());
    }

    #[test]
    fn below_threshold_still_publishes_to_passive_stream_only() {
        let (books, venues, channels) = setup();
        let mut settings = AppSettings::default();
        settings.global_min_profit_pct = dec!(10.0);
        let (_tx, settings_rx) = watch::channel(settings);
        let service = DetectionService::new(books, venues, universe(), settings_rx, channels.clone());

        service.handle_update(&Symbol::new("BTCUSD"), at());

        assert!(channels.trade_signals.is_empty());
        assert!(!channels.passive_rebalance_signals.is_empty());
    }

    #[test]
    fn above_threshold_publishes_to_both_streams() {
        let (books, venues, channels) = setup();
        let mut settings = AppSettings::default();
        settings.global_min_profit_pct = dec!(0.1);
        let (_tx, settings_rx) = watch::channel(settings);
        let service = DetectionService::new(books, venues, universe(), settings_rx, channels.clone());

        service.handle_update(&Symbol::new("BTCUSD"), at());

        assert!(!channels.trade_signals.is_empty());
        assert!(!channels.passive_rebalance_signals.is_empty());
    }

    #[test]
    fn unknown_symbol_is_skipped_silently() {
        let (books, venues, channels) = setup();
        let (_tx, settings_rx) = watch::channel(AppSettings::default());
        let service = DetectionService::new(books, venues, HashMap::new(), settings_rx, channels);
        assert!(service.evaluate_symbol(&Symbol::new("BTCUSD"), at()).is_none());
    }
}
