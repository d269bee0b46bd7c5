//! Risk-gates trade signals before handing them to the executor (component C6).
//! Gates run in a fixed order and the first failure discards the signal; only a
//! signal that survives every gate reaches [`spotarb_execution::Executor`].

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use spotarb_book::BookRegistry;
use spotarb_channels::ChannelHub;
use spotarb_core::{AppSettings, Clock, Opportunity, Symbol, Transaction};
use spotarb_execution::Executor;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    KillSwitch,
    AutoTradeDisabled,
    BelowThreshold,
    Slippage,
    MissingFreshBook,
}

#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    Discarded(DiscardReason),
    Executed(Transaction),
}

/// Per-symbol state for the `run()` signal driver: either a dispatch task is
/// already in flight for this symbol with nothing else waiting, or one is in
/// flight and a newer signal has since arrived to replace whatever was pending.
enum Slot {
    Running,
    Pending(Opportunity),
}

/// Applies the risk gate chain to trade signals, one symbol at a time. Two entry
/// points share the same gate chain: [`TradeDispatcher::handle_signal`] (every
/// gate) and [`TradeDispatcher::execute_one_shot`] (skips only the threshold
/// re-check, for an operator-forced execution).
pub struct TradeDispatcher {
    settings: watch::Receiver<AppSettings>,
    books: Arc<BookRegistry>,
    executor: Arc<Executor>,
    channels: Arc<ChannelHub>,
    clock: Arc<dyn Clock>,
    symbol_locks: parking_lot::Mutex<HashMap<Symbol, Arc<AsyncMutex<()>>>>,
    run_slots: parking_lot::Mutex<HashMap<Symbol, Slot>>,
}

impl TradeDispatcher {
    pub fn new(
        settings: watch::Receiver<AppSettings>,
        books: Arc<BookRegistry>,
        executor: Arc<Executor>,
        channels: Arc<ChannelHub>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            settings,
            books,
            executor,
            channels,
            clock,
            symbol_locks: parking_lot::Mutex::new(HashMap::new()),
            run_slots: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    /// Runs the full gate chain (1 through 5) for a signal read off the trade-signal
    /// stream.
    pub async fn handle_signal(&self, opportunity: Opportunity) -> DispatchOutcome {
        self.dispatch(opportunity, false).await
    }

    /// Runs every gate except the threshold re-check (gate 3), for an
    /// operator-forced one-shot execution.
    pub async fn execute_one_shot(&self, opportunity: Opportunity) -> DispatchOutcome {
        self.dispatch(opportunity, true).await
    }

    async fn dispatch(&self, opportunity: Opportunity, skip_threshold_gate: bool) -> DispatchOutcome {
        let settings = self.settings.borrow().clone();

        if settings.safety_kill_switch_active {
            return DispatchOutcome::Discarded(DiscardReason::KillSwitch);
        }
        if !settings.auto_trade_enabled {
            return DispatchOutcome::Discarded(DiscardReason::AutoTradeDisabled);
        }
        if !skip_threshold_gate {
            let threshold = settings.effective_threshold(opportunity.symbol.as_str());
            if opportunity.net_pct < threshold {
                return DispatchOutcome::Discarded(DiscardReason::BelowThreshold);
            }
        }

        let lock = self.symbol_lock(&opportunity.symbol);
        let _guard = lock.lock().await;

        let now = self.clock.now();
        let Some(fresh) = self.recompute_at_current_prices(&opportunity, now) else {
            return DispatchOutcome::Discarded(DiscardReason::MissingFreshBook);
        };
        let threshold = settings.effective_threshold(fresh.symbol.as_str());
        if fresh.net_pct < threshold {
            return DispatchOutcome::Discarded(DiscardReason::Slippage);
        }

        let transaction = self.executor.execute(&fresh, settings.execution_mode).await;
        let _ = self.channels.execution_results_sender().send(transaction.clone());
        DispatchOutcome::Executed(transaction)
    }

    /// Passive-rebalance arbitrage (component C8) calls this directly: it already
    /// decided the signal is worth taking, and bypasses the global threshold the
    /// same way a forced one-shot execution does, while still running every other
    /// gate.
    pub async fn dispatch_bypassing_threshold(&self, opportunity: Opportunity) -> DispatchOutcome {
        self.dispatch(opportunity, true).await
    }

    fn symbol_lock(&self, symbol: &Symbol) -> Arc<AsyncMutex<()>> {
        self.symbol_locks
            .lock()
            .entry(symbol.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Re-derives `buyPrice`/`sellPrice` from the current top-of-book on each
    /// venue, keeping the signalled volume and fee percentages fixed. Returns
    /// `None` if either venue's book is missing or stale, which is treated the same
    /// as a failed slippage check rather than a separate error path.
    fn recompute_at_current_prices(&self, opportunity: &Opportunity, now: DateTime<Utc>) -> Option<Opportunity> {
        let buy_book = self.books.get(&opportunity.buy_venue, &opportunity.symbol, now)?;
        let sell_book = self.books.get(&opportunity.sell_venue, &opportunity.symbol, now)?;
        let buy_price = buy_book.best_ask()?.price;
        let sell_price = sell_book.best_bid()?.price;

        let gross_pct = ((sell_price - buy_price) / buy_price * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(12, RoundingStrategy::MidpointNearestEven);
        let net_pct = gross_pct - opportunity.buy_fee - opportunity.sell_fee;

        Some(Opportunity {
            buy_price,
            sell_price,
            gross_pct,
            net_pct,
            timestamp: now,
            ..opportunity.clone()
        })
    }

    /// Drives the dispatcher from the trade-signal stream until `shutdown` fires.
    /// A symbol with a dispatch already in flight never queues a second waiter:
    /// [`Self::offer`] replaces whatever signal was pending for that symbol, so
    /// only the newest one is ever handled once the in-flight one completes —
    /// coalescing at this layer mirrors what `CoalescingSignalChannel` already
    /// does at the channel layer, instead of letting the per-symbol lock serve
    /// superseded signals in FIFO order.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let mut tasks = tokio::task::JoinSet::new();
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                (symbol, opportunity) = self.channels.trade_signals.recv() => {
                    self.offer(&mut tasks, symbol, opportunity);
                }
            }
        }
        while tasks.join_next().await.is_some() {}
    }

    /// Starts a new drain task for `symbol` if none is running, otherwise
    /// replaces the pending signal that task will pick up next.
    fn offer(self: &Arc<Self>, tasks: &mut tokio::task::JoinSet<()>, symbol: Symbol, opportunity: Opportunity) {
        let mut slots = self.run_slots.lock();
        match slots.get_mut(&symbol) {
            Some(slot) => *slot = Slot::Pending(opportunity),
            None => {
                slots.insert(symbol.clone(), Slot::Running);
                drop(slots);
                let dispatcher = self.clone();
                tasks.spawn(async move { dispatcher.drain_symbol(symbol, opportunity).await });
            }
        }
    }

    /// Runs the gate chain for `opportunity`, then checks whether a newer signal
    /// replaced it while it ran; if so, runs that one too, looping until the
    /// symbol has no pending replacement left.
    async fn drain_symbol(self: Arc<Self>, symbol: Symbol, mut opportunity: Opportunity) {
        loop {
            let outcome = self.handle_signal(opportunity).await;
            if let DispatchOutcome::Discarded(reason) = outcome {
                tracing::debug!(%symbol, ?reason, "trade signal discarded");
            }
            let mut slots = self.run_slots.lock();
            match slots.remove(&symbol) {
                Some(Slot::Pending(next)) => {
                    slots.insert(symbol.clone(), Slot::Running);
                    drop(slots);
                    opportunity = next;
                }
                _ => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use spotarb_core::{FeeSchedule, OrderBook, PriceLevel, SystemClock, VenueId};
    use spotarb_venue::{FakeVenueAdapter, OrderResponse, VenueAdapter};
    use std::collections::HashMap as StdHashMap;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    fn opportunity() -> Opportunity {
        Opportunity::new(
            Symbol::new("BTCUSD"),
            "BTC",
            "USD",
            VenueId::new("A"),
            VenueId::new("B"),
            dec!(49500),
            dec!(51000),
            dec!(1),
            dec!(0.1),
            dec!(0.1),
            dec!(3.0),
            dec!(2.8),
            at(),
            true,
        )
    }

    fn setup(auto_trade: bool, kill_switch: bool) -> (Arc<TradeDispatcher>, watch::Sender<AppSettings>) {
        let books = Arc::new(BookRegistry::with_default_staleness());
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

        let buy = FakeVenueAdapter::new("A", FeeSchedule::new(dec!(0.001), dec!(0.001), at()));
        buy.push_order_response(Ok(OrderResponse::filled("buy-1", dec!(1), dec!(49500))));
        let sell = FakeVenueAdapter::new("B", FeeSchedule::new(dec!(0.001), dec!(0.001), at()));
        sell.push_order_response(Ok(OrderResponse::filled("sell-1", dec!(1), dec!(51000))));

        let mut venues: StdHashMap<VenueId, Arc<dyn VenueAdapter>> = StdHashMap::new();
        venues.insert(VenueId::new("A"), Arc::new(buy));
        venues.insert(VenueId::new("B"), Arc::new(sell));

        let executor = Arc::new(Executor::new(venues, Arc::new(SystemClock)));
        let channels = Arc::new(ChannelHub::new(spotarb_channels::StrategyUpdate {
            symbol: Symbol::new("BTCUSD"),
            threshold_pct: dec!(0.1),
            reason: "startup".into(),
        }));

        let mut settings = AppSettings::default();
        settings.auto_trade_enabled = auto_trade;
        settings.safety_kill_switch_active = kill_switch;
        settings.global_min_profit_pct = dec!(0.1);
        let (tx, rx) = watch::channel(settings);

        (Arc::new(TradeDispatcher::new(rx, books, executor, channels, Arc::new(SystemClock))), tx)
    }

    #[tokio::test]
    async fn kill_switch_discards_before_any_other_gate() {
        let (dispatcher, _tx) = setup(true, true);
        let outcome = dispatcher.handle_signal(opportunity()).await;
        assert!(matches!(outcome, DispatchOutcome::Discarded(DiscardReason::KillSwitch)));
    }

    #[tokio::test]
    async fn auto_trade_disabled_discards() {
        let (dispatcher, _tx) = setup(false, false);
        let outcome = dispatcher.handle_signal(opportunity()).await;
        assert!(matches!(outcome, DispatchOutcome::Discarded(DiscardReason::AutoTradeDisabled)));
    }

    #[tokio::test]
    async fn surviving_signal_executes_and_publishes_to_execution_results() {
        let (dispatcher, _tx) = setup(true, false);
        let channels = dispatcher.channels.clone();
        let mut results = channels.take_execution_results_receiver();

        let outcome = dispatcher.handle_signal(opportunity()).await;
        assert!(matches!(outcome, DispatchOutcome::Executed(_)));

        let published = results.try_recv().unwrap();
        assert_eq!(published.status, spotarb_core::TransactionStatus::Success);
    }

    #[tokio::test]
    async fn slippage_below_threshold_discards_with_slippage_reason() {
        let (dispatcher, _tx) = setup(true, false);
        // Move the sell side's best bid down so the recomputed net is below floor.
        dispatcher.books.update(
            VenueId::new("B"),
            Symbol::new("BTCUSD"),
            OrderBook::try_new(vec![PriceLevel::new(dec!(49510), dec!(1))], vec![PriceLevel::new(dec!(49520), dec!(1))], at()).unwrap(),
        );
        let outcome = dispatcher.handle_signal(opportunity()).await;
        assert!(matches!(outcome, DispatchOutcome::Discarded(DiscardReason::Slippage)));
    }

    #[tokio::test]
    async fn one_shot_execution_skips_threshold_gate_but_not_others() {
        let (dispatcher, _tx) = setup(true, false);
        let mut low_threshold_opp = opportunity();
        low_threshold_opp.net_pct = dec!(0.0001);
        let outcome = dispatcher.execute_one_shot(low_threshold_opp).await;
        assert!(matches!(outcome, DispatchOutcome::Executed(_)));
    }

    #[tokio::test]
    async fn one_shot_execution_still_respects_kill_switch() {
        let (dispatcher, _tx) = setup(true, true);
        let outcome = dispatcher.execute_one_shot(opportunity()).await;
        assert!(matches!(outcome, DispatchOutcome::Discarded(DiscardReason::KillSwitch)));
    }
}
