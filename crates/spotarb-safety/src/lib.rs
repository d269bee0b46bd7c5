//! Watches the stream of completed transactions for a losing streak or an
//! excessive drawdown and, on either, trips the global kill-switch that gates
//! [`spotarb_dispatch::TradeDispatcher`] (component C9).
//!
//! The monitor owns no retry or recovery logic of its own — it only flips
//! `AppSettings::safety_kill_switch_active` through [`SettingsStore::mutate`] and
//! publishes a [`SafetyEvent`] so other components (and an out-of-scope API layer)
//! can react.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;
use spotarb_channels::{ChannelHub, SafetyEvent};
use spotarb_core::{Clock, Transaction, TransactionStatus};
use spotarb_settings::SettingsStore;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

fn drawdown_window() -> ChronoDuration {
    ChronoDuration::hours(24)
}

/// The longest terminal run of loss-counting statuses ending at the most recent
/// transaction in `window` (`window` is assumed oldest-first).
fn consecutive_loss_streak(window: &VecDeque<Transaction>) -> u32 {
    let mut streak = 0;
    for tx in window.iter().rev() {
        if tx.status.is_loss() {
            streak += 1;
        } else {
            break;
        }
    }
    streak
}

/// Negated sum of `realized_profit` over transactions created within
/// `DRAWDOWN_WINDOW` of `now`; a positive value means a net loss.
fn drawdown_over_window(window: &VecDeque<Transaction>, now: DateTime<Utc>) -> Decimal {
    let cutoff = now - drawdown_window();
    let sum: Decimal = window
        .iter()
        .filter(|tx| tx.created_at >= cutoff)
        .map(|tx| tx.realized_profit)
        .sum();
    -sum
}

pub struct SafetyMonitor {
    store: Arc<SettingsStore>,
    channels: Arc<ChannelHub>,
    clock: Arc<dyn Clock>,
    poll_interval: std::time::Duration,
    window: parking_lot::Mutex<VecDeque<Transaction>>,
    prior_auto_trade_enabled: parking_lot::Mutex<Option<bool>>,
}

impl SafetyMonitor {
    pub fn new(store: Arc<SettingsStore>, channels: Arc<ChannelHub>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            channels,
            clock,
            poll_interval: std::time::Duration::from_secs(15),
            window: parking_lot::Mutex::new(VecDeque::new()),
            prior_auto_trade_enabled: parking_lot::Mutex::new(None),
        }
    }

    pub fn with_poll_interval(mut self, interval: std::time::Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Appends a completed transaction to the sliding window, pruning anything
    /// older than the drawdown window relative to `now`.
    pub fn record_transaction(&self, transaction: Transaction, now: DateTime<Utc>) {
        let cutoff = now - drawdown_window();
        let mut window = self.window.lock();
        window.push_back(transaction);
        while window.front().is_some_and(|tx| tx.created_at < cutoff) {
            window.pop_front();
        }
    }

    /// Runs the consecutive-loss and drawdown checks against the current window
    /// and settings, tripping the kill-switch on the first breach found. Returns
    /// the reason if it tripped.
    pub fn evaluate(&self, now: DateTime<Utc>) -> Option<String> {
        let settings = self.store.snapshot();
        if settings.safety_kill_switch_active {
            return None;
        }

        let window = self.window.lock().clone();
        let streak = consecutive_loss_streak(&window);
        if streak >= settings.max_consecutive_losses {
            let reason = format!("Consecutive failures: {streak} in a row");
            self.trip(&reason);
            return Some(reason);
        }

        let drawdown = drawdown_over_window(&window, now);
        if drawdown >= settings.max_drawdown_quote {
            let reason = format!("Max daily drawdown exceeded: -{drawdown}");
            self.trip(&reason);
            return Some(reason);
        }

        None
    }

    fn trip(&self, reason: &str) {
        let result = self.store.mutate(|settings| {
            let mut prior = self.prior_auto_trade_enabled.lock();
            if prior.is_none() {
                *prior = Some(settings.auto_trade_enabled);
            }
            settings.auto_trade_enabled = false;
            settings.safety_kill_switch_active = true;
            settings.safety_kill_switch_reason = reason.to_string();
        });
        if let Err(error) = result {
            tracing::error!(%error, "failed to persist kill-switch trip");
            return;
        }
        let _ = self
            .channels
            .safety_events_sender()
            .send(SafetyEvent::Tripped { reason: reason.to_string() });
        tracing::warn!(reason, "kill-switch tripped");
    }

    /// Manual reset: clears the kill-switch and reinstates whatever
    /// `autoTradeEnabled` was at the moment it tripped.
    pub fn reset(&self) {
        let restored_auto_trade = self.prior_auto_trade_enabled.lock().take().unwrap_or(false);
        let result = self.store.mutate(|settings| {
            settings.safety_kill_switch_active = false;
            settings.safety_kill_switch_reason.clear();
            settings.auto_trade_enabled = restored_auto_trade;
        });
        if let Err(error) = result {
            tracing::error!(%error, "failed to persist kill-switch reset");
            return;
        }
        let _ = self.channels.safety_events_sender().send(SafetyEvent::Reset);
        tracing::info!("kill-switch reset");
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Drives the monitor until `shutdown` fires or the stream closes: records
    /// every completed transaction as it arrives, and re-evaluates on a fixed
    /// timer.
    pub async fn run(
        self: Arc<Self>,
        mut execution_results: mpsc::UnboundedReceiver<Transaction>,
        shutdown: CancellationToken,
    ) {
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.evaluate(self.now());
                }
                maybe_tx = execution_results.recv() => {
                    match maybe_tx {
                        Some(transaction) => self.record_transaction(transaction, self.now()),
                        None => break,
                    }
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
    use spotarb_core::{Opportunity, Symbol, SystemClock, VenueId};

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, hour, 0, 0).unwrap()
    }

    fn fixture_opportunity() -> Opportunity {
        Opportunity::new(
            Symbol::new("BTCUSDT"),
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
            at(0),
            true,
        )
    }

    fn transaction(status: TransactionStatus, realized_profit: Decimal, created_at: DateTime<Utc>) -> Transaction {
        Transaction::new(fixture_opportunity(), created_at, status, realized_profit, "")
    }

    fn monitor(max_losses: u32, max_drawdown: Decimal) -> Arc<SafetyMonitor> {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SettingsStore::load_or_default(dir.path().join("settings.json")).unwrap());
        store
            .mutate(|settings| {
                settings.max_consecutive_losses = max_losses;
                settings.max_drawdown_quote = max_drawdown;
                settings.auto_trade_enabled = true;
            })
            .unwrap();
        let channels = Arc::new(ChannelHub::new(spotarb_channels::StrategyUpdate {
            symbol: Symbol::new("BTCUSDT"),
            threshold_pct: dec!(0.1),
            reason: "startup".into(),
        }));
        Arc::new(SafetyMonitor::new(store, channels, Arc::new(SystemClock)))
    }

    #[test]
    fn three_consecutive_failures_trip_with_max_losses_three() {
        let monitor = monitor(3, dec!(10_000));
        monitor.record_transaction(transaction(TransactionStatus::Failed, dec!(0), at(0)), at(0));
        monitor.record_transaction(transaction(TransactionStatus::Partial, dec!(0), at(0)), at(0));
        monitor.record_transaction(transaction(TransactionStatus::Failed, dec!(0), at(0)), at(0));

        let reason = monitor.evaluate(at(1)).unwrap();
        assert!(reason.contains("Consecutive failures"));
        assert!(monitor.store.snapshot().safety_kill_switch_active);
        assert!(!monitor.store.snapshot().auto_trade_enabled);
    }

    #[test]
    fn a_success_breaks_the_streak() {
        let monitor = monitor(3, dec!(10_000));
        monitor.record_transaction(transaction(TransactionStatus::Failed, dec!(0), at(0)), at(0));
        monitor.record_transaction(transaction(TransactionStatus::Failed, dec!(0), at(0)), at(0));
        monitor.record_transaction(transaction(TransactionStatus::Success, dec!(1), at(0)), at(0));

        assert!(monitor.evaluate(at(1)).is_none());
        assert!(!monitor.store.snapshot().safety_kill_switch_active);
    }

    #[test]
    fn drawdown_trips_on_two_losing_successes_within_24h() {
        let monitor = monitor(100, dec!(50));
        monitor.record_transaction(transaction(TransactionStatus::Success, dec!(-30), at(0)), at(0));
        monitor.record_transaction(transaction(TransactionStatus::Success, dec!(-30), at(1)), at(1));

        let reason = monitor.evaluate(at(2)).unwrap();
        assert!(reason.contains("Max daily drawdown"));
    }

    #[test]
    fn drawdown_ignores_transactions_older_than_24h() {
        let monitor = monitor(100, dec!(50));
        monitor.record_transaction(transaction(TransactionStatus::Success, dec!(-30), at(0)), at(0));
        // 30 hours later: the first transaction has aged out of the window.
        let later = Utc.with_ymd_and_hms(2026, 1, 2, 6, 0, 0).unwrap();
        monitor.record_transaction(transaction(TransactionStatus::Success, dec!(-30), later), later);

        assert!(monitor.evaluate(later).is_none());
    }

    #[test]
    fn manual_reset_restores_prior_auto_trade_enabled() {
        let monitor = monitor(1, dec!(10_000));
        monitor.record_transaction(transaction(TransactionStatus::Failed, dec!(0), at(0)), at(0));
        monitor.evaluate(at(1));
        assert!(monitor.store.snapshot().safety_kill_switch_active);

        monitor.reset();
        let settings = monitor.store.snapshot();
        assert!(!settings.safety_kill_switch_active);
        assert!(settings.safety_kill_switch_reason.is_empty());
        assert!(settings.auto_trade_enabled);
    }

    #[test]
    fn already_tripped_does_not_re_evaluate() {
        let monitor = monitor(1, dec!(10_000));
        monitor.record_transaction(transaction(TransactionStatus::Failed, dec!(0), at(0)), at(0));
        monitor.evaluate(at(1));
        monitor.store.mutate(|s| s.safety_kill_switch_reason = "first".into()).unwrap();

        assert!(monitor.evaluate(at(2)).is_none());
        assert_eq!(monitor.store.snapshot().safety_kill_switch_reason, "first");
    }
}
