//! Recomputes per-symbol minimum-profit thresholds from rolling spread
//! statistics when enabled, restoring whatever threshold was in place before
//! when disabled (component C11, optional).
//!
//! The out-of-scope statistics subsystem is modeled as a small injectable
//! [`RollingStatsSource`] trait rather than a global, matching how the rest of
//! this crate family injects `Clock`/`RandomSource` instead of reaching for
//! `Utc::now()` directly.

use chrono::{DateTime, Timelike, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use spotarb_channels::{ChannelHub, StrategyUpdate};
use spotarb_core::{Clock, Symbol};
use spotarb_settings::SettingsStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Historical average bid/ask spread, as a percent of notional, for a symbol
/// during a given hour of day (0-23). Returns `None` when no data is available
/// yet for that symbol/hour pair.
pub trait RollingStatsSource: Send + Sync {
    fn hourly_average_spread_pct(&self, symbol: &Symbol, hour_of_day: u32) -> Option<Decimal>;
}

/// A fixed-table stats source for tests: looks up `(symbol, hour)` in a map and
/// otherwise returns `None`.
pub struct FixedRollingStatsSource {
    table: HashMap<(Symbol, u32), Decimal>,
}

impl FixedRollingStatsSource {
    pub fn new() -> Self {
        Self { table: HashMap::new() }
    }

    pub fn with(mut self, symbol: Symbol, hour_of_day: u32, average_spread_pct: Decimal) -> Self {
        self.table.insert((symbol, hour_of_day), average_spread_pct);
        self
    }
}

impl Default for FixedRollingStatsSource {
    fn default() -> Self {
        Self::new()
    }
}

impl RollingStatsSource for FixedRollingStatsSource {
    fn hourly_average_spread_pct(&self, symbol: &Symbol, hour_of_day: u32) -> Option<Decimal> {
        self.table.get(&(symbol.clone(), hour_of_day)).copied()
    }
}

/// Reports no data for every symbol/hour. Wired in as the production default in
/// the absence of a real stats backend: with this source, `SmartStrategy` never
/// overrides a threshold even when `smartStrategyEnabled` is set.
pub struct NoopRollingStatsSource;

impl RollingStatsSource for NoopRollingStatsSource {
    fn hourly_average_spread_pct(&self, _symbol: &Symbol, _hour_of_day: u32) -> Option<Decimal> {
        None
    }
}

/// Recomputes `pairMinProfitPct[symbol]` for every tracked symbol while
/// `smartStrategyEnabled` is set, and restores whatever value (or absence of
/// one) preceded its own first override once disabled.
pub struct SmartStrategy {
    settings: Arc<SettingsStore>,
    channels: Arc<ChannelHub>,
    stats: Arc<dyn RollingStatsSource>,
    clock: Arc<dyn Clock>,
    factor: Decimal,
    symbols: Vec<Symbol>,
    poll_interval: std::time::Duration,
    manual_snapshot: parking_lot::Mutex<HashMap<Symbol, Option<Decimal>>>,
}

impl SmartStrategy {
    pub fn new(
        settings: Arc<SettingsStore>,
        channels: Arc<ChannelHub>,
        stats: Arc<dyn RollingStatsSource>,
        clock: Arc<dyn Clock>,
        symbols: Vec<Symbol>,
    ) -> Self {
        Self {
            settings,
            channels,
            stats,
            clock,
            factor: Decimal::new(15, 1), // 1.5x the rolling average spread
            symbols,
            poll_interval: std::time::Duration::from_secs(60),
            manual_snapshot: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    pub fn with_factor(mut self, factor: Decimal) -> Self {
        self.factor = factor;
        self
    }

    pub fn with_poll_interval(mut self, interval: std::time::Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// One recompute pass: applies a new threshold per tracked symbol while
    /// enabled, or restores prior thresholds once disabled.
    pub fn recompute_once(&self, now: DateTime<Utc>) {
        let settings = self.settings.snapshot();
        if !settings.smart_strategy_enabled {
            self.restore_manual_thresholds();
            return;
        }

        let hour = now.hour();
        for symbol in &self.symbols {
            let Some(average_spread_pct) = self.stats.hourly_average_spread_pct(symbol, hour) else {
                continue;
            };
            let threshold = (average_spread_pct * self.factor)
                .round_dp_with_strategy(12, RoundingStrategy::MidpointNearestEven);
            self.apply_threshold(symbol, threshold);
        }
    }

    fn apply_threshold(&self, symbol: &Symbol, threshold: Decimal) {
        {
            let mut snapshot = self.manual_snapshot.lock();
            snapshot.entry(symbol.clone()).or_insert_with(|| {
                self.settings
                    .snapshot()
                    .pair_min_profit_pct
                    .get(symbol.as_str())
                    .copied()
            });
        }
        let result = self.settings.mutate(|settings| {
            settings
                .pair_min_profit_pct
                .insert(symbol.as_str().to_string(), threshold);
        });
        if result.is_err() {
            tracing::error!(%symbol, "failed to persist recomputed threshold");
            return;
        }
        let _ = self.channels.strategy_updates_sender().send(StrategyUpdate {
            symbol: symbol.clone(),
            threshold_pct: threshold,
            reason: "smart strategy recompute".to_string(),
        });
    }

    fn restore_manual_thresholds(&self) {
        let restores: Vec<(Symbol, Option<Decimal>)> = self.manual_snapshot.lock().drain().collect();
        for (symbol, prior) in restores {
            let result = self.settings.mutate(|settings| match prior {
                Some(value) => {
                    settings.pair_min_profit_pct.insert(symbol.as_str().to_string(), value);
                }
                None => {
                    settings.pair_min_profit_pct.remove(symbol.as_str());
                }
            });
            if result.is_err() {
                tracing::error!(%symbol, "failed to restore manual threshold");
                continue;
            }
            let restored = self.settings.snapshot().effective_threshold(symbol.as_str());
            let _ = self.channels.strategy_updates_sender().send(StrategyUpdate {
                symbol,
                threshold_pct: restored,
                reason: "smart strategy disabled".to_string(),
            });
        }
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Drives the recompute loop on a fixed timer until `shutdown` fires.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.recompute_once(self.now());
                }
            }
        }
    }
}
