use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExecutionMode {
    Sequential,
    Concurrent,
}

/// The operator-mutable trading configuration (component C3's payload). Values here
/// are replaced wholesale on every mutation (see `spotarb-settings::SettingsStore`) —
/// nothing in this struct is mutated in place, so a `&AppSettings` snapshot a caller
/// already holds never changes out from under it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    pub auto_trade_enabled: bool,
    pub safety_kill_switch_active: bool,
    pub safety_kill_switch_reason: String,
    pub auto_rebalance_enabled: bool,
    pub global_min_profit_pct: Decimal,
    pub pair_min_profit_pct: HashMap<String, Decimal>,
    pub use_taker_fees: bool,
    pub safe_balance_multiplier: Decimal,
    pub execution_mode: ExecutionMode,
    pub smart_strategy_enabled: bool,
    pub max_drawdown_quote: Decimal,
    pub max_consecutive_losses: u32,
    pub min_rebalance_skew_threshold: Decimal,
    pub wallet_overrides: HashMap<String, HashMap<String, String>>,
    pub sandbox_mode: bool,
}

impl AppSettings {
    /// The sanity floor below which no opportunity is ever accepted, even for
    /// passive-rebalance purposes.
    pub const ABSOLUTE_FLOOR_PCT: Decimal = dec!(0.01);

    /// Default fee/rebalance viability ceiling used by `RebalanceProposal`.
    pub const VIABILITY_CEILING_PCT: Decimal = dec!(1.0);

    /// The threshold in effect for `symbol`: the per-pair override if present,
    /// otherwise the global threshold.
    pub fn effective_threshold(&self, symbol: &str) -> Decimal {
        self.pair_min_profit_pct
            .get(symbol)
            .copied()
            .unwrap_or(self.global_min_profit_pct)
    }
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            auto_trade_enabled: false,
            safety_kill_switch_active: false,
            safety_kill_switch_reason: String::new(),
            auto_rebalance_enabled: false,
            global_min_profit_pct: dec!(0.5),
            pair_min_profit_pct: HashMap::new(),
            use_taker_fees: true,
            safe_balance_multiplier: dec!(0.3),
            execution_mode: ExecutionMode::Sequential,
            smart_strategy_enabled: false,
            max_drawdown_quote: dec!(500),
            max_consecutive_losses: 5,
            min_rebalance_skew_threshold: dec!(0.1),
            wallet_overrides: HashMap::new(),
            sandbox_mode: true,
        }
    }
}
