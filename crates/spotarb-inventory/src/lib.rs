//! Tracks per-asset holdings skew across venues and proposes, then drives,
//! inter-venue transfers to correct it (component C8).
//!
//! Two independent jobs run out of the same [`InventoryController`]: a periodic
//! balance poll that recomputes deviations and emits `RebalanceProposal`s, and a
//! reader of the passive-rebalance signal stream that forwards any opportunity
//! which would *reduce* skew straight to [`spotarb_dispatch::TradeDispatcher`],
//! bypassing the global profit threshold the same way an operator-forced one-shot
//! execution does.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use spotarb_channels::ChannelHub;
use spotarb_core::{AppSettings, Clock, Opportunity, RebalanceProposal, VenueId};
use spotarb_dispatch::{DispatchOutcome, TradeDispatcher};
use spotarb_venue::VenueAdapter;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Out-of-scope trend service stand-in. A real implementation would call an
/// external analytics service; the only contract a caller needs is "a label, or
/// nothing if unavailable", with "Neutral" as the fallback.
pub trait TrendSource: Send + Sync {
    fn trend(&self, asset: &str) -> Option<String>;
}

/// Always reports no trend data, so every proposal falls back to "Neutral".
pub struct NeutralTrendSource;

impl TrendSource for NeutralTrendSource {
    fn trend(&self, _asset: &str) -> Option<String> {
        None
    }
}

/// Per-venue signed deviation of one asset's holdings from the mean across all
/// venues that hold it, normalized by the total held everywhere:
/// `(holding(asset, venue) - mean(asset)) / total(asset)`. Empty if fewer than
/// two venues report a nonzero balance for the asset, or if nothing is held
/// anywhere (division by zero avoided by returning nothing rather than `NaN`).
pub fn compute_deviations(
    holdings: &HashMap<VenueId, Decimal>,
) -> HashMap<VenueId, Decimal> {
    let total: Decimal = holdings.values().sum();
    if total <= Decimal::ZERO || holdings.len() < 2 {
        return HashMap::new();
    }
    let mean = total / Decimal::from(holdings.len() as u64);
    holdings
        .iter()
        .map(|(venue, amount)| (venue.clone(), (*amount - mean) / total))
        .collect()
}

/// The signed deviation of the venue whose deviation has the largest magnitude.
/// `RebalanceProposal` construction and the passive-rebalance check both read
/// per-venue deviations directly; this is a convenience for callers (e.g. a
/// status endpoint) that only want the single scalar summary.
pub fn skew(deviations: &HashMap<VenueId, Decimal>) -> Option<Decimal> {
    deviations
        .values()
        .copied()
        .max_by_key(|d| d.abs())
}

fn venue_holding(balances: &HashMap<VenueId, Vec<spotarb_core::Balance>>, venue: &VenueId, asset: &str) -> Decimal {
    balances
        .get(venue)
        .into_iter()
        .flatten()
        .find(|b| b.asset == asset)
        .map(|b| b.total())
        .unwrap_or(Decimal::ZERO)
}

pub struct InventoryController {
    venues: HashMap<VenueId, Arc<dyn VenueAdapter>>,
    assets: Vec<String>,
    settings: watch::Receiver<AppSettings>,
    channels: Arc<ChannelHub>,
    dispatcher: Arc<TradeDispatcher>,
    clock: Arc<dyn Clock>,
    trend_source: Arc<dyn TrendSource>,
    poll_interval: std::time::Duration,
    latest_deviations: parking_lot::RwLock<HashMap<String, HashMap<VenueId, Decimal>>>,
    latest_proposals: parking_lot::RwLock<Vec<RebalanceProposal>>,
}

impl InventoryController {
    pub fn new(
        venues: HashMap<VenueId, Arc<dyn VenueAdapter>>,
        assets: Vec<String>,
        settings: watch::Receiver<AppSettings>,
        channels: Arc<ChannelHub>,
        dispatcher: Arc<TradeDispatcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::with_trend_source(
            venues,
            assets,
            settings,
            channels,
            dispatcher,
            clock,
            Arc::new(NeutralTrendSource),
        )
    }

    pub fn with_trend_source(
        venues: HashMap<VenueId, Arc<dyn VenueAdapter>>,
        assets: Vec<String>,
        settings: watch::Receiver<AppSettings>,
        channels: Arc<ChannelHub>,
        dispatcher: Arc<TradeDispatcher>,
        clock: Arc<dyn Clock>,
        trend_source: Arc<dyn TrendSource>,
    ) -> Self {
        Self {
            venues,
            assets,
            settings,
            channels,
            dispatcher,
            clock,
            trend_source,
            poll_interval: std::time::Duration::from_secs(30),
            latest_deviations: parking_lot::RwLock::new(HashMap::new()),
            latest_proposals: parking_lot::RwLock::new(Vec::new()),
        }
    }

    pub fn with_poll_interval(mut self, interval: std::time::Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn current_proposals(&self) -> Vec<RebalanceProposal> {
        self.latest_proposals.read().clone()
    }

    /// Polls authoritative balances on every venue and rebuilds deviations and
    /// proposals for every tracked asset. Returns the proposals generated this
    /// round (also cached for [`InventoryController::current_proposals`]).
    pub async fn poll_once(&self) -> Vec<RebalanceProposal> {
        let mut balances: HashMap<VenueId, Vec<spotarb_core::Balance>> = HashMap::new();
        for (venue_id, adapter) in &self.venues {
            balances.insert(venue_id.clone(), adapter.balances().await);
        }

        let settings = self.settings.borrow().clone();
        let mut deviations_by_asset = HashMap::new();
        let mut proposals = Vec::new();

        for asset in &self.assets {
            let holdings: HashMap<VenueId, Decimal> = self
                .venues
                .keys()
                .map(|venue| (venue.clone(), venue_holding(&balances, venue, asset)))
                .collect();
            let deviations = compute_deviations(&holdings);

            if let Some(proposal) = self
                .propose_for_asset(asset, &deviations, &holdings, &settings)
                .await
            {
                proposals.push(proposal);
            }
            deviations_by_asset.insert(asset.clone(), deviations);
        }

        *self.latest_deviations.write() = deviations_by_asset;
        *self.latest_proposals.write() = proposals.clone();
        proposals
    }

    async fn propose_for_asset(
        &self,
        asset: &str,
        deviations: &HashMap<VenueId, Decimal>,
        holdings: &HashMap<VenueId, Decimal>,
        settings: &AppSettings,
    ) -> Option<RebalanceProposal> {
        let (source, source_dev) = deviations
            .iter()
            .max_by_key(|(_, dev)| dev.abs())
            .map(|(venue, dev)| (venue.clone(), *dev))?;
        if source_dev.abs() < settings.min_rebalance_skew_threshold {
            return None;
        }
        let (target, _) = deviations
            .iter()
            .min_by_key(|(_, dev)| **dev)
            .map(|(venue, dev)| (venue.clone(), *dev))?;
        if target == source {
            return None;
        }

        let amount = ((holdings[&source] - holdings[&target]) / Decimal::TWO).max(Decimal::ZERO);
        if amount <= Decimal::ZERO {
            return None;
        }

        let estimated_fee = match self.venues.get(&source) {
            Some(adapter) => adapter.withdrawal_fee(asset).await.unwrap_or(Decimal::MAX),
            None => Decimal::MAX,
        };
        let trend_label = self
            .trend_source
            .trend(asset)
            .unwrap_or_else(|| "Neutral".to_string());

        Some(RebalanceProposal::new(
            asset,
            source,
            target,
            amount,
            estimated_fee,
            trend_label,
            AppSettings::VIABILITY_CEILING_PCT,
        ))
    }

    /// Decides whether an opportunity read off the passive-rebalance stream
    /// would reduce skew (sell leg on the over-weighted venue, buy leg on the
    /// under-weighted one, both past the rebalance threshold) and if so forwards
    /// it to the dispatcher. Returns whether it was forwarded and executed.
    pub async fn handle_passive_signal(&self, opportunity: Opportunity) -> bool {
        let settings = self.settings.borrow().clone();
        if !settings.auto_rebalance_enabled {
            return false;
        }
        if opportunity.net_pct < AppSettings::ABSOLUTE_FLOOR_PCT {
            return false;
        }

        let reduces_skew = {
            let deviations_by_asset = self.latest_deviations.read();
            let Some(deviations) = deviations_by_asset.get(&opportunity.base) else {
                return false;
            };
            let sell_dev = deviations.get(&opportunity.sell_venue).copied().unwrap_or(Decimal::ZERO);
            let buy_dev = deviations.get(&opportunity.buy_venue).copied().unwrap_or(Decimal::ZERO);
            sell_dev >= settings.min_rebalance_skew_threshold
                && buy_dev <= -settings.min_rebalance_skew_threshold
        };
        if !reduces_skew {
            return false;
        }

        matches!(
            self.dispatcher.dispatch_bypassing_threshold(opportunity).await,
            DispatchOutcome::Executed(_)
        )
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Drives both jobs until `shutdown` fires: a balance-poll timer, and the
    /// passive-rebalance signal reader.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let proposals = self.poll_once().await;
                    tracing::debug!(count = proposals.len(), at = %self.now(), "rebalance proposals updated");
                }
                (_symbol, opportunity) = self.channels.passive_rebalance_signals.recv() => {
                    let executed = self.handle_passive_signal(opportunity).await;
                    tracing::debug!(executed, "passive rebalance signal handled");
                }
            }
        }
    }
}
