//! Places the two legs of an arbitrage trade, reconciles their fills against each
//! other, and issues a compensating order when one leg didn't go the way the other
//! did (component C7). This is the only component in the workspace that calls
//! `VenueAdapter::place_*`/`cancel` — everything upstream only ever produces an
//! `Opportunity` for this crate to act on.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use spotarb_core::settings::ExecutionMode;
use spotarb_core::{Clock, Opportunity, Transaction, TransactionStatus, VenueId};
use spotarb_venue::{OrderResponse, OrderStatus, VenueAdapter};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Buy,
    Sell,
}

/// Places the two legs of detected opportunities and produces the resulting
/// `Transaction`. Idempotent per `Opportunity::id`: a second `execute` call with an
/// opportunity whose id has already been settled returns the original transaction
/// without placing any further orders.
pub struct Executor {
    venues: HashMap<VenueId, Arc<dyn VenueAdapter>>,
    clock: Arc<dyn Clock>,
    leg_timeout: Duration,
    poll_attempts: u32,
    poll_interval: Duration,
    ledger: Mutex<HashMap<Uuid, Transaction>>,
}

impl Executor {
    pub fn new(venues: HashMap<VenueId, Arc<dyn VenueAdapter>>, clock: Arc<dyn Clock>) -> Self {
        Self {
            venues,
            clock,
            leg_timeout: Duration::from_secs(5),
            poll_attempts: 3,
            poll_interval: Duration::from_millis(200),
            ledger: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_timing(mut self, leg_timeout: Duration, poll_attempts: u32, poll_interval: Duration) -> Self {
        self.leg_timeout = leg_timeout;
        self.poll_attempts = poll_attempts;
        self.poll_interval = poll_interval;
        self
    }

    /// Places `opportunity`'s two legs under `mode` and records the outcome.
    /// Replaying the same `opportunity.id` is a no-op that returns the stored
    /// transaction.
    pub async fn execute(&self, opportunity: &Opportunity, mode: ExecutionMode) -> Transaction {
        if let Some(existing) = self.ledger.lock().get(&opportunity.id).cloned() {
            return existing;
        }

        let transaction = match mode {
            ExecutionMode::Sequential => self.execute_sequential(opportunity).await,
            ExecutionMode::Concurrent => self.execute_concurrent(opportunity).await,
        };

        self.ledger.lock().insert(opportunity.id, transaction.clone());
        transaction
    }

    fn venue(&self, id: &VenueId) -> Option<Arc<dyn VenueAdapter>> {
        self.venues.get(id).cloned()
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    async fn place_leg(&self, adapter: &Arc<dyn VenueAdapter>, side: Side, opportunity: &Opportunity, quantity: Decimal) -> OrderResponse {
        let symbol = &opportunity.symbol;
        let placement = match side {
            Side::Buy => adapter.place_market_buy(symbol, quantity),
            Side::Sell => adapter.place_market_sell(symbol, quantity),
        };

        let response = match tokio::time::timeout(self.leg_timeout, placement).await {
            Ok(Ok(response)) => response,
            Ok(Err(error)) => OrderResponse::failed("unknown", error.to_string()),
            // No order id survives a placement-call timeout, so there is nothing to
            // poll; the leg is classified failed rather than left ambiguous.
            Err(_) => OrderResponse::failed("unknown", "placement timed out"),
        };

        self.reconcile_pending(adapter, response).await
    }

    /// An order left `Pending` by its placement call is not assumed failed: its
    /// status is polled a bounded number of times before this leg is classified.
    async fn reconcile_pending(&self, adapter: &Arc<dyn VenueAdapter>, mut response: OrderResponse) -> OrderResponse {
        let mut attempts = 0;
        while response.status == OrderStatus::Pending && attempts < self.poll_attempts {
            tokio::time::sleep(self.poll_interval).await;
            if let Ok(info) = adapter.order_status(&response.order_id).await {
                response.status = info.status;
                response.executed_quantity = info.executed_quantity;
                response.average_price = info.average_price;
            }
            attempts += 1;
        }
        response
    }

    fn leg_profit(&self, buy_fee_pct: Decimal, sell_fee_pct: Decimal, buy: &OrderResponse, sell: &OrderResponse, fallback_buy_price: Decimal, fallback_sell_price: Decimal) -> Decimal {
        let quantity = buy.executed_quantity.min(sell.executed_quantity);
        if quantity <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let buy_price = buy.average_price.unwrap_or(fallback_buy_price);
        let sell_price = sell.average_price.unwrap_or(fallback_sell_price);
        let gross = (sell_price - buy_price) * quantity;
        let buy_fee = buy_price * quantity * (buy_fee_pct / Decimal::ONE_HUNDRED);
        let sell_fee = sell_price * quantity * (sell_fee_pct / Decimal::ONE_HUNDRED);
        gross - buy_fee - sell_fee
    }

    async fn execute_sequential(&self, opportunity: &Opportunity) -> Transaction {
        let now = self.now();
        let (Some(buy_adapter), Some(sell_adapter)) = (self.venue(&opportunity.buy_venue), self.venue(&opportunity.sell_venue)) else {
            return Transaction::new(opportunity.clone(), now, TransactionStatus::Failed, Decimal::ZERO, "venue not configured");
        };

        let buy_response = self.place_leg(&buy_adapter, Side::Buy, opportunity, opportunity.volume).await;
        if !buy_response.status.has_any_fill() {
            let message = buy_response.message.unwrap_or_default();
            return Transaction::new(opportunity.clone(), now, TransactionStatus::Failed, Decimal::ZERO, format!("buy leg failed: {message}"));
        }

        let executed_quantity = buy_response.executed_quantity;
        let sell_response = self.place_leg(&sell_adapter, Side::Sell, opportunity, executed_quantity).await;

        if sell_response.status == OrderStatus::Filled {
            let profit = self.leg_profit(opportunity.buy_fee, opportunity.sell_fee, &buy_response, &sell_response, opportunity.buy_price, opportunity.sell_price);
            return Transaction::new(opportunity.clone(), now, TransactionStatus::Success, profit, "both legs filled");
        }

        if sell_response.status.has_any_fill() {
            let unsold = executed_quantity - sell_response.executed_quantity;
            if unsold > Decimal::ZERO {
                let _ = self.place_leg(&buy_adapter, Side::Sell, opportunity, unsold).await;
            }
            let profit = self.leg_profit(opportunity.buy_fee, opportunity.sell_fee, &buy_response, &sell_response, opportunity.buy_price, opportunity.sell_price);
            return Transaction::new(opportunity.clone(), now, TransactionStatus::Partial, profit, "sell leg partially filled, remainder flattened on buy venue");
        }

        let undo_response = self.place_leg(&buy_adapter, Side::Sell, opportunity, executed_quantity).await;
        if undo_response.status.has_any_fill() {
            let loss = self.leg_profit(opportunity.buy_fee, opportunity.buy_fee, &buy_response, &undo_response, opportunity.buy_price, opportunity.buy_price);
            Transaction::new(opportunity.clone(), now, TransactionStatus::Recovered, loss, "sell leg failed; compensating sell on buy venue succeeded")
        } else {
            tracing::error!(symbol = %opportunity.symbol, venue = %opportunity.buy_venue, "stranded position: compensating undo failed");
            Transaction::new(opportunity.clone(), now, TransactionStatus::Failed, Decimal::ZERO, "stranded position: compensating undo failed, operator action required")
        }
    }

    async fn execute_concurrent(&self, opportunity: &Opportunity) -> Transaction {
        let now = self.now();
        let (Some(buy_adapter), Some(sell_adapter)) = (self.venue(&opportunity.buy_venue), self.venue(&opportunity.sell_venue)) else {
            return Transaction::new(opportunity.clone(), now, TransactionStatus::Failed, Decimal::ZERO, "venue not configured");
        };

        let (buy_response, sell_response) = tokio::join!(
            self.place_leg(&buy_adapter, Side::Buy, opportunity, opportunity.volume),
            self.place_leg(&sell_adapter, Side::Sell, opportunity, opportunity.volume),
        );

        match (buy_response.status.has_any_fill(), sell_response.status.has_any_fill()) {
            (true, true) => self.reconcile_both_filled(opportunity, now, &buy_adapter, &sell_adapter, buy_response, sell_response).await,
            (true, false) => {
                let undo = self.place_leg(&buy_adapter, Side::Sell, opportunity, buy_response.executed_quantity).await;
                self.reconcile_one_stranded(opportunity, now, &buy_response, undo)
            }
            (false, true) => {
                let undo = self.place_leg(&sell_adapter, Side::Buy, opportunity, sell_response.executed_quantity).await;
                self.reconcile_one_stranded(opportunity, now, &sell_response, undo)
            }
            (false, false) => Transaction::new(opportunity.clone(), now, TransactionStatus::Failed, Decimal::ZERO, "both legs failed"),
        }
    }

    async fn reconcile_both_filled(
        &self,
        opportunity: &Opportunity,
        now: DateTime<Utc>,
        buy_adapter: &Arc<dyn VenueAdapter>,
        sell_adapter: &Arc<dyn VenueAdapter>,
        buy_response: OrderResponse,
        sell_response: OrderResponse,
    ) -> Transaction {
        let buy_quantity = buy_response.executed_quantity;
        let sell_quantity = sell_response.executed_quantity;

        if buy_response.status == OrderStatus::Filled && sell_response.status == OrderStatus::Filled && buy_quantity == sell_quantity {
            let profit = self.leg_profit(opportunity.buy_fee, opportunity.sell_fee, &buy_response, &sell_response, opportunity.buy_price, opportunity.sell_price);
            return Transaction::new(opportunity.clone(), now, TransactionStatus::Success, profit, "both legs filled");
        }

        let min_quantity = buy_quantity.min(sell_quantity);
        if buy_quantity > min_quantity {
            let excess = buy_quantity - min_quantity;
            let _ = self.place_leg(buy_adapter, Side::Sell, opportunity, excess).await;
        }
        if sell_quantity > min_quantity {
            let excess = sell_quantity - min_quantity;
            let _ = self.place_leg(sell_adapter, Side::Buy, opportunity, excess).await;
        }
        let profit = self.leg_profit(opportunity.buy_fee, opportunity.sell_fee, &buy_response, &sell_response, opportunity.buy_price, opportunity.sell_price);
        Transaction::new(opportunity.clone(), now, TransactionStatus::Partial, profit, "partial fill on one or both legs, excess flattened")
    }

    fn reconcile_one_stranded(&self, opportunity: &Opportunity, now: DateTime<Utc>, filled_leg: &OrderResponse, undo: OrderResponse) -> Transaction {
        if undo.status.has_any_fill() {
            let loss = self.leg_profit(opportunity.buy_fee, opportunity.sell_fee, filled_leg, &undo, opportunity.buy_price, opportunity.sell_price);
            Transaction::new(opportunity.clone(), now, TransactionStatus::Recovered, loss, "one leg failed; compensating order on the filled venue succeeded")
        } else {
            tracing::error!(symbol = %opportunity.symbol, "stranded position: compensating undo failed");
            Transaction::new(opportunity.clone(), now, TransactionStatus::Failed, Decimal::ZERO, "stranded position: compensating undo failed, operator action required")
        }
    }
}
